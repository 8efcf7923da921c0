// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Incremental CRC-32 over an image byte stream.
//!
//! The install loop feeds the same stream to two accumulators (source
//! bytes and flash read-back), one row at a time. Splitting the stream
//! into chunks never changes the final value.

use crc::{Crc, Digest, CRC_32_ISO_HDLC};

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Running CRC-32 (ISO HDLC) state.
pub struct ImageCrc {
    digest: Digest<'static, u32>,
}

impl ImageCrc {
    pub fn new() -> Self {
        Self {
            digest: CRC32.digest(),
        }
    }

    /// Fold the next chunk of the stream into the running value.
    pub fn update(&mut self, bytes: &[u8]) {
        self.digest.update(bytes);
    }

    /// Consume the state and yield the checksum of everything fed so far.
    pub fn finalize(self) -> u32 {
        self.digest.finalize()
    }
}

impl Default for ImageCrc {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot checksum of a contiguous buffer.
pub fn checksum(bytes: &[u8]) -> u32 {
    CRC32.checksum(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_shot_matches_incremental() {
        let data: [u8; 7] = [0xDE, 0xAD, 0xBE, 0xEF, 0x01, 0x02, 0x03];
        let mut crc = ImageCrc::new();
        crc.update(&data);
        assert_eq!(crc.finalize(), checksum(&data));
    }

    #[test]
    fn empty_stream_is_well_defined() {
        assert_eq!(ImageCrc::new().finalize(), checksum(&[]));
    }
}
