// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! The narrow surface the engine needs from removable storage.
//!
//! The real implementation (`wafer-boot::storage::SdStore`) sits on an SD
//! card with a FAT filesystem; the tests use an in-memory fake. The engine
//! only ever probes for named files, reads one sequentially, and deletes
//! by name.

use crate::error::UpdateError;

/// Storage-level failures, already collapsed to what the engine can act
/// on. Filesystem detail beyond this is logged at the driver layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StoreError {
    /// Named file does not exist.
    NotFound,
    /// The medium went away or the filesystem errored mid-operation.
    Io,
}

impl From<StoreError> for UpdateError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => UpdateError::ImageMissing,
            StoreError::Io => UpdateError::StorageUnavailable,
        }
    }
}

/// Sequential byte reads from one open file.
pub trait ImageRead {
    /// Read up to `buf.len()` bytes. Returns the number of bytes read;
    /// zero means end of stream.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StoreError>;
}

/// File-level operations on the removable medium.
pub trait ImageStore {
    type Reader<'a>: ImageRead
    where
        Self: 'a;

    fn exists(&mut self, name: &str) -> Result<bool, StoreError>;

    /// Open an existing file for reading. The reader borrows the store;
    /// it must be dropped before `exists`/`remove` are used again.
    fn open(&mut self, name: &str) -> Result<Self::Reader<'_>, StoreError>;

    /// Delete a file. Deleting a file that is already gone succeeds, so
    /// the commit step is idempotent across resets.
    fn remove(&mut self, name: &str) -> Result<(), StoreError>;
}

/// Fill `buf` from `reader`, tolerating short reads from the driver.
///
/// Returns the number of bytes placed in `buf`; anything less than
/// `buf.len()` means the stream ended inside this call.
pub fn read_full<R: ImageRead>(reader: &mut R, buf: &mut [u8]) -> Result<usize, StoreError> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
