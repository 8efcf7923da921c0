// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Error taxonomy for the update engine.

/// Everything that can go wrong between reset and hand-off.
///
/// None of these abort the bootloader: the orchestrator maps each failure
/// to a policy (retry next boot, skip the update, or halt) in `main`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UpdateError {
    /// Removable medium absent or the filesystem failed to mount within
    /// the retry window. The resident image still boots.
    StorageUnavailable,
    /// A pending-update marker exists but its image file does not.
    ImageMissing,
    /// An erase or write was requested outside the application region or
    /// with bad alignment. Programming error; the update is abandoned
    /// before any flash damage.
    InvalidAddress,
    /// The candidate image is larger than the application region.
    RegionOverflow,
    /// Hardware reported (or read-back revealed) a failed row erase.
    /// Flash state is suspect; the marker stays set so the next boot
    /// restarts the install from row zero.
    EraseFailure,
    /// Hardware reported a failed page write. Same retry policy as
    /// `EraseFailure`.
    WriteFailure,
    /// The checksum of the bytes read back from flash does not match the
    /// checksum of the source stream.
    ChecksumMismatch { source: u32, flash: u32 },
    /// The flash geometry reported at start-up is inconsistent. Nothing
    /// may be erased or written; the bootloader halts.
    HardwareFault,
}

impl UpdateError {
    /// True for the one condition under which the device must not even
    /// try to boot a resident image.
    pub fn is_fatal(&self) -> bool {
        matches!(self, UpdateError::HardwareFault)
    }
}
