// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! The flash programming surface.
//!
//! Erase granularity is a row (several pages), write granularity is a
//! page. An erase is mandatory before writing to a page, and every byte of
//! an erased row reads back as [`ERASED_BYTE`]. Implementations validate
//! addresses with the [`FlashRegion`] helpers so the trait contract is the
//! same on hardware and in the test fakes.

use crate::error::UpdateError;
use crate::geometry::FlashRegion;

/// Value every byte of a row holds after a successful erase.
pub const ERASED_BYTE: u8 = 0xFF;

pub trait FlashProgrammer {
    /// Device-reported geometry of the application region. Fails with
    /// [`UpdateError::HardwareFault`] if the readout is inconsistent.
    fn geometry(&mut self) -> Result<FlashRegion, UpdateError>;

    /// Erase exactly one row. `addr` must be row-aligned and inside the
    /// application region. After success the whole row reads back as
    /// [`ERASED_BYTE`]; after failure the row's contents are undefined.
    fn erase_row(&mut self, addr: u32) -> Result<(), UpdateError>;

    /// Program exactly one previously-erased page. `data` must be one
    /// page long and `addr` page-aligned inside the region. A row takes
    /// `pages_per_row` sequential calls; they are not atomic as a group.
    fn write_page(&mut self, addr: u32, data: &[u8]) -> Result<(), UpdateError>;

    /// Raw read of current flash contents, used for post-write
    /// verification. Reads never corrupt flash and never fail.
    fn read_back(&mut self, addr: u32, buf: &mut [u8]);
}
