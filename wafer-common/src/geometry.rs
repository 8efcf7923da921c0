// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Application flash region geometry.
//!
//! The region is read from the device at start-up (`wafer-boot` assembles
//! it from linker-exported symbols) and validated here once; after that it
//! is immutable and every address computation in the engine goes through
//! it.

use crate::error::UpdateError;

/// The flash range reserved for the application image, together with the
/// erase and write granularity of the part.
///
/// Invariants, enforced by [`FlashRegion::new`]:
/// - `page_size` and `row_size` are non-zero and `row_size` is a whole
///   multiple of `page_size`
/// - `base` and `size` are row-aligned and `size` is non-zero
/// - the region starts at or above the reserved bootloader range
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FlashRegion {
    base: u32,
    size: u32,
    page_size: u32,
    row_size: u32,
}

impl FlashRegion {
    /// Validate a device-reported geometry. Any inconsistency is a
    /// [`UpdateError::HardwareFault`]: nothing may be erased or written on
    /// the strength of a nonsense readout.
    pub fn new(
        base: u32,
        size: u32,
        page_size: u32,
        pages_per_row: u32,
        reserved_end: u32,
    ) -> Result<Self, UpdateError> {
        if page_size == 0 || pages_per_row == 0 || size == 0 {
            return Err(UpdateError::HardwareFault);
        }
        let row_size = page_size
            .checked_mul(pages_per_row)
            .ok_or(UpdateError::HardwareFault)?;
        if base % row_size != 0 || size % row_size != 0 {
            return Err(UpdateError::HardwareFault);
        }
        if base < reserved_end {
            return Err(UpdateError::HardwareFault);
        }
        base.checked_add(size).ok_or(UpdateError::HardwareFault)?;
        Ok(Self {
            base,
            size,
            page_size,
            row_size,
        })
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn row_size(&self) -> u32 {
        self.row_size
    }

    /// Total number of erasable rows in the region.
    pub fn rows(&self) -> u32 {
        self.size / self.row_size
    }

    pub fn pages_per_row(&self) -> u32 {
        self.row_size / self.page_size
    }

    /// Absolute address of row `index`. Callers check `index < rows()`.
    pub fn row_addr(&self, index: u32) -> u32 {
        self.base + index * self.row_size
    }

    /// A row-aligned address inside the region, suitable for `erase_row`.
    pub fn check_row(&self, addr: u32) -> Result<(), UpdateError> {
        if addr < self.base
            || addr >= self.base + self.size
            || (addr - self.base) % self.row_size != 0
        {
            return Err(UpdateError::InvalidAddress);
        }
        Ok(())
    }

    /// A page-aligned address inside the region with exactly one page of
    /// data, suitable for `write_page`.
    pub fn check_page(&self, addr: u32, len: usize) -> Result<(), UpdateError> {
        if len != self.page_size as usize {
            return Err(UpdateError::InvalidAddress);
        }
        // Page-aligned and inside the region implies the whole page fits:
        // the region end is row-aligned, so it is page-aligned too.
        if addr < self.base
            || addr >= self.base + self.size
            || (addr - self.base) % self.page_size != 0
        {
            return Err(UpdateError::InvalidAddress);
        }
        Ok(())
    }
}
