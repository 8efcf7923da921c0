// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Memory layout read from linker-exported symbols at start-up.

use wafer_common::error::UpdateError;
use wafer_common::geometry::FlashRegion;
use wafer_common::handoff::AddressRange;

use crate::flash::{FLASH_PAGE_SIZE, FLASH_SECTOR_SIZE};

unsafe extern "C" {
    static __boot_flash_end: u32;
    static __app_flash_start: u32;
    static __app_flash_end: u32;
    static __ram_start: u32;
    static __ram_end: u32;
}

macro_rules! linker_addr {
    ($sym:ident) => {
        unsafe { &$sym as *const u32 as u32 }
    };
}

/// The link-time memory map, captured once at boot.
#[derive(Clone, Copy)]
pub struct MemoryLayout {
    pub boot_end: u32,
    pub app_start: u32,
    pub app_end: u32,
    pub ram: AddressRange,
}

impl MemoryLayout {
    pub fn from_linker() -> Self {
        Self {
            boot_end: linker_addr!(__boot_flash_end),
            app_start: linker_addr!(__app_flash_start),
            app_end: linker_addr!(__app_flash_end),
            ram: AddressRange {
                start: linker_addr!(__ram_start),
                end: linker_addr!(__ram_end),
            },
        }
    }

    pub fn app_flash(&self) -> AddressRange {
        AddressRange {
            start: self.app_start,
            end: self.app_end,
        }
    }

    /// Validate the layout into the region the update engine may touch.
    /// A layout that is empty, misaligned, or reaches into the
    /// bootloader's own flash is rejected before anything is programmed.
    pub fn app_region(&self) -> Result<FlashRegion, UpdateError> {
        let size = self
            .app_end
            .checked_sub(self.app_start)
            .ok_or(UpdateError::HardwareFault)?;
        FlashRegion::new(
            self.app_start,
            size,
            FLASH_PAGE_SIZE,
            FLASH_SECTOR_SIZE / FLASH_PAGE_SIZE,
            self.boot_end,
        )
    }
}
