// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Flash programming via the RP2040 ROM routines.
//!
//! On RP2040, flash operations (erase/program) require disabling XIP
//! first. The full sequence is:
//!   1. connect_internal_flash()
//!   2. flash_exit_xip()
//!   3. flash_range_erase() or flash_range_program()
//!   4. flash_flush_cache()
//!   5. flash_enter_cmd_xip()
//!
//! All code executing during steps 1-5 must run from RAM, not flash.
//! We use `#[link_section = ".data"]` to place critical functions in RAM,
//! and pre-resolve all ROM function pointers at init time.
//!
//! The erase granularity of the XIP flash is one 4 KiB sector (a "row" to
//! the update engine) and the program granularity is one 256-byte page.
//! The ROM calls report no status, so [`RomFlash::erase_row`] reads the
//! row back and treats any non-0xFF byte as the hardware's failure
//! signal; write verification is the engine's CRC pass.

use wafer_common::error::UpdateError;
use wafer_common::flash::{FlashProgrammer, ERASED_BYTE};
use wafer_common::geometry::FlashRegion;

/// XIP-mapped base address of flash.
pub const FLASH_BASE: u32 = 0x1000_0000;
/// Smallest programmable unit.
pub const FLASH_PAGE_SIZE: u32 = 256;
/// Smallest erasable unit.
pub const FLASH_SECTOR_SIZE: u32 = 4096;

// ROM function pointer types
type RomFnVoid = unsafe extern "C" fn();
type RomFnErase = unsafe extern "C" fn(u32, usize, u32, u8);
type RomFnProgram = unsafe extern "C" fn(u32, *const u8, usize);

/// ROM function pointers, resolved once at init from the ROM table.
/// Stored in static RAM so RAM-resident functions can call them without
/// accessing flash-based code.
static mut ROM_CONNECT_INTERNAL_FLASH: RomFnVoid = dummy_void;
static mut ROM_FLASH_EXIT_XIP: RomFnVoid = dummy_void;
static mut ROM_FLASH_RANGE_ERASE: RomFnErase = dummy_erase;
static mut ROM_FLASH_RANGE_PROGRAM: RomFnProgram = dummy_program;
static mut ROM_FLASH_FLUSH_CACHE: RomFnVoid = dummy_void;
static mut ROM_FLASH_ENTER_CMD_XIP: RomFnVoid = dummy_void;

unsafe extern "C" fn dummy_void() {}
unsafe extern "C" fn dummy_erase(_: u32, _: usize, _: u32, _: u8) {}
unsafe extern "C" fn dummy_program(_: u32, _: *const u8, _: usize) {}

/// Look up a ROM function by its two-character tag.
/// ROM table pointer at 0x14 and lookup function at 0x18 are 16-bit halfword pointers.
unsafe fn rom_func_lookup(tag: &[u8; 2]) -> usize {
    let fn_table = *(0x14 as *const u16) as *const u16;
    let lookup: unsafe extern "C" fn(*const u16, u32) -> usize =
        core::mem::transmute::<usize, unsafe extern "C" fn(*const u16, u32) -> usize>(
            *(0x18 as *const u16) as usize,
        );
    let code = u16::from_le_bytes(*tag) as u32;
    lookup(fn_table, code)
}

/// Initialize ROM flash function pointers. Must be called once before any flash operations.
/// This performs ROM table lookups which require XIP to be active.
pub fn init() {
    unsafe {
        ROM_CONNECT_INTERNAL_FLASH =
            core::mem::transmute::<usize, RomFnVoid>(rom_func_lookup(b"IF"));
        ROM_FLASH_EXIT_XIP = core::mem::transmute::<usize, RomFnVoid>(rom_func_lookup(b"EX"));
        ROM_FLASH_RANGE_ERASE = core::mem::transmute::<usize, RomFnErase>(rom_func_lookup(b"RE"));
        ROM_FLASH_RANGE_PROGRAM =
            core::mem::transmute::<usize, RomFnProgram>(rom_func_lookup(b"RP"));
        ROM_FLASH_FLUSH_CACHE = core::mem::transmute::<usize, RomFnVoid>(rom_func_lookup(b"FC"));
        ROM_FLASH_ENTER_CMD_XIP = core::mem::transmute::<usize, RomFnVoid>(rom_func_lookup(b"CX"));
    }
}

/// Convert an absolute XIP flash address to a flash-relative offset.
fn addr_to_offset(abs_addr: u32) -> u32 {
    abs_addr - FLASH_BASE
}

/// Erase flash at the given flash-relative offset.
/// Runs entirely from RAM with proper XIP teardown/setup.
///
/// # Safety
/// The `init()` function must have been called first.
#[link_section = ".data"]
#[inline(never)]
unsafe fn flash_erase(offset: u32, size: u32) {
    cortex_m::interrupt::disable();
    ROM_CONNECT_INTERNAL_FLASH();
    ROM_FLASH_EXIT_XIP();
    ROM_FLASH_RANGE_ERASE(offset, size as usize, FLASH_SECTOR_SIZE, 0x20);
    ROM_FLASH_FLUSH_CACHE();
    ROM_FLASH_ENTER_CMD_XIP();
    cortex_m::interrupt::enable();
}

/// Program flash at the given flash-relative offset.
/// Runs entirely from RAM with proper XIP teardown/setup.
///
/// # Safety
/// The `init()` function must have been called first.
#[link_section = ".data"]
#[inline(never)]
unsafe fn flash_program(offset: u32, data: *const u8, len: usize) {
    cortex_m::interrupt::disable();
    ROM_CONNECT_INTERNAL_FLASH();
    ROM_FLASH_EXIT_XIP();
    ROM_FLASH_RANGE_PROGRAM(offset, data, len);
    ROM_FLASH_FLUSH_CACHE();
    ROM_FLASH_ENTER_CMD_XIP();
    cortex_m::interrupt::enable();
}

/// Read bytes from an absolute XIP flash address via volatile reads.
fn flash_read(abs_addr: u32, buf: &mut [u8]) {
    for (i, byte) in buf.iter_mut().enumerate() {
        *byte = unsafe { ((abs_addr + i as u32) as *const u8).read_volatile() };
    }
}

/// The hardware flash programmer for the application region.
///
/// Holds the geometry validated at start-up; all addresses are checked
/// against it before any ROM call, so a confused caller gets
/// `InvalidAddress` instead of a bricked bootloader.
pub struct RomFlash {
    region: FlashRegion,
}

impl RomFlash {
    /// `flash::init()` must have been called before the programmer is
    /// first used.
    pub fn new(region: FlashRegion) -> Self {
        Self { region }
    }
}

impl FlashProgrammer for RomFlash {
    fn geometry(&mut self) -> Result<FlashRegion, UpdateError> {
        Ok(self.region)
    }

    fn erase_row(&mut self, addr: u32) -> Result<(), UpdateError> {
        self.region.check_row(addr)?;
        unsafe {
            flash_erase(addr_to_offset(addr), self.region.row_size());
        }

        // The ROM erase returns no status; a row that does not read back
        // as all-0xFF is the failure signal.
        let mut chunk = [0u8; 256];
        let mut remaining = self.region.row_size() as usize;
        let mut at = addr;
        while remaining > 0 {
            let n = remaining.min(chunk.len());
            flash_read(at, &mut chunk[..n]);
            if chunk[..n].iter().any(|&b| b != ERASED_BYTE) {
                return Err(UpdateError::EraseFailure);
            }
            at += n as u32;
            remaining -= n;
        }
        Ok(())
    }

    fn write_page(&mut self, addr: u32, data: &[u8]) -> Result<(), UpdateError> {
        self.region.check_page(addr, data.len())?;
        unsafe {
            flash_program(addr_to_offset(addr), data.as_ptr(), data.len());
        }
        Ok(())
    }

    fn read_back(&mut self, addr: u32, buf: &mut [u8]) {
        flash_read(addr, buf);
    }
}
