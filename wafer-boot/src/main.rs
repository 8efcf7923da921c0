// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Wafer bootloader for RP2040: installs firmware images staged on an SD
//! card, verifies them with CRC-32, then hands off to the application.

#![no_std]
#![no_main]

mod boot;
mod flash;
mod layout;
mod peripherals;
mod storage;

use defmt_rtt as _;
use embedded_hal::digital::OutputPin;
use panic_probe as _;

use embedded_hal_bus::spi::ExclusiveDevice;
use embedded_sdmmc::SdCard;
use wafer_common::flash::ERASED_BYTE;
use wafer_common::update::{run_pending_update, UpdateOutcome};

defmt::timestamp!("{=u64:us}", { 0 });

use cortex_m_rt::entry;

#[unsafe(link_section = ".boot2")]
#[used]
pub static BOOT2: [u8; 256] = rp2040_boot2::BOOT_LOADER_GENERIC_03H;

#[entry]
fn main() -> ! {
    defmt::println!("Bootloader init");

    let mut p = peripherals::init();
    peripherals::blink(&mut p.led_pin, &mut p.timer, 3, 100);
    flash::init();

    let layout = layout::MemoryLayout::from_linker();
    let region = match layout.app_region() {
        Ok(region) => region,
        Err(e) => {
            defmt::println!("Flash geometry rejected ({}), halting", e);
            boot::halt();
        }
    };
    let mut programmer = flash::RomFlash::new(region);

    let sd = ExclusiveDevice::new(p.sd_spi, p.sd_cs, p.timer).unwrap();
    let card = SdCard::new(sd, p.timer);

    match storage::mount(card, &mut p.timer) {
        Err(_) => {
            defmt::println!("Storage unavailable, booting resident image");
        }
        Ok(mut store) => {
            p.led_pin.set_high().ok();
            let mut row_buf = [ERASED_BYTE; flash::FLASH_SECTOR_SIZE as usize];
            match run_pending_update(&mut store, &mut programmer, &mut row_buf) {
                Ok(UpdateOutcome::NoUpdatePending) => {
                    defmt::println!("No update pending");
                }
                Ok(UpdateOutcome::Installed {
                    slot,
                    rows,
                    bytes,
                    crc,
                }) => {
                    defmt::println!(
                        "Installed slot {} image: {} rows, {} bytes, CRC32 0x{:08x}",
                        slot,
                        rows,
                        bytes,
                        crc
                    );
                }
                Err(e) if e.is_fatal() => {
                    defmt::println!("Unrecoverable fault ({}), halting", e);
                    boot::halt();
                }
                Err(e) => {
                    defmt::println!("Update failed ({}), marker left for next boot", e);
                }
            }
            store.release();
            p.led_pin.set_low().ok();
        }
    }

    boot::run_handoff(&layout)
}
