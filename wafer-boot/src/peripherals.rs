// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Peripheral initialization for the bootloader.
//!
//! SD card wiring (SPI1): SCK = GP10, MOSI = GP11, MISO = GP12,
//! CS = GP15. The bus runs at card-initialization speed for the whole
//! bootloader lifetime; installs are short and the card must accept the
//! init clock anyway.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use rp2040_hal as hal;
use rp2040_hal::fugit::RateExtU32;

pub type LedPin =
    hal::gpio::Pin<hal::gpio::bank0::Gpio25, hal::gpio::FunctionSioOutput, hal::gpio::PullDown>;
pub type SdCsPin =
    hal::gpio::Pin<hal::gpio::bank0::Gpio15, hal::gpio::FunctionSioOutput, hal::gpio::PullDown>;

type SdSck = hal::gpio::Pin<hal::gpio::bank0::Gpio10, hal::gpio::FunctionSpi, hal::gpio::PullDown>;
type SdMosi = hal::gpio::Pin<hal::gpio::bank0::Gpio11, hal::gpio::FunctionSpi, hal::gpio::PullDown>;
type SdMiso = hal::gpio::Pin<hal::gpio::bank0::Gpio12, hal::gpio::FunctionSpi, hal::gpio::PullDown>;

pub type SdSpiBus = hal::spi::Spi<hal::spi::Enabled, hal::pac::SPI1, (SdMosi, SdMiso, SdSck), 8>;

pub struct Peripherals {
    pub led_pin: LedPin,
    pub timer: hal::Timer,
    pub sd_spi: SdSpiBus,
    pub sd_cs: SdCsPin,
}

pub fn init() -> Peripherals {
    let mut pac = unsafe { hal::pac::Peripherals::steal() };

    let mut watchdog = hal::Watchdog::new(pac.WATCHDOG);
    let clocks = hal::clocks::init_clocks_and_plls(
        12_000_000u32,
        pac.XOSC,
        pac.CLOCKS,
        pac.PLL_SYS,
        pac.PLL_USB,
        &mut pac.RESETS,
        &mut watchdog,
    )
    .unwrap();

    let timer = hal::Timer::new(pac.TIMER, &mut pac.RESETS, &clocks);
    let sio = hal::Sio::new(pac.SIO);
    let pins = hal::gpio::Pins::new(
        pac.IO_BANK0,
        pac.PADS_BANK0,
        sio.gpio_bank0,
        &mut pac.RESETS,
    );

    let sd_sck: SdSck = pins.gpio10.into_function();
    let sd_mosi: SdMosi = pins.gpio11.into_function();
    let sd_miso: SdMiso = pins.gpio12.into_function();

    let sd_spi = hal::spi::Spi::<_, _, _, 8>::new(pac.SPI1, (sd_mosi, sd_miso, sd_sck)).init(
        &mut pac.RESETS,
        clocks.peripheral_clock.freq(),
        400.kHz(),
        embedded_hal::spi::MODE_0,
    );

    Peripherals {
        led_pin: pins.gpio25.into_push_pull_output(),
        timer,
        sd_spi,
        sd_cs: pins.gpio15.into_push_pull_output(),
    }
}

/// Blink an LED a specified number of times.
pub fn blink(led: &mut impl OutputPin, timer: &mut impl DelayNs, count: u32, period_ms: u32) {
    for _ in 0..count {
        led.set_high().ok();
        timer.delay_ms(period_ms);
        led.set_low().ok();
        timer.delay_ms(period_ms);
    }
}
