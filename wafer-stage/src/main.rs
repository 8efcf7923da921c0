// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Staging tool for the wafer bootloader.
//!
//! Usage:
//!   wafer-stage --card /media/SDCARD stage firmware.bin --slot a
//!   wafer-stage --card /media/SDCARD status
//!   wafer-stage --card /media/SDCARD clear --slot a

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    cli::run(args)
}
