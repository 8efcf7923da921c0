// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command-line interface definitions.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use wafer_common::Slot;

use crate::commands;

/// Command-line arguments.
#[derive(Parser)]
#[command(name = "wafer-stage")]
#[command(about = "Stages firmware images for the wafer bootloader")]
pub struct Cli {
    /// Mount point of the SD card (e.g., /media/SDCARD)
    #[arg(short, long)]
    pub card: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

/// Slot selector on the command line.
#[derive(Clone, Copy, ValueEnum)]
pub enum SlotArg {
    A,
    B,
}

impl From<SlotArg> for Slot {
    fn from(arg: SlotArg) -> Self {
        match arg {
            SlotArg::A => Slot::A,
            SlotArg::B => Slot::B,
        }
    }
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Copy an image onto the card and set its pending-update marker
    Stage {
        /// Firmware binary file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Target slot
        #[arg(short, long, value_enum, default_value = "a")]
        slot: SlotArg,
    },

    /// Show which markers and images are currently on the card
    Status,

    /// Remove staged markers and images
    Clear {
        /// Only clear one slot; both when omitted
        #[arg(short, long, value_enum)]
        slot: Option<SlotArg>,
    },
}

/// Execute the parsed CLI command.
pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Stage { file, slot } => commands::stage(&cli.card, &file, slot.into()),
        Commands::Status => commands::status(&cli.card),
        Commands::Clear { slot } => commands::clear(&cli.card, slot.map(Into::into)),
    }
}
