// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Update slots and their on-card file names.
//!
//! A slot is requested by dropping a zero-byte marker file next to its
//! image on the card. The marker is the unit of persistence: it survives
//! every failed install attempt and is removed only after a verified copy.

use crate::store::{ImageStore, StoreError};

/// File names live in the FAT root directory, 8.3 uppercase.
pub const MARKER_A: &str = "UPDATE-A.TXT";
pub const MARKER_B: &str = "UPDATE-B.TXT";
pub const IMAGE_A: &str = "IMAGE-A.BIN";
pub const IMAGE_B: &str = "IMAGE-B.BIN";

/// One of the two logical update channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Slot {
    A,
    B,
}

impl Slot {
    pub fn marker(&self) -> &'static str {
        match self {
            Slot::A => MARKER_A,
            Slot::B => MARKER_B,
        }
    }

    pub fn image(&self) -> &'static str {
        match self {
            Slot::A => IMAGE_A,
            Slot::B => IMAGE_B,
        }
    }
}

/// Selection rule over the two marker probes.
///
/// Both markers present is anomalous (normal operation keeps at most one);
/// slot A wins deterministically rather than failing the boot.
pub fn select_slot(marker_a: bool, marker_b: bool) -> Option<Slot> {
    match (marker_a, marker_b) {
        (true, _) => Some(Slot::A),
        (false, true) => Some(Slot::B),
        (false, false) => None,
    }
}

/// Probe the store for a pending update.
pub fn pending_slot<S: ImageStore>(store: &mut S) -> Result<Option<Slot>, StoreError> {
    let a = store.exists(MARKER_A)?;
    let b = store.exists(MARKER_B)?;
    Ok(select_slot(a, b))
}
