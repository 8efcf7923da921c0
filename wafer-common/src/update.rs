// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! The update orchestrator.
//!
//! One run per reset: probe the card for a pending-update marker, and if
//! one is set, stream the staged image into the application region row by
//! row - read a row's worth of source bytes, erase the row, program its
//! pages, read the row back - while accumulating a CRC-32 over the source
//! stream and a second one over the flash read-back. Only when both
//! checksums agree are the image and its marker deleted from the card.
//!
//! Ordering invariants the loop maintains:
//! - a row is fully erased before any of its pages is written
//! - verification completes before anything on the card is deleted
//! - every failure path leaves the marker (and image) on the card, so the
//!   next reset retries the install from row zero

use crate::checksum::ImageCrc;
use crate::error::UpdateError;
use crate::flash::{FlashProgrammer, ERASED_BYTE};
use crate::geometry::FlashRegion;
use crate::slot::{pending_slot, Slot};
use crate::store::{read_full, ImageStore};

/// What a completed orchestrator run did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UpdateOutcome {
    /// No marker on the card; flash untouched, normal boot.
    NoUpdatePending,
    /// A verified image is in flash and its marker is cleared.
    Installed {
        slot: Slot,
        rows: u32,
        bytes: u32,
        crc: u32,
    },
}

/// Transient per-attempt state. Never persisted: an interrupted attempt
/// restarts from row zero on the next boot.
struct CopySession {
    rows_completed: u32,
    bytes_copied: u32,
    source_crc: ImageCrc,
    flash_crc: ImageCrc,
}

impl CopySession {
    fn new() -> Self {
        Self {
            rows_completed: 0,
            bytes_copied: 0,
            source_crc: ImageCrc::new(),
            flash_crc: ImageCrc::new(),
        }
    }
}

/// Run the boot-time update check.
///
/// `row_buf` is caller-provided scratch of at least one row. The function
/// performs zero flash operations when no marker is present.
pub fn run_pending_update<S: ImageStore, F: FlashProgrammer>(
    store: &mut S,
    flash: &mut F,
    row_buf: &mut [u8],
) -> Result<UpdateOutcome, UpdateError> {
    let slot = match pending_slot(store)? {
        Some(slot) => slot,
        None => return Ok(UpdateOutcome::NoUpdatePending),
    };

    install_image(store, flash, slot, row_buf)
}

/// Erase/copy/verify/commit for one selected slot.
fn install_image<S: ImageStore, F: FlashProgrammer>(
    store: &mut S,
    flash: &mut F,
    slot: Slot,
    row_buf: &mut [u8],
) -> Result<UpdateOutcome, UpdateError> {
    let region = flash.geometry()?;
    if row_buf.len() < region.row_size() as usize {
        return Err(UpdateError::InvalidAddress);
    }

    let session = copy_rows(store, flash, slot, &region, row_buf)?;

    // Verifying: the two streams must agree byte for byte.
    let source = session.source_crc.finalize();
    let flashed = session.flash_crc.finalize();
    if source != flashed {
        return Err(UpdateError::ChecksumMismatch {
            source,
            flash: flashed,
        });
    }

    // Committing: only now may the card lose the image and its marker.
    // A reset before this point re-runs the whole install.
    store.remove(slot.image())?;
    store.remove(slot.marker())?;

    Ok(UpdateOutcome::Installed {
        slot,
        rows: session.rows_completed,
        bytes: session.bytes_copied,
        crc: source,
    })
}

/// The row loop. Erase count is driven by source-stream availability, not
/// a length field: the image length is discovered at end of stream.
fn copy_rows<S: ImageStore, F: FlashProgrammer>(
    store: &mut S,
    flash: &mut F,
    slot: Slot,
    region: &FlashRegion,
    row_buf: &mut [u8],
) -> Result<CopySession, UpdateError> {
    let row_size = region.row_size() as usize;
    let page_size = region.page_size() as usize;

    let mut reader = store.open(slot.image())?;
    let mut session = CopySession::new();

    loop {
        // Source bytes first: a row is only erased once there is data to
        // put in it, which also pins down overflow before any
        // out-of-region erase.
        let n = read_full(&mut reader, &mut row_buf[..row_size])?;
        if n == 0 {
            break;
        }
        if session.rows_completed >= region.rows() {
            return Err(UpdateError::RegionOverflow);
        }

        let row_addr = region.row_addr(session.rows_completed);
        flash.erase_row(row_addr)?;

        // Short final read: pad the rest of the row with the erased-byte
        // pattern, never with stale buffer contents.
        row_buf[n..row_size].fill(ERASED_BYTE);
        for page in 0..region.pages_per_row() as usize {
            let offset = page * page_size;
            flash.write_page(
                row_addr + offset as u32,
                &row_buf[offset..offset + page_size],
            )?;
        }

        // The source CRC covers only true image bytes, then the buffer is
        // reused for the read-back so the flash CRC covers the same span.
        session.source_crc.update(&row_buf[..n]);
        flash.read_back(row_addr, &mut row_buf[..n]);
        session.flash_crc.update(&row_buf[..n]);

        session.rows_completed += 1;
        session.bytes_copied += n as u32;

        if n < row_size {
            break;
        }
    }

    Ok(session)
}
