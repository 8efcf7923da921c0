// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command implementations for staging operations.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use wafer_common::{ImageCrc, Slot};

const COPY_CHUNK_SIZE: usize = 64 * 1024;

/// Copy `file` to the card as the slot's image, verify the copy, and only
/// then create the marker. The marker-last ordering means the bootloader
/// can never pick up a half-staged image.
pub fn stage(card: &Path, file: &Path, slot: Slot) -> Result<()> {
    let size = fs::metadata(file)
        .with_context(|| format!("Failed to read {}", file.display()))?
        .len();

    let image_path = card.join(slot.image());
    let marker_path = card.join(slot.marker());

    println!("Image:  {} ({} bytes)", file.display(), size);
    println!("Target: {} (slot {:?})", image_path.display(), slot);

    // A stale marker from a previous staging must not make a partially
    // copied image installable.
    if marker_path.exists() {
        fs::remove_file(&marker_path)
            .with_context(|| format!("Failed to remove stale {}", marker_path.display()))?;
    }

    let crc = copy_with_progress(file, &image_path, size)?;

    let written_crc = file_crc(&image_path)?;
    if written_crc != crc {
        bail!(
            "Card copy is corrupt: source CRC32 0x{:08x}, card CRC32 0x{:08x}",
            crc,
            written_crc
        );
    }

    File::create(&marker_path)
        .with_context(|| format!("Failed to create {}", marker_path.display()))?;

    println!("Staged slot {:?}: CRC32 0x{:08x}", slot, crc);
    println!("The bootloader will report the same CRC32 after installing.");
    Ok(())
}

/// Report the staged state of both slots.
pub fn status(card: &Path) -> Result<()> {
    for slot in [Slot::A, Slot::B] {
        let marker = card.join(slot.marker());
        let image = card.join(slot.image());

        println!("Slot {:?}:", slot);
        println!(
            "  Marker: {}",
            if marker.exists() { "pending" } else { "-" }
        );
        if image.exists() {
            let size = fs::metadata(&image)?.len();
            let crc = file_crc(&image)?;
            println!("  Image:  {} bytes, CRC32 0x{:08x}", size, crc);
        } else {
            println!("  Image:  -");
        }
    }
    Ok(())
}

/// Remove staged files, marker before image so an interrupted clear never
/// leaves a marker pointing at a missing image.
pub fn clear(card: &Path, slot: Option<Slot>) -> Result<()> {
    let slots = match slot {
        Some(slot) => vec![slot],
        None => vec![Slot::A, Slot::B],
    };

    for slot in slots {
        for name in [slot.marker(), slot.image()] {
            let path = card.join(name);
            if path.exists() {
                fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
                println!("Removed {}", path.display());
            }
        }
    }
    Ok(())
}

/// Stream-copy with a progress bar, returning the source CRC-32.
fn copy_with_progress(src: &Path, dst: &Path, size: u64) -> Result<u32> {
    let mut reader =
        File::open(src).with_context(|| format!("Failed to open {}", src.display()))?;
    let mut writer =
        File::create(dst).with_context(|| format!("Failed to create {}", dst.display()))?;

    let pb = ProgressBar::new(size);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            )?
            .progress_chars("#>-"),
    );

    let mut crc = ImageCrc::new();
    let mut chunk = vec![0u8; COPY_CHUNK_SIZE];
    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        crc.update(&chunk[..n]);
        writer.write_all(&chunk[..n])?;
        pb.inc(n as u64);
    }
    writer.sync_all()?;
    pb.finish_and_clear();

    Ok(crc.finalize())
}

/// CRC-32 of a file, streamed in chunks.
fn file_crc(path: &Path) -> Result<u32> {
    let mut reader =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut crc = ImageCrc::new();
    let mut chunk = vec![0u8; COPY_CHUNK_SIZE];
    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        crc.update(&chunk[..n]);
    }
    Ok(crc.finalize())
}
