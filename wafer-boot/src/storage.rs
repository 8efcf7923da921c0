// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! SD-card image store over SPI + FAT.
//!
//! This is the thin end of the update engine's storage surface: mount the
//! first FAT volume, probe/open/delete files in the root directory. All
//! filesystem detail stays behind `embedded-sdmmc`; the engine only sees
//! `StoreError`.

use embedded_hal::delay::DelayNs;
use embedded_sdmmc::{
    BlockDevice, Error as FsError, Mode, RawDirectory, RawFile, RawVolume, TimeSource, Timestamp,
    VolumeIdx, VolumeManager,
};
use wafer_common::store::{ImageRead, ImageStore, StoreError};

/// Delay between mount attempts while waiting for the card.
pub const MOUNT_RETRY_DELAY_MS: u32 = 100;
/// Mount attempts before giving up; bounds the wait to two seconds.
pub const MOUNT_ATTEMPTS: u32 = 20;

/// Fixed timestamp source; the bootloader has no RTC and never creates
/// files, so timestamps only matter for FAT bookkeeping.
#[derive(Clone, Copy, Debug, Default)]
pub struct FixedTimeSource;

impl TimeSource for FixedTimeSource {
    fn get_timestamp(&self) -> Timestamp {
        // 2026-01-01 00:00:00
        Timestamp {
            year_since_1970: 56,
            zero_indexed_month: 0,
            zero_indexed_day: 0,
            hours: 0,
            minutes: 0,
            seconds: 0,
        }
    }
}

/// Mounted card with the root directory held open for the bootloader's
/// lifetime.
pub struct SdStore<D: BlockDevice> {
    mgr: VolumeManager<D, FixedTimeSource>,
    volume: RawVolume,
    root: RawDirectory,
}

/// Mount volume 0, retrying while the card comes up after power-on.
pub fn mount<D: BlockDevice>(
    device: D,
    delay: &mut impl DelayNs,
) -> Result<SdStore<D>, StoreError> {
    let mut mgr = VolumeManager::new(device, FixedTimeSource);

    let mut attempt = 0;
    let volume = loop {
        match mgr.open_raw_volume(VolumeIdx(0)) {
            Ok(volume) => break volume,
            Err(_) if attempt + 1 < MOUNT_ATTEMPTS => {
                attempt += 1;
                delay.delay_ms(MOUNT_RETRY_DELAY_MS);
            }
            Err(_) => {
                defmt::println!("SD mount failed after {} attempts", MOUNT_ATTEMPTS);
                return Err(StoreError::Io);
            }
        }
    };

    let root = mgr.open_root_dir(volume).map_err(|_| {
        defmt::println!("SD root dir open failed");
        StoreError::Io
    })?;

    Ok(SdStore { mgr, volume, root })
}

impl<D: BlockDevice> SdStore<D> {
    /// Close everything before hand-off; the application brings the card
    /// up again from scratch.
    pub fn release(mut self) {
        self.mgr.close_dir(self.root).ok();
        self.mgr.close_volume(self.volume).ok();
    }
}

fn map_fs_error<E: core::fmt::Debug>(e: FsError<E>) -> StoreError {
    match e {
        FsError::NotFound => StoreError::NotFound,
        _ => StoreError::Io,
    }
}

impl<D: BlockDevice> ImageStore for SdStore<D> {
    type Reader<'a>
        = SdReader<'a, D>
    where
        Self: 'a;

    fn exists(&mut self, name: &str) -> Result<bool, StoreError> {
        match self.mgr.find_directory_entry(self.root, name) {
            Ok(_) => Ok(true),
            Err(FsError::NotFound) => Ok(false),
            Err(_) => Err(StoreError::Io),
        }
    }

    fn open(&mut self, name: &str) -> Result<Self::Reader<'_>, StoreError> {
        let file = self
            .mgr
            .open_file_in_dir(self.root, name, Mode::ReadOnly)
            .map_err(map_fs_error)?;
        Ok(SdReader {
            mgr: &mut self.mgr,
            file: Some(file),
        })
    }

    fn remove(&mut self, name: &str) -> Result<(), StoreError> {
        match self.mgr.delete_file_in_dir(self.root, name) {
            Ok(()) => Ok(()),
            // Already gone counts as removed; commit stays idempotent.
            Err(FsError::NotFound) => Ok(()),
            Err(_) => Err(StoreError::Io),
        }
    }
}

/// One open image file. Closed on drop so the store can delete it later.
pub struct SdReader<'a, D: BlockDevice> {
    mgr: &'a mut VolumeManager<D, FixedTimeSource>,
    file: Option<RawFile>,
}

impl<D: BlockDevice> ImageRead for SdReader<'_, D> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StoreError> {
        let file = self.file.ok_or(StoreError::Io)?;
        match self.mgr.read(file, buf) {
            Ok(n) => Ok(n),
            Err(FsError::EndOfFile) => Ok(0),
            Err(_) => Err(StoreError::Io),
        }
    }
}

impl<D: BlockDevice> Drop for SdReader<'_, D> {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            self.mgr.close_file(file).ok();
        }
    }
}
