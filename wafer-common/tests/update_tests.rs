// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! End-to-end tests for the update orchestrator against in-memory fakes.
//!
//! The fake geometry mirrors a small NVM part: 64-byte pages, 4 pages per
//! row, application region at 0x12000.

use std::collections::BTreeMap;

use wafer_common::checksum;
use wafer_common::error::UpdateError;
use wafer_common::flash::{FlashProgrammer, ERASED_BYTE};
use wafer_common::geometry::FlashRegion;
use wafer_common::slot::{IMAGE_A, IMAGE_B, MARKER_A, MARKER_B};
use wafer_common::store::{ImageRead, ImageStore, StoreError};
use wafer_common::update::{run_pending_update, UpdateOutcome};
use wafer_common::Slot;

const APP_BASE: u32 = 0x0001_2000;
const PAGE_SIZE: u32 = 64;
const PAGES_PER_ROW: u32 = 4;
const ROW_SIZE: u32 = PAGE_SIZE * PAGES_PER_ROW;
const REGION_ROWS: u32 = 16;

// =============================================================================
// In-memory flash
// =============================================================================

struct MemFlash {
    region: FlashRegion,
    mem: Vec<u8>,
    geometry_calls: u32,
    erase_calls: Vec<u32>,
    write_calls: Vec<(u32, usize)>,
    fail_erase_at: Option<u32>,
    fail_write_at: Option<u32>,
    corrupt_writes: bool,
}

impl MemFlash {
    fn new() -> Self {
        let region = FlashRegion::new(
            APP_BASE,
            REGION_ROWS * ROW_SIZE,
            PAGE_SIZE,
            PAGES_PER_ROW,
            APP_BASE,
        )
        .unwrap();
        Self {
            region,
            // Pre-update flash holds arbitrary stale data, not 0xFF.
            mem: vec![0x5A; (REGION_ROWS * ROW_SIZE) as usize],
            geometry_calls: 0,
            erase_calls: Vec::new(),
            write_calls: Vec::new(),
            fail_erase_at: None,
            fail_write_at: None,
            corrupt_writes: false,
        }
    }

    fn offset(&self, addr: u32) -> usize {
        (addr - APP_BASE) as usize
    }

    fn row(&self, index: u32) -> &[u8] {
        let start = (index * ROW_SIZE) as usize;
        &self.mem[start..start + ROW_SIZE as usize]
    }
}

impl FlashProgrammer for MemFlash {
    fn geometry(&mut self) -> Result<FlashRegion, UpdateError> {
        self.geometry_calls += 1;
        Ok(self.region)
    }

    fn erase_row(&mut self, addr: u32) -> Result<(), UpdateError> {
        self.region.check_row(addr)?;
        if self.fail_erase_at == Some(addr) {
            return Err(UpdateError::EraseFailure);
        }
        self.erase_calls.push(addr);
        let start = self.offset(addr);
        self.mem[start..start + ROW_SIZE as usize].fill(ERASED_BYTE);
        Ok(())
    }

    fn write_page(&mut self, addr: u32, data: &[u8]) -> Result<(), UpdateError> {
        self.region.check_page(addr, data.len())?;
        if self.fail_write_at == Some(addr) {
            return Err(UpdateError::WriteFailure);
        }
        self.write_calls.push((addr, data.len()));
        let start = self.offset(addr);
        // NOR-style: programming can only clear bits.
        for (i, &b) in data.iter().enumerate() {
            self.mem[start + i] &= b;
        }
        if self.corrupt_writes {
            self.mem[start] ^= 0x01;
        }
        Ok(())
    }

    fn read_back(&mut self, addr: u32, buf: &mut [u8]) {
        let start = self.offset(addr);
        buf.copy_from_slice(&self.mem[start..start + buf.len()]);
    }
}

// =============================================================================
// In-memory store
// =============================================================================

struct MemStore {
    files: BTreeMap<String, Vec<u8>>,
    /// Fail every read after this many successful ones.
    fail_reads_after: Option<u32>,
    reads: u32,
}

impl MemStore {
    fn new() -> Self {
        Self {
            files: BTreeMap::new(),
            fail_reads_after: None,
            reads: 0,
        }
    }

    fn stage(mut self, name: &str, data: &[u8]) -> Self {
        self.files.insert(name.to_string(), data.to_vec());
        self
    }

    fn has(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }
}

struct MemReader<'a> {
    data: &'a [u8],
    pos: usize,
    reads: &'a mut u32,
    fail_reads_after: Option<u32>,
}

impl ImageRead for MemReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StoreError> {
        if let Some(limit) = self.fail_reads_after {
            if *self.reads >= limit {
                return Err(StoreError::Io);
            }
        }
        *self.reads += 1;
        // Short reads on purpose: at most 100 bytes per call, so the
        // engine's end-of-stream handling is exercised realistically.
        let n = (self.data.len() - self.pos).min(buf.len()).min(100);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

impl ImageStore for MemStore {
    type Reader<'a>
        = MemReader<'a>
    where
        Self: 'a;

    fn exists(&mut self, name: &str) -> Result<bool, StoreError> {
        Ok(self.files.contains_key(name))
    }

    fn open(&mut self, name: &str) -> Result<Self::Reader<'_>, StoreError> {
        let fail = self.fail_reads_after;
        let reads = &mut self.reads;
        match self.files.get(name) {
            Some(data) => Ok(MemReader {
                data,
                pos: 0,
                reads,
                fail_reads_after: fail,
            }),
            None => Err(StoreError::NotFound),
        }
    }

    fn remove(&mut self, name: &str) -> Result<(), StoreError> {
        self.files.remove(name);
        Ok(())
    }
}

fn counting_pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| i as u8).collect()
}

fn run(store: &mut MemStore, flash: &mut MemFlash) -> Result<UpdateOutcome, UpdateError> {
    let mut row_buf = [0u8; ROW_SIZE as usize];
    run_pending_update(store, flash, &mut row_buf)
}

// =============================================================================
// Flash fake properties (erase/read-back/round-trip)
// =============================================================================

#[test]
fn test_erase_row_reads_back_erased() {
    let mut flash = MemFlash::new();
    flash.erase_row(APP_BASE + ROW_SIZE).unwrap();

    let mut buf = [0u8; ROW_SIZE as usize];
    flash.read_back(APP_BASE + ROW_SIZE, &mut buf);
    assert!(buf.iter().all(|&b| b == ERASED_BYTE));
}

#[test]
fn test_page_writes_round_trip_a_row() {
    let mut flash = MemFlash::new();
    let pattern = counting_pattern(ROW_SIZE as usize);

    flash.erase_row(APP_BASE).unwrap();
    for page in 0..PAGES_PER_ROW as usize {
        let offset = page * PAGE_SIZE as usize;
        flash
            .write_page(
                APP_BASE + offset as u32,
                &pattern[offset..offset + PAGE_SIZE as usize],
            )
            .unwrap();
    }

    let mut buf = [0u8; ROW_SIZE as usize];
    flash.read_back(APP_BASE, &mut buf);
    assert_eq!(&buf[..], &pattern[..]);
}

#[test]
fn test_erase_row_rejects_unaligned_address() {
    let mut flash = MemFlash::new();
    assert_eq!(
        flash.erase_row(APP_BASE + 1),
        Err(UpdateError::InvalidAddress)
    );
}

#[test]
fn test_erase_row_rejects_address_outside_region() {
    let mut flash = MemFlash::new();
    assert_eq!(
        flash.erase_row(APP_BASE - ROW_SIZE),
        Err(UpdateError::InvalidAddress)
    );
    assert_eq!(
        flash.erase_row(APP_BASE + REGION_ROWS * ROW_SIZE),
        Err(UpdateError::InvalidAddress)
    );
}

#[test]
fn test_write_page_rejects_partial_page() {
    let mut flash = MemFlash::new();
    flash.erase_row(APP_BASE).unwrap();
    let short = [0u8; 10];
    assert_eq!(
        flash.write_page(APP_BASE, &short),
        Err(UpdateError::InvalidAddress)
    );
}

// =============================================================================
// Orchestrator: no pending update
// =============================================================================

#[test]
fn test_no_marker_means_no_flash_operations() {
    let mut store = MemStore::new().stage(IMAGE_A, &counting_pattern(256));
    let mut flash = MemFlash::new();

    let outcome = run(&mut store, &mut flash).unwrap();

    assert_eq!(outcome, UpdateOutcome::NoUpdatePending);
    assert_eq!(flash.geometry_calls, 0);
    assert!(flash.erase_calls.is_empty());
    assert!(flash.write_calls.is_empty());
}

// =============================================================================
// Orchestrator: end-to-end scenario 1 (one exact row)
// =============================================================================

#[test]
fn test_install_single_full_row() {
    let image = counting_pattern(ROW_SIZE as usize);
    let mut store = MemStore::new()
        .stage(MARKER_A, &[])
        .stage(IMAGE_A, &image);
    let mut flash = MemFlash::new();

    let outcome = run(&mut store, &mut flash).unwrap();

    assert_eq!(
        outcome,
        UpdateOutcome::Installed {
            slot: Slot::A,
            rows: 1,
            bytes: ROW_SIZE,
            crc: checksum::checksum(&image),
        }
    );
    assert_eq!(flash.erase_calls, vec![APP_BASE]);
    assert_eq!(
        flash.write_calls,
        vec![
            (APP_BASE, 64),
            (APP_BASE + 64, 64),
            (APP_BASE + 128, 64),
            (APP_BASE + 192, 64),
        ]
    );
    assert_eq!(flash.row(0), &image[..]);
    assert!(!store.has(MARKER_A), "marker must be cleared after commit");
    assert!(!store.has(IMAGE_A), "image must be deleted after commit");
}

// =============================================================================
// Orchestrator: end-to-end scenario 2 (short final row)
// =============================================================================

#[test]
fn test_install_pads_short_final_row_with_erased_bytes() {
    let image = counting_pattern(300);
    let mut store = MemStore::new()
        .stage(MARKER_A, &[])
        .stage(IMAGE_A, &image);
    let mut flash = MemFlash::new();

    let outcome = run(&mut store, &mut flash).unwrap();

    assert_eq!(
        outcome,
        UpdateOutcome::Installed {
            slot: Slot::A,
            rows: 2,
            bytes: 300,
            crc: checksum::checksum(&image),
        }
    );
    assert_eq!(flash.erase_calls, vec![APP_BASE, APP_BASE + ROW_SIZE]);

    // True image bytes land verbatim; the tail of the second row is the
    // erased pattern, not stale data.
    let written = &flash.mem[..300];
    assert_eq!(written, &image[..]);
    assert!(flash.mem[300..(2 * ROW_SIZE) as usize]
        .iter()
        .all(|&b| b == ERASED_BYTE));
}

#[test]
fn test_install_exact_row_multiple_erases_no_extra_row() {
    let image = counting_pattern(2 * ROW_SIZE as usize);
    let mut store = MemStore::new()
        .stage(MARKER_A, &[])
        .stage(IMAGE_A, &image);
    let mut flash = MemFlash::new();

    let outcome = run(&mut store, &mut flash).unwrap();

    assert_eq!(
        outcome,
        UpdateOutcome::Installed {
            slot: Slot::A,
            rows: 2,
            bytes: 2 * ROW_SIZE,
            crc: checksum::checksum(&image),
        }
    );
    assert_eq!(flash.erase_calls.len(), 2);
}

#[test]
fn test_install_image_filling_whole_region() {
    let image = counting_pattern((REGION_ROWS * ROW_SIZE) as usize);
    let mut store = MemStore::new()
        .stage(MARKER_A, &[])
        .stage(IMAGE_A, &image);
    let mut flash = MemFlash::new();

    let outcome = run(&mut store, &mut flash).unwrap();

    match outcome {
        UpdateOutcome::Installed { rows, bytes, .. } => {
            assert_eq!(rows, REGION_ROWS);
            assert_eq!(bytes, REGION_ROWS * ROW_SIZE);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(flash.mem, image);
}

// =============================================================================
// Orchestrator: end-to-end scenario 3 (erase failure mid-image)
// =============================================================================

#[test]
fn test_erase_failure_on_second_row_preserves_marker() {
    let image = counting_pattern(300);
    let mut store = MemStore::new()
        .stage(MARKER_A, &[])
        .stage(IMAGE_A, &image);
    let mut flash = MemFlash::new();
    flash.fail_erase_at = Some(APP_BASE + ROW_SIZE);

    let err = run(&mut store, &mut flash).unwrap_err();

    assert_eq!(err, UpdateError::EraseFailure);
    assert!(!err.is_fatal());
    assert!(store.has(MARKER_A), "marker must survive a failed attempt");
    assert!(store.has(IMAGE_A), "image must survive a failed attempt");
}

#[test]
fn test_write_failure_preserves_marker() {
    let image = counting_pattern(128);
    let mut store = MemStore::new()
        .stage(MARKER_B, &[])
        .stage(IMAGE_B, &image);
    let mut flash = MemFlash::new();
    flash.fail_write_at = Some(APP_BASE + 64);

    let err = run(&mut store, &mut flash).unwrap_err();

    assert_eq!(err, UpdateError::WriteFailure);
    assert!(store.has(MARKER_B));
    assert!(store.has(IMAGE_B));
}

// =============================================================================
// Orchestrator: end-to-end scenario 4 (double marker tie-break)
// =============================================================================

#[test]
fn test_both_markers_select_slot_a() {
    let image_a = counting_pattern(64);
    let image_b = vec![0xEE; 64];
    let mut store = MemStore::new()
        .stage(MARKER_A, &[])
        .stage(MARKER_B, &[])
        .stage(IMAGE_A, &image_a)
        .stage(IMAGE_B, &image_b);
    let mut flash = MemFlash::new();

    let outcome = run(&mut store, &mut flash).unwrap();

    match outcome {
        UpdateOutcome::Installed { slot, .. } => assert_eq!(slot, Slot::A),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(&flash.mem[..64], &image_a[..]);
    // Slot B's request is untouched; it drives the next boot.
    assert!(store.has(MARKER_B));
    assert!(store.has(IMAGE_B));
    assert!(!store.has(MARKER_A));
    assert!(!store.has(IMAGE_A));
}

// =============================================================================
// Orchestrator: verification failure
// =============================================================================

#[test]
fn test_corrupted_write_fails_verification_and_keeps_marker() {
    let image = counting_pattern(256);
    let mut store = MemStore::new()
        .stage(MARKER_A, &[])
        .stage(IMAGE_A, &image);
    let mut flash = MemFlash::new();
    flash.corrupt_writes = true;

    let err = run(&mut store, &mut flash).unwrap_err();

    match err {
        UpdateError::ChecksumMismatch { source, flash } => assert_ne!(source, flash),
        other => panic!("unexpected error {other:?}"),
    }
    assert!(store.has(MARKER_A));
    assert!(store.has(IMAGE_A));
}

// =============================================================================
// Orchestrator: remaining failure paths
// =============================================================================

#[test]
fn test_oversized_image_is_region_overflow() {
    let image = counting_pattern(((REGION_ROWS + 1) * ROW_SIZE) as usize);
    let mut store = MemStore::new()
        .stage(MARKER_A, &[])
        .stage(IMAGE_A, &image);
    let mut flash = MemFlash::new();

    let err = run(&mut store, &mut flash).unwrap_err();

    assert_eq!(err, UpdateError::RegionOverflow);
    assert!(store.has(MARKER_A));
    // Every erase stayed inside the region.
    assert_eq!(flash.erase_calls.len(), REGION_ROWS as usize);
}

#[test]
fn test_marker_without_image_is_image_missing() {
    let mut store = MemStore::new().stage(MARKER_B, &[]);
    let mut flash = MemFlash::new();

    let err = run(&mut store, &mut flash).unwrap_err();

    assert_eq!(err, UpdateError::ImageMissing);
    assert!(store.has(MARKER_B));
    assert!(flash.erase_calls.is_empty());
}

#[test]
fn test_read_error_mid_copy_is_storage_unavailable() {
    let image = counting_pattern(1024);
    let mut store = MemStore::new()
        .stage(MARKER_A, &[])
        .stage(IMAGE_A, &image);
    store.fail_reads_after = Some(3);
    let mut flash = MemFlash::new();

    let err = run(&mut store, &mut flash).unwrap_err();

    assert_eq!(err, UpdateError::StorageUnavailable);
    assert!(store.has(MARKER_A));
}

#[test]
fn test_empty_image_commits_without_touching_flash() {
    let mut store = MemStore::new().stage(MARKER_A, &[]).stage(IMAGE_A, &[]);
    let mut flash = MemFlash::new();

    let outcome = run(&mut store, &mut flash).unwrap();

    assert_eq!(
        outcome,
        UpdateOutcome::Installed {
            slot: Slot::A,
            rows: 0,
            bytes: 0,
            crc: checksum::checksum(&[]),
        }
    );
    assert!(flash.erase_calls.is_empty());
    assert!(!store.has(MARKER_A));
}

#[test]
fn test_undersized_row_buffer_is_rejected() {
    let mut store = MemStore::new()
        .stage(MARKER_A, &[])
        .stage(IMAGE_A, &counting_pattern(64));
    let mut flash = MemFlash::new();

    let mut small = [0u8; (ROW_SIZE - 1) as usize];
    let err = run_pending_update(&mut store, &mut flash, &mut small).unwrap_err();

    assert_eq!(err, UpdateError::InvalidAddress);
    assert!(store.has(MARKER_A));
}

#[test]
fn test_slot_b_marker_installs_image_b() {
    let image = vec![0xC3; 200];
    let mut store = MemStore::new()
        .stage(MARKER_B, &[])
        .stage(IMAGE_B, &image);
    let mut flash = MemFlash::new();

    let outcome = run(&mut store, &mut flash).unwrap();

    match outcome {
        UpdateOutcome::Installed { slot, bytes, .. } => {
            assert_eq!(slot, Slot::B);
            assert_eq!(bytes, 200);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(&flash.mem[..200], &image[..]);
    assert!(!store.has(MARKER_B));
    assert!(!store.has(IMAGE_B));
}
