// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Chunking-invariance tests for the image checksum.

use wafer_common::checksum::{checksum, ImageCrc};

fn incremental(data: &[u8], chunk: usize) -> u32 {
    let mut crc = ImageCrc::new();
    for piece in data.chunks(chunk) {
        crc.update(piece);
    }
    crc.finalize()
}

#[test]
fn test_known_check_value() {
    // The standard CRC-32/ISO-HDLC check string.
    assert_eq!(checksum(b"123456789"), 0xCBF4_3926);
}

#[test]
fn test_chunking_never_changes_the_result() {
    let data: Vec<u8> = (0..1021).map(|i| (i * 7) as u8).collect();
    let whole = checksum(&data);

    for chunk in [1, 2, 3, 64, 100, 256, 1021, 4096] {
        assert_eq!(
            incremental(&data, chunk),
            whole,
            "chunk size {chunk} changed the checksum"
        );
    }
}

#[test]
fn test_two_way_split_matches_concatenation() {
    let data: Vec<u8> = (0..300).map(|i| i as u8).collect();
    let whole = checksum(&data);

    for split in 0..data.len() {
        let (a, b) = data.split_at(split);
        let mut crc = ImageCrc::new();
        crc.update(a);
        crc.update(b);
        assert_eq!(crc.finalize(), whole, "split at {split} changed the checksum");
    }
}

#[test]
fn test_empty_updates_are_neutral() {
    let data = [0xA5u8; 32];
    let mut crc = ImageCrc::new();
    crc.update(&[]);
    crc.update(&data);
    crc.update(&[]);
    assert_eq!(crc.finalize(), checksum(&data));
}
