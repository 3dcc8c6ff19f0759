//! Container format: layout, round trips and damaged inputs

use proptest::prelude::*;
use std::fs;
use tempfile::TempDir;
use zwc_book::{ContainerReader, ContainerWriter, OffsetTable, ZwcError};

#[test]
fn test_three_page_scenario_on_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scenario.zwc_data");
    let pages = vec![vec![0x11u8; 1000], vec![0x22u8; 2000], vec![0x33u8; 1500]];

    let mut writer = ContainerWriter::new();
    for page in &pages {
        writer.push_page(page.clone()).unwrap();
    }
    let table = writer.write_atomic(&path).unwrap();

    assert_eq!(table.header_len(), 20);
    assert_eq!(table.offsets(), &[20, 1020, 3020, 4520]);
    assert_eq!(fs::metadata(&path).unwrap().len(), 4520);

    let reader = ContainerReader::open_file(&path, 3).unwrap();
    for (index, page) in pages.iter().enumerate() {
        assert_eq!(&reader.read_page(index as u32 + 1).unwrap(), page);
    }

    let mapped = ContainerReader::open_mmap(&path, 3).unwrap();
    assert_eq!(mapped.infer_page_count().unwrap(), 3);
    assert_eq!(mapped.read_page(3).unwrap(), pages[2]);
}

#[test]
fn test_header_bytes_are_little_endian_offsets() {
    let bytes = ContainerWriter::encode(&[vec![9u8; 0x0102]]).unwrap();
    assert_eq!(&bytes[0..4], &[0, 0, 0, 0]);
    assert_eq!(&bytes[4..8], &[12, 0, 0, 0]);
    assert_eq!(&bytes[8..12], &[0x0E, 0x01, 0, 0]);
    assert_eq!(bytes.len(), 12 + 0x0102);
}

#[test]
fn test_rewrite_replaces_previous_book() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("book.zwc_data");

    let first = ContainerWriter::encode(&[vec![1u8; 64], vec![2u8; 64]]).unwrap();
    fs::write(&path, &first).unwrap();

    let mut writer = ContainerWriter::new();
    writer.push_page(vec![3u8; 10]).unwrap();
    writer.write_atomic(&path).unwrap();

    let reader = ContainerReader::open_verified(fs::read(&path).unwrap(), 1).unwrap();
    assert_eq!(reader.read_page(1).unwrap(), vec![3u8; 10]);
}

#[test]
fn test_truncated_file_reads_fail_cleanly() {
    let bytes = ContainerWriter::encode(&[vec![1u8; 100], vec![2u8; 100]]).unwrap();

    for cut in [0usize, 7, 15, 120, bytes.len() - 1] {
        let damaged = bytes[..cut].to_vec();
        match ContainerReader::open(damaged, 2) {
            Err(ZwcError::ContainerTooShort { .. }) => assert!(cut < 8),
            Err(other) => panic!("unexpected open error {other}"),
            Ok(reader) => {
                let page_two = reader.read_page(2);
                assert!(page_two.is_err(), "page 2 readable from {cut} bytes");
            }
        }
    }
}

proptest! {
    #[test]
    fn prop_every_page_round_trips(
        pages in prop::collection::vec(prop::collection::vec(any::<u8>(), 1..300), 1..24)
    ) {
        let bytes = ContainerWriter::encode(&pages).unwrap();
        let reader = ContainerReader::open(bytes, pages.len() as u32).unwrap();

        for (index, page) in pages.iter().enumerate() {
            prop_assert_eq!(&reader.read_page(index as u32 + 1).unwrap(), page);
        }
    }

    #[test]
    fn prop_offsets_are_monotonic(
        lengths in prop::collection::vec(1usize..5000, 1..64)
    ) {
        let pages: Vec<Vec<u8>> = lengths.iter().map(|&len| vec![0xA5; len]).collect();
        let bytes = ContainerWriter::encode(&pages).unwrap();

        let table = OffsetTable::parse(&bytes, pages.len() as u32).unwrap();
        let offsets = table.offsets();
        prop_assert_eq!(offsets.len(), pages.len() + 1);
        prop_assert!(offsets.windows(2).all(|w| w[0] <= w[1]));
        prop_assert_eq!(offsets[0] as u64, table.header_len());

        let body: usize = lengths.iter().sum();
        prop_assert_eq!((offsets[pages.len()] - offsets[0]) as usize, body);
        prop_assert_eq!(table.end(), bytes.len() as u64);
        prop_assert!(table.validate(bytes.len() as u64).is_ok());
    }

    #[test]
    fn prop_verified_open_detects_wrong_count(
        count in 1u32..20,
        claimed in 1u32..20
    ) {
        let pages: Vec<Vec<u8>> = (0..count).map(|i| vec![i as u8; 16]).collect();
        let bytes = ContainerWriter::encode(&pages).unwrap();

        let result = ContainerReader::open_verified(bytes, claimed);
        if claimed == count {
            prop_assert!(result.is_ok());
        } else {
            let is_mismatch = matches!(
                result,
                Err(ZwcError::PageCountMismatch { expected, actual })
                    if expected == claimed && actual == count
            );
            prop_assert!(is_mismatch);
        }
    }
}
