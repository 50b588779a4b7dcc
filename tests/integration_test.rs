//! End-to-end tests for the decode-then-classify read path.

use byteorder::{BigEndian, ByteOrder};

use pagecheck::checksum::{stamp_checksum, ChecksumAlgorithm};
use pagecheck::compress::{decode, encode, CompressionAlgorithm};
use pagecheck::constants::*;
use pagecheck::corruption::{ChecksumConfig, CorruptionDetector, PageVerdict};
use pagecheck::size::PageSize;

const INDEX_TYPE: u16 = 17855;

/// Build a checksummed page the way a correct writer would: content first,
/// trailer LSN and checksums last.
fn build_page(size: u32, algorithm: ChecksumAlgorithm, legacy: bool) -> Vec<u8> {
    let ps = size as usize;
    let mut page = vec![0u8; ps];
    BigEndian::write_u32(&mut page[FIL_PAGE_OFFSET..], 11);
    BigEndian::write_u64(&mut page[FIL_PAGE_LSN..], 0x0000_0001_2345_6789);
    BigEndian::write_u16(&mut page[FIL_PAGE_TYPE..], INDEX_TYPE);
    BigEndian::write_u32(&mut page[FIL_PAGE_ARCH_LOG_NO_OR_SPACE_ID..], 5);
    for (i, byte) in page.iter_mut().enumerate().skip(FIL_PAGE_DATA) {
        *byte = ((i / 16) & 0xFF) as u8;
    }
    stamp_checksum(&mut page, size, algorithm, legacy);
    page
}

#[test]
fn test_compressed_page_read_path() {
    // Writer: build a valid page, then compress it for storage
    for compression in [CompressionAlgorithm::Zlib, CompressionAlgorithm::Lz4] {
        for page_size in [4096u32, 16384, 65536] {
            let original = build_page(page_size, ChecksumAlgorithm::Crc32, false);
            let mut stored = encode(&original, compression);

            // Reader: decode unconditionally, then classify
            decode(&mut stored, None, false).unwrap();

            let detector = CorruptionDetector::new(ChecksumConfig::default());
            let size = PageSize::new(page_size, page_size, false);
            assert_eq!(
                detector.classify(&stored, size, None, false),
                PageVerdict::Valid,
                "{compression} at {page_size}"
            );
        }
    }
}

#[test]
fn test_corruption_survives_decompression() {
    let original = build_page(16384, ChecksumAlgorithm::Crc32, false);
    let mut stored = encode(&original, CompressionAlgorithm::Zlib);

    decode(&mut stored, None, false).unwrap();
    // Damage the decoded page body
    stored[9000] ^= 0x40;

    let detector = CorruptionDetector::new(ChecksumConfig::default());
    let size = PageSize::new(16384, 16384, false);
    assert_eq!(
        detector.classify(&stored, size, None, false),
        PageVerdict::Corrupted
    );
}

#[test]
fn test_cross_algorithm_matrix() {
    // Pages written under X must be Valid when read under any configured Y,
    // strict or not, because every X is a recognized legal alternate.
    let algorithms = [
        ChecksumAlgorithm::Crc32,
        ChecksumAlgorithm::InnoDB,
        ChecksumAlgorithm::None,
    ];
    let size = PageSize::new(16384, 16384, false);

    for written in algorithms {
        let page = build_page(16384, written, false);
        for read in algorithms {
            for strict in [false, true] {
                let detector = CorruptionDetector::new(ChecksumConfig::new(read, strict));
                assert_eq!(
                    detector.classify(&page, size, None, false),
                    PageVerdict::Valid,
                    "written {written:?}, read {read:?}, strict {strict}"
                );
            }
        }
    }
}

#[test]
fn test_legacy_big_endian_pages_across_algorithms() {
    let page = build_page(16384, ChecksumAlgorithm::Crc32, true);
    let size = PageSize::new(16384, 16384, false);

    for algorithm in [ChecksumAlgorithm::Crc32, ChecksumAlgorithm::InnoDB] {
        let detector = CorruptionDetector::new(ChecksumConfig::new(algorithm, false));
        assert_eq!(
            detector.classify(&page, size, None, false),
            PageVerdict::Valid,
            "configured {algorithm:?}"
        );
        assert!(detector.legacy_big_endian_seen());
    }
}

#[test]
fn test_double_write_recovery_path() {
    // Recovery replays possibly-torn compressed pages with the safe decoder
    let original = build_page(16384, ChecksumAlgorithm::Crc32, false);
    let mut stored = encode(&original, CompressionAlgorithm::Lz4);

    decode(&mut stored, None, true).unwrap();

    let detector = CorruptionDetector::new(ChecksumConfig::default());
    let size = PageSize::new(16384, 16384, false);
    // Recovery passes the current system LSN for the advisory check
    assert_eq!(
        detector.classify(&stored, size, Some(u64::MAX), false),
        PageVerdict::Valid
    );
}

#[test]
fn test_verdicts_serialize_for_reporting() {
    // Offline tools emit machine-readable reports of these types
    assert_eq!(
        serde_json::to_string(&PageVerdict::Corrupted).unwrap(),
        "\"corrupted\""
    );
    let config = ChecksumConfig::new(ChecksumAlgorithm::Crc32, true);
    let json = serde_json::to_value(config).unwrap();
    assert_eq!(json["strict"], true);

    let size = PageSize::from_fsp_flags(0);
    let json = serde_json::to_value(size).unwrap();
    assert_eq!(json["physical"], 16384);
}
