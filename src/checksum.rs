//! Page checksum algorithms.
//!
//! Every page carries two stored checksum fields: "field 1" in the FIL header
//! (bytes 0..4) and "field 2" at the start of the FIL trailer. Three families
//! of formulas have been written into those fields over the years:
//!
//! - CRC-32C over two disjoint ranges, XORed (the modern default), plus a
//!   byte-order-reversed variant produced by old big-endian builds;
//! - the legacy InnoDB fold (rolling-hash) checksums, new-style for field 1
//!   and old-style for field 2;
//! - the `BUF_NO_CHECKSUM_MAGIC` sentinel written when checksums are off.
//!
//! Compressed (ROW_FORMAT=COMPRESSED) pages use a parallel family restricted
//! to their on-disk byte range, see [`zip_checksum`].
//!
//! All functions here are pure and reentrant; verdict logic lives in
//! [`crate::corruption`].

use byteorder::{BigEndian, ByteOrder};
use serde::Serialize;

use crate::constants::*;

/// Checksum algorithm configured for the engine or detected on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecksumAlgorithm {
    /// CRC-32C over the standard header/data ranges (modern default).
    Crc32,
    /// Legacy InnoDB fold checksums.
    InnoDB,
    /// No checksum; fields hold `BUF_NO_CHECKSUM_MAGIC`.
    None,
}

/// CRC-32C page checksum: `crc(bytes 4..26) XOR crc(bytes 38..size-8)`.
///
/// The skipped ranges are the stored checksum itself, the flush-LSN/space-id
/// area (written outside the buffer pool), and the trailer.
///
/// With `legacy_big_endian` the historical big-endian bug is reproduced:
/// old builds read each aligned 8-byte word in native (big-endian) order, so
/// the equivalent little-endian computation feeds every address-aligned
/// 8-byte group in reversed byte order. Page frames are 8-byte aligned, so
/// alignment is taken relative to the start of the page.
pub fn page_checksum_crc32(page: &[u8], physical_size: u32, legacy_big_endian: bool) -> u32 {
    let end = physical_size as usize - FIL_PAGE_END_LSN_OLD_CHKSUM;
    let c1 = crc32_at(
        &page[FIL_PAGE_OFFSET..FIL_PAGE_FILE_FLUSH_LSN],
        FIL_PAGE_OFFSET,
        legacy_big_endian,
    );
    let c2 = crc32_at(&page[FIL_PAGE_DATA..end], FIL_PAGE_DATA, legacy_big_endian);
    c1 ^ c2
}

/// Legacy InnoDB "new-style" fold checksum (stored in field 1).
///
/// Folds the same two ranges as the CRC formula and sums the results,
/// truncated to 32 bits.
pub fn page_checksum_innodb(page: &[u8], physical_size: u32) -> u32 {
    let end = physical_size as usize - FIL_PAGE_END_LSN_OLD_CHKSUM;
    let fold1 = ut_fold_binary(&page[FIL_PAGE_OFFSET..FIL_PAGE_FILE_FLUSH_LSN]);
    let fold2 = ut_fold_binary(&page[FIL_PAGE_DATA..end]);
    fold1.wrapping_add(fold2) as u32
}

/// Legacy InnoDB "old-style" fold checksum (stored in field 2).
///
/// Folds bytes 0..26, which *includes* the stored field-1 checksum. A writer
/// must therefore stamp field 1 before computing this value; see
/// [`stamp_checksum`].
pub fn page_checksum_innodb_old(page: &[u8]) -> u32 {
    ut_fold_binary(&page[..FIL_PAGE_FILE_FLUSH_LSN]) as u32
}

/// Checksum of a ROW_FORMAT=COMPRESSED page over its on-disk byte range.
///
/// Covers bytes `[4,16)`, `[24,26)` and `[34, physical_size)` — everything
/// except the stored checksum, the unused prev/next pointers of the zip
/// format, and the LSN (rewritten on every flush).
///
/// - `Crc32`: XOR of the three range CRC-32Cs (byte-order-reversed when
///   `legacy_big_endian` is set);
/// - `InnoDB`: one Adler-32 rolled across the three ranges, seeded with 0;
/// - `None`: the `BUF_NO_CHECKSUM_MAGIC` sentinel.
pub fn zip_checksum(
    page: &[u8],
    physical_size: u32,
    algorithm: ChecksumAlgorithm,
    legacy_big_endian: bool,
) -> u32 {
    let size = physical_size as usize;
    match algorithm {
        ChecksumAlgorithm::Crc32 => {
            crc32_at(&page[FIL_PAGE_OFFSET..FIL_PAGE_LSN], FIL_PAGE_OFFSET, legacy_big_endian)
                ^ crc32_at(
                    &page[FIL_PAGE_TYPE..FIL_PAGE_FILE_FLUSH_LSN],
                    FIL_PAGE_TYPE,
                    legacy_big_endian,
                )
                ^ crc32_at(
                    &page[FIL_PAGE_ARCH_LOG_NO_OR_SPACE_ID..size],
                    FIL_PAGE_ARCH_LOG_NO_OR_SPACE_ID,
                    legacy_big_endian,
                )
        }
        ChecksumAlgorithm::InnoDB => {
            let mut adler = adler2::Adler32::from_checksum(0);
            adler.write_slice(&page[FIL_PAGE_OFFSET..FIL_PAGE_LSN]);
            adler.write_slice(&page[FIL_PAGE_TYPE..FIL_PAGE_FILE_FLUSH_LSN]);
            adler.write_slice(&page[FIL_PAGE_ARCH_LOG_NO_OR_SPACE_ID..size]);
            adler.checksum()
        }
        ChecksumAlgorithm::None => BUF_NO_CHECKSUM_MAGIC,
    }
}

/// CRC-32C of one range, optionally in the legacy big-endian byte order.
///
/// `offset` is the byte offset of `data[0]` within the page frame; the
/// legacy variant's 8-byte grouping is anchored to it.
fn crc32_at(data: &[u8], offset: usize, legacy_big_endian: bool) -> u32 {
    if legacy_big_endian {
        crc32_legacy_big_endian(data, offset)
    } else {
        crc32c::crc32c(data)
    }
}

fn crc32_legacy_big_endian(data: &[u8], offset: usize) -> u32 {
    // Leading bytes up to the first 8-aligned page offset are fed as-is,
    // then each full 8-byte group is reversed; the tail is fed as-is again.
    let lead = (8 - offset % 8) % 8;
    let lead = lead.min(data.len());

    let mut crc = crc32c::crc32c(&data[..lead]);
    let mut i = lead;
    while i + 8 <= data.len() {
        let mut word = [0u8; 8];
        word.copy_from_slice(&data[i..i + 8]);
        word.reverse();
        crc = crc32c::crc32c_append(crc, &word);
        i += 8;
    }
    crc32c::crc32c_append(crc, &data[i..])
}

/// InnoDB's ut_fold_ulint_pair — the core folding recurrence.
///
/// Uses u64 to match `ulint` on LP64 platforms; callers truncate to 32 bits.
#[inline]
fn ut_fold_ulint_pair(n1: u64, n2: u64) -> u64 {
    let mask = UT_HASH_RANDOM_MASK as u64;
    let mask2 = UT_HASH_RANDOM_MASK2 as u64;
    ((((n1 ^ n2 ^ mask2) << 8).wrapping_add(n1)) ^ mask).wrapping_add(n2)
}

/// InnoDB's ut_fold_binary — fold a byte sequence.
///
/// Consumes big-endian u32 words while at least 8 bytes remain, then the
/// remainder: single bytes, with a final u32 word if 4 or more are left.
fn ut_fold_binary(data: &[u8]) -> u64 {
    let mut fold: u64 = 0;
    let aligned = data.len() & !7;

    let mut i = 0;
    while i < aligned {
        fold = ut_fold_ulint_pair(fold, BigEndian::read_u32(&data[i..]) as u64);
        fold = ut_fold_ulint_pair(fold, BigEndian::read_u32(&data[i + 4..]) as u64);
        i += 8;
    }

    let rem = data.len() & 7;
    if rem >= 4 {
        for _ in 0..rem - 4 {
            fold = ut_fold_ulint_pair(fold, data[i] as u64);
            i += 1;
        }
        fold = ut_fold_ulint_pair(fold, BigEndian::read_u32(&data[i..]) as u64);
    } else {
        for _ in 0..rem {
            fold = ut_fold_ulint_pair(fold, data[i] as u64);
            i += 1;
        }
    }

    fold
}

/// Stamp both checksum fields of an uncompressed page.
///
/// Also rewrites the trailer LSN low-32 from the header LSN first, so the
/// checksums cover a self-consistent page.
///
/// - `Crc32`: both fields get the CRC (legacy byte order if requested);
/// - `InnoDB`: field 1 gets the new-style fold, then field 2 gets the
///   old-style fold (whose input covers the freshly written field 1);
/// - `None`: both fields get `BUF_NO_CHECKSUM_MAGIC`.
pub fn stamp_checksum(
    page: &mut [u8],
    physical_size: u32,
    algorithm: ChecksumAlgorithm,
    legacy_big_endian: bool,
) {
    let trailer = physical_size as usize - SIZE_FIL_TRAILER;
    let lsn = BigEndian::read_u64(&page[FIL_PAGE_LSN..]);
    BigEndian::write_u32(&mut page[trailer + 4..], (lsn & 0xFFFF_FFFF) as u32);

    match algorithm {
        ChecksumAlgorithm::Crc32 => {
            let crc = page_checksum_crc32(page, physical_size, legacy_big_endian);
            BigEndian::write_u32(&mut page[FIL_PAGE_SPACE_OR_CHKSUM..], crc);
            BigEndian::write_u32(&mut page[trailer..], crc);
        }
        ChecksumAlgorithm::InnoDB => {
            let new_fold = page_checksum_innodb(page, physical_size);
            BigEndian::write_u32(&mut page[FIL_PAGE_SPACE_OR_CHKSUM..], new_fold);
            // Old-style fold must see the new-style value already in place
            let old_fold = page_checksum_innodb_old(page);
            BigEndian::write_u32(&mut page[trailer..], old_fold);
        }
        ChecksumAlgorithm::None => {
            BigEndian::write_u32(&mut page[FIL_PAGE_SPACE_OR_CHKSUM..], BUF_NO_CHECKSUM_MAGIC);
            BigEndian::write_u32(&mut page[trailer..], BUF_NO_CHECKSUM_MAGIC);
        }
    }
}

/// Stamp field 1 of a ROW_FORMAT=COMPRESSED page.
pub fn stamp_zip_checksum(
    page: &mut [u8],
    physical_size: u32,
    algorithm: ChecksumAlgorithm,
    legacy_big_endian: bool,
) {
    let checksum = zip_checksum(page, physical_size, algorithm, legacy_big_endian);
    BigEndian::write_u32(&mut page[FIL_PAGE_SPACE_OR_CHKSUM..], checksum);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_page(size: u32) -> Vec<u8> {
        let mut page = vec![0u8; size as usize];
        for (i, byte) in page.iter_mut().enumerate() {
            *byte = (i.wrapping_mul(31).wrapping_add(7) & 0xFF) as u8;
        }
        BigEndian::write_u64(&mut page[FIL_PAGE_LSN..], 0x1122_3344_5566_7788);
        page
    }

    #[test]
    fn test_crc32_ignores_skipped_ranges() {
        let mut page = sample_page(16384);
        let before = page_checksum_crc32(&page, 16384, false);

        // Stored checksum, flush-LSN area and trailer are all outside the
        // covered ranges
        BigEndian::write_u32(&mut page[FIL_PAGE_SPACE_OR_CHKSUM..], 0xFFFF_FFFF);
        page[FIL_PAGE_FILE_FLUSH_LSN] = 0xAB;
        page[16384 - 1] = 0xCD;
        assert_eq!(page_checksum_crc32(&page, 16384, false), before);

        // A data byte is covered
        page[100] ^= 1;
        assert_ne!(page_checksum_crc32(&page, 16384, false), before);
    }

    #[test]
    fn test_legacy_byte_order_differs() {
        let page = sample_page(16384);
        assert_ne!(
            page_checksum_crc32(&page, 16384, false),
            page_checksum_crc32(&page, 16384, true)
        );
    }

    #[test]
    fn test_legacy_byte_order_is_stable() {
        let page = sample_page(4096);
        let a = page_checksum_crc32(&page, 4096, true);
        let b = page_checksum_crc32(&page, 4096, true);
        assert_eq!(a, b);
    }

    #[test]
    fn test_fold_binary_empty() {
        assert_eq!(ut_fold_binary(&[]), 0);
    }

    #[test]
    fn test_fold_binary_remainder_paths() {
        // Lengths exercising every remainder branch (0..=7)
        let data: Vec<u8> = (0u8..64).collect();
        let mut seen = std::collections::HashSet::new();
        for len in 8..16 {
            seen.insert(ut_fold_binary(&data[..len]));
        }
        assert_eq!(seen.len(), 8);
    }

    #[test]
    fn test_innodb_old_covers_field1() {
        let mut page = sample_page(16384);
        let before = page_checksum_innodb_old(&page);
        BigEndian::write_u32(&mut page[FIL_PAGE_SPACE_OR_CHKSUM..], 0x1234_5678);
        assert_ne!(page_checksum_innodb_old(&page), before);
    }

    #[test]
    fn test_stamp_crc32_matches_recompute() {
        let mut page = sample_page(16384);
        stamp_checksum(&mut page, 16384, ChecksumAlgorithm::Crc32, false);
        let stored = BigEndian::read_u32(&page[FIL_PAGE_SPACE_OR_CHKSUM..]);
        assert_eq!(stored, page_checksum_crc32(&page, 16384, false));
        // Trailer LSN synced to the header LSN low-32
        let trailer = 16384 - SIZE_FIL_TRAILER;
        assert_eq!(BigEndian::read_u32(&page[trailer + 4..]), 0x5566_7788);
    }

    #[test]
    fn test_stamp_innodb_old_fold_consistency() {
        let mut page = sample_page(16384);
        stamp_checksum(&mut page, 16384, ChecksumAlgorithm::InnoDB, false);
        let trailer = 16384 - SIZE_FIL_TRAILER;
        assert_eq!(
            BigEndian::read_u32(&page[trailer..]),
            page_checksum_innodb_old(&page)
        );
    }

    #[test]
    fn test_zip_checksum_none_sentinel() {
        let page = sample_page(8192);
        assert_eq!(
            zip_checksum(&page, 8192, ChecksumAlgorithm::None, false),
            BUF_NO_CHECKSUM_MAGIC
        );
    }

    #[test]
    fn test_zip_checksum_skips_lsn() {
        let mut page = sample_page(8192);
        let crc = zip_checksum(&page, 8192, ChecksumAlgorithm::Crc32, false);
        let adler = zip_checksum(&page, 8192, ChecksumAlgorithm::InnoDB, false);

        BigEndian::write_u64(&mut page[FIL_PAGE_LSN..], 0);
        assert_eq!(zip_checksum(&page, 8192, ChecksumAlgorithm::Crc32, false), crc);
        assert_eq!(
            zip_checksum(&page, 8192, ChecksumAlgorithm::InnoDB, false),
            adler
        );

        // Bytes from 34 onwards are covered
        page[40] ^= 1;
        assert_ne!(zip_checksum(&page, 8192, ChecksumAlgorithm::Crc32, false), crc);
    }

    #[test]
    fn test_zip_adler_matches_manual_roll() {
        let page = sample_page(4096);
        let mut adler = adler2::Adler32::from_checksum(0);
        adler.write_slice(&page[4..16]);
        adler.write_slice(&page[24..26]);
        adler.write_slice(&page[34..4096]);
        assert_eq!(
            zip_checksum(&page, 4096, ChecksumAlgorithm::InnoDB, false),
            adler.checksum()
        );
    }
}
