//! On-disk format constants for InnoDB pages.
//!
//! These values are fixed by the legacy file format and are derived from the
//! MySQL/InnoDB source headers:
//! - fil0fil.h (FIL header/trailer, compressed-page sub-header)
//! - fsp0fsp.h (FSP flags, page size encoding)
//! - buf0buf.h / ut0rnd.h (checksum magic and fold masks)

// Supported page sizes (powers of two)
pub const UNIV_PAGE_SIZE_MIN: u32 = 4096;
pub const UNIV_PAGE_SIZE_MAX: u32 = 65536;
pub const UNIV_PAGE_SIZE_DEFAULT: u32 = 16384;

// Smallest physical size of a ROW_FORMAT=COMPRESSED page
pub const UNIV_ZIP_SIZE_MIN: u32 = 1024;

// FIL header (38 bytes at the start of every page)
pub const SIZE_FIL_HEAD: usize = 38;
pub const FIL_PAGE_SPACE_OR_CHKSUM: usize = 0; // 4 bytes - stored checksum ("field 1")
pub const FIL_PAGE_OFFSET: usize = 4; // 4 bytes - page number
pub const FIL_PAGE_PREV: usize = 8; // 4 bytes - previous page
pub const FIL_PAGE_NEXT: usize = 12; // 4 bytes - next page
pub const FIL_PAGE_LSN: usize = 16; // 8 bytes - LSN of newest modification
pub const FIL_PAGE_TYPE: usize = 24; // 2 bytes - page type
pub const FIL_PAGE_FILE_FLUSH_LSN: usize = 26; // 8 bytes - flush LSN (page 0 only)
pub const FIL_PAGE_ARCH_LOG_NO_OR_SPACE_ID: usize = 34; // 4 bytes - space id

// Start of page data, immediately after the FIL header
pub const FIL_PAGE_DATA: usize = 38;

// FIL trailer (last 8 bytes of every page):
// 4 bytes old-style checksum ("field 2") + 4 bytes low-32 of the header LSN
pub const SIZE_FIL_TRAILER: usize = 8;
pub const FIL_PAGE_END_LSN_OLD_CHKSUM: usize = 8;

// Page type marking a whole-page-compressed page
pub const FIL_PAGE_COMPRESSED: u16 = 14;

// Compressed-page sub-header, overlaying the flush-LSN field at bytes 26..34
pub const FIL_PAGE_VERSION: usize = 26; // 1 byte
pub const FIL_PAGE_ALGORITHM_V1: usize = 27; // 1 byte
pub const FIL_PAGE_ORIGINAL_TYPE_V1: usize = 28; // 2 bytes
pub const FIL_PAGE_ORIGINAL_SIZE_V1: usize = 30; // 2 bytes
pub const FIL_PAGE_COMPRESS_SIZE_V1: usize = 32; // 2 bytes

// Supported sub-header versions
pub const FIL_PAGE_VERSION_1: u8 = 1;
pub const FIL_PAGE_VERSION_2: u8 = 2;

// Decompressed payload bounds, derived from the supported physical sizes
pub const MIN_PAGE_PAYLOAD: usize = UNIV_PAGE_SIZE_MIN as usize - FIL_PAGE_DATA;
pub const MAX_PAGE_PAYLOAD: usize = UNIV_PAGE_SIZE_MAX as usize - FIL_PAGE_DATA;

// Stored in both checksum fields when innodb_checksum_algorithm=none
pub const BUF_NO_CHECKSUM_MAGIC: u32 = 0xDEAD_BEEF;

// Masks of the legacy fold (rolling-hash) checksum
pub const UT_HASH_RANDOM_MASK: u32 = 1_463_735_687;
pub const UT_HASH_RANDOM_MASK2: u32 = 1_653_893_711;

// FSP flag fields used for page size detection (page 0 of a tablespace)
pub const FSP_FLAGS_POS_ZIP_SSIZE: u32 = 1; // bits 1..=4 - compressed page ssize
pub const FSP_FLAGS_MASK_ZIP_SSIZE: u32 = 0xF << FSP_FLAGS_POS_ZIP_SSIZE;
pub const FSP_FLAGS_POS_PAGE_SSIZE: u32 = 6; // bits 6..=9 - logical page ssize
pub const FSP_FLAGS_MASK_PAGE_SSIZE: u32 = 0xF << FSP_FLAGS_POS_PAGE_SSIZE;
