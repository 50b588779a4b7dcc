//! Read-time corruption detection.
//!
//! [`CorruptionDetector::classify`] decides whether a page read from disk is
//! `Valid`, `Corrupted`, or `Empty` (never written). The configured algorithm
//! may differ from the algorithm in effect when a page was written, so each
//! branch tries every checksum formula a correct writer could legally have
//! produced, in a configured-algorithm-specific order, and short-circuits at
//! the first match. In strict mode any accepted non-plain match is reported
//! through the injected [`DiagnosticsSink`].
//!
//! The detector is a total function over well-sized buffers: it never errors
//! and never repairs anything. Recovery policy belongs to the caller.

use std::sync::atomic::{AtomicBool, Ordering};

use byteorder::{BigEndian, ByteOrder};
use serde::Serialize;

use crate::checksum::{
    page_checksum_crc32, page_checksum_innodb, page_checksum_innodb_old, zip_checksum,
    ChecksumAlgorithm,
};
use crate::constants::*;
use crate::size::PageSize;

/// Verdict of a page classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageVerdict {
    Valid,
    Corrupted,
    /// Never written: checksum and LSN fields zero, content zero. Callers
    /// treat this as not corrupted.
    Empty,
}

/// Engine-wide checksum configuration.
///
/// `strict` corresponds to the `strict_*` settings of the original engine:
/// legally alternate checksum formats are still accepted, but each acceptance
/// is reported through the diagnostics sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChecksumConfig {
    pub algorithm: ChecksumAlgorithm,
    pub strict: bool,
}

impl ChecksumConfig {
    pub fn new(algorithm: ChecksumAlgorithm, strict: bool) -> Self {
        ChecksumConfig { algorithm, strict }
    }
}

impl Default for ChecksumConfig {
    fn default() -> Self {
        ChecksumConfig {
            algorithm: ChecksumAlgorithm::Crc32,
            strict: false,
        }
    }
}

/// The checksum formula a page actually matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecksumVariant {
    Crc32,
    /// CRC-32C computed with the historical big-endian byte-order bug.
    Crc32LegacyBigEndian,
    /// Legacy fold checksums (new-style field 1, old-style field 2).
    InnoDB,
    /// `BUF_NO_CHECKSUM_MAGIC` sentinel.
    NoneSentinel,
}

/// Capability interface for optional read-time diagnostics.
///
/// All methods default to no-ops. Implementations must not block; the
/// detector treats every call as fire-and-forget logging.
pub trait DiagnosticsSink: Send + Sync {
    /// A checksum matched, but not the one the strict configuration expects.
    fn algorithm_mismatch(
        &self,
        _configured: ChecksumAlgorithm,
        _matched: ChecksumVariant,
        _page_number: u32,
    ) {
    }

    /// An all-zero, never-written page was detected.
    fn empty_page(&self, _space_id: u32, _page_number: u32) {}

    /// A page's LSN is ahead of the current system LSN (advisory only;
    /// likely a copy from a different server or a version mismatch).
    fn lsn_in_future(&self, _page_lsn: u64, _system_lsn: u64, _page_number: u32) {}
}

/// Default sink that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl DiagnosticsSink for NoopSink {}

/// Stateful page validator.
///
/// Holds the shared checksum configuration, the legacy-byte-order learning
/// flag, and the diagnostics sink. Safe to share across threads; the learning
/// flag is a relaxed best-effort ordering hint with no correctness role.
pub struct CorruptionDetector {
    config: ChecksumConfig,
    legacy_big_endian_seen: AtomicBool,
    sink: Box<dyn DiagnosticsSink>,
}

impl CorruptionDetector {
    /// Detector with the default no-op sink.
    pub fn new(config: ChecksumConfig) -> Self {
        Self::with_sink(config, Box::new(NoopSink))
    }

    /// Detector with an injected diagnostics sink.
    pub fn with_sink(config: ChecksumConfig, sink: Box<dyn DiagnosticsSink>) -> Self {
        CorruptionDetector {
            config,
            legacy_big_endian_seen: AtomicBool::new(false),
            sink,
        }
    }

    pub fn config(&self) -> ChecksumConfig {
        self.config
    }

    /// Reconfigure the detector. Expected to happen rarely (startup).
    pub fn set_config(&mut self, config: ChecksumConfig) {
        self.config = config;
    }

    /// True once a legacy big-endian CRC-32C page has been observed.
    pub fn legacy_big_endian_seen(&self) -> bool {
        self.legacy_big_endian_seen.load(Ordering::Relaxed)
    }

    /// Classify a page buffer.
    ///
    /// `page` must hold at least `size.physical()` bytes; shorter buffers are
    /// reported as `Corrupted`. `system_lsn`, when given, enables the
    /// advisory future-LSN check (recovery context). `skip` opts out of
    /// checksum verification entirely.
    pub fn classify(
        &self,
        page: &[u8],
        size: PageSize,
        system_lsn: Option<u64>,
        skip: bool,
    ) -> PageVerdict {
        let ps = size.physical() as usize;
        if page.len() < ps {
            return PageVerdict::Corrupted;
        }
        let page_number = BigEndian::read_u32(&page[FIL_PAGE_OFFSET..]);

        // Cheapest and most decisive check: the low-32 of the header LSN is
        // duplicated in the trailer of every uncompressed page.
        if !size.is_compressed() {
            let header_low = BigEndian::read_u32(&page[FIL_PAGE_LSN + 4..]);
            let trailer_low = BigEndian::read_u32(&page[ps - SIZE_FIL_TRAILER + 4..]);
            if header_low != trailer_low {
                return PageVerdict::Corrupted;
            }
        }

        if let Some(system_lsn) = system_lsn {
            let lsn = BigEndian::read_u64(&page[FIL_PAGE_LSN..]);
            if lsn > system_lsn {
                self.sink.lsn_in_future(lsn, system_lsn, page_number);
            }
        }

        // Explicit opt-out
        if skip || (self.config.algorithm == ChecksumAlgorithm::None && !self.config.strict) {
            return PageVerdict::Valid;
        }

        if size.is_compressed() {
            return self.verify_zip_checksum(page, size.physical());
        }

        let field1 = BigEndian::read_u32(&page[FIL_PAGE_SPACE_OR_CHKSUM..]);
        let field2 = BigEndian::read_u32(&page[ps - SIZE_FIL_TRAILER..]);
        let lsn = BigEndian::read_u64(&page[FIL_PAGE_LSN..]);

        if field1 == 0 && field2 == 0 && lsn == 0 {
            return if page_is_zeroes(page, ps) {
                let space_id = BigEndian::read_u32(&page[FIL_PAGE_ARCH_LOG_NO_OR_SPACE_ID..]);
                self.sink.empty_page(space_id, page_number);
                PageVerdict::Empty
            } else {
                PageVerdict::Corrupted
            };
        }

        match self.match_page(page, size.physical(), field1, field2) {
            Some(variant) => {
                self.note_match(variant, page_number);
                PageVerdict::Valid
            }
            None => PageVerdict::Corrupted,
        }
    }

    /// Verify the stored checksum of a ROW_FORMAT=COMPRESSED page.
    ///
    /// Same alternate-algorithm ladder as [`classify`](Self::classify), using
    /// the zip checksum formulas; all-zero pages yield `Empty`.
    pub fn verify_zip_checksum(&self, page: &[u8], physical_size: u32) -> PageVerdict {
        let ps = physical_size as usize;
        if page.len() < ps {
            return PageVerdict::Corrupted;
        }
        let stored = BigEndian::read_u32(&page[FIL_PAGE_SPACE_OR_CHKSUM..]);
        let lsn = BigEndian::read_u64(&page[FIL_PAGE_LSN..]);
        let page_number = BigEndian::read_u32(&page[FIL_PAGE_OFFSET..]);

        if stored == 0 && lsn == 0 {
            return if page[..ps].iter().all(|&b| b == 0) {
                let space_id = BigEndian::read_u32(&page[FIL_PAGE_ARCH_LOG_NO_OR_SPACE_ID..]);
                self.sink.empty_page(space_id, page_number);
                PageVerdict::Empty
            } else {
                PageVerdict::Corrupted
            };
        }

        if self.config.algorithm == ChecksumAlgorithm::None && !self.config.strict {
            return PageVerdict::Valid;
        }

        match self.match_zip_page(page, physical_size, stored) {
            Some(variant) => {
                self.note_match(variant, page_number);
                PageVerdict::Valid
            }
            None => PageVerdict::Corrupted,
        }
    }

    /// Try the checksum formulas of an uncompressed page in the order the
    /// configured algorithm prescribes.
    fn match_page(
        &self,
        page: &[u8],
        physical_size: u32,
        field1: u32,
        field2: u32,
    ) -> Option<ChecksumVariant> {
        let legacy_seen = self.legacy_big_endian_seen.load(Ordering::Relaxed);

        match self.config.algorithm {
            ChecksumAlgorithm::Crc32 => {
                // Once a legacy big-endian page has been seen, later pages of
                // the same provenance are likely; try that variant first.
                if legacy_seen && self.matches_crc32_legacy(page, physical_size, field1, field2) {
                    return Some(ChecksumVariant::Crc32LegacyBigEndian);
                }
                let crc = page_checksum_crc32(page, physical_size, false);
                if field1 == crc && field2 == crc {
                    return Some(ChecksumVariant::Crc32);
                }
                // A writer running with checksums off may have stamped the
                // sentinel into either field of an otherwise-CRC page.
                if field_matches(field1, crc) && field_matches(field2, crc) {
                    return Some(ChecksumVariant::NoneSentinel);
                }
                if !legacy_seen && self.matches_crc32_legacy(page, physical_size, field1, field2) {
                    return Some(ChecksumVariant::Crc32LegacyBigEndian);
                }
                if self.matches_fold(page, physical_size, field1, field2) {
                    return Some(ChecksumVariant::InnoDB);
                }
                None
            }
            ChecksumAlgorithm::InnoDB => {
                let new_fold = page_checksum_innodb(page, physical_size);
                let old_fold = page_checksum_innodb_old(page);
                if field1 == new_fold && field2 == old_fold {
                    return Some(ChecksumVariant::InnoDB);
                }
                if field_matches(field1, new_fold) && field_matches(field2, old_fold) {
                    return Some(ChecksumVariant::NoneSentinel);
                }
                self.match_crc32_either_order(page, physical_size, field1, field2, legacy_seen)
            }
            ChecksumAlgorithm::None => {
                // Reached only in strict mode; non-strict None returned early.
                if field1 == BUF_NO_CHECKSUM_MAGIC && field2 == BUF_NO_CHECKSUM_MAGIC {
                    return Some(ChecksumVariant::NoneSentinel);
                }
                if let Some(variant) =
                    self.match_crc32_either_order(page, physical_size, field1, field2, legacy_seen)
                {
                    return Some(variant);
                }
                if self.matches_fold(page, physical_size, field1, field2) {
                    return Some(ChecksumVariant::InnoDB);
                }
                None
            }
        }
    }

    fn matches_crc32_legacy(&self, page: &[u8], physical_size: u32, f1: u32, f2: u32) -> bool {
        let legacy = page_checksum_crc32(page, physical_size, true);
        // Require at least one real match so pure-sentinel pages are not
        // attributed to the legacy variant.
        field_matches(f1, legacy) && field_matches(f2, legacy) && (f1 == legacy || f2 == legacy)
    }

    fn matches_fold(&self, page: &[u8], physical_size: u32, f1: u32, f2: u32) -> bool {
        f1 == page_checksum_innodb(page, physical_size) && f2 == page_checksum_innodb_old(page)
    }

    fn match_crc32_either_order(
        &self,
        page: &[u8],
        physical_size: u32,
        f1: u32,
        f2: u32,
        legacy_first: bool,
    ) -> Option<ChecksumVariant> {
        if legacy_first && self.matches_crc32_legacy(page, physical_size, f1, f2) {
            return Some(ChecksumVariant::Crc32LegacyBigEndian);
        }
        let crc = page_checksum_crc32(page, physical_size, false);
        if field_matches(f1, crc) && field_matches(f2, crc) && (f1 == crc || f2 == crc) {
            return Some(ChecksumVariant::Crc32);
        }
        if !legacy_first && self.matches_crc32_legacy(page, physical_size, f1, f2) {
            return Some(ChecksumVariant::Crc32LegacyBigEndian);
        }
        None
    }

    /// Try the zip checksum formulas in configured-algorithm order.
    fn match_zip_page(
        &self,
        page: &[u8],
        physical_size: u32,
        stored: u32,
    ) -> Option<ChecksumVariant> {
        let legacy_seen = self.legacy_big_endian_seen.load(Ordering::Relaxed);
        let zip = |algorithm, legacy| zip_checksum(page, physical_size, algorithm, legacy);

        match self.config.algorithm {
            ChecksumAlgorithm::Crc32 => {
                if legacy_seen && stored == zip(ChecksumAlgorithm::Crc32, true) {
                    return Some(ChecksumVariant::Crc32LegacyBigEndian);
                }
                if stored == zip(ChecksumAlgorithm::Crc32, false) {
                    return Some(ChecksumVariant::Crc32);
                }
                if stored == BUF_NO_CHECKSUM_MAGIC {
                    return Some(ChecksumVariant::NoneSentinel);
                }
                if !legacy_seen && stored == zip(ChecksumAlgorithm::Crc32, true) {
                    return Some(ChecksumVariant::Crc32LegacyBigEndian);
                }
                if stored == zip(ChecksumAlgorithm::InnoDB, false) {
                    return Some(ChecksumVariant::InnoDB);
                }
                None
            }
            ChecksumAlgorithm::InnoDB => {
                if stored == zip(ChecksumAlgorithm::InnoDB, false) {
                    return Some(ChecksumVariant::InnoDB);
                }
                if stored == BUF_NO_CHECKSUM_MAGIC {
                    return Some(ChecksumVariant::NoneSentinel);
                }
                self.match_zip_crc32_either_order(page, physical_size, stored, legacy_seen)
            }
            ChecksumAlgorithm::None => {
                if stored == BUF_NO_CHECKSUM_MAGIC {
                    return Some(ChecksumVariant::NoneSentinel);
                }
                if let Some(variant) =
                    self.match_zip_crc32_either_order(page, physical_size, stored, legacy_seen)
                {
                    return Some(variant);
                }
                if stored == zip_checksum(page, physical_size, ChecksumAlgorithm::InnoDB, false) {
                    return Some(ChecksumVariant::InnoDB);
                }
                None
            }
        }
    }

    fn match_zip_crc32_either_order(
        &self,
        page: &[u8],
        physical_size: u32,
        stored: u32,
        legacy_first: bool,
    ) -> Option<ChecksumVariant> {
        let legacy = zip_checksum(page, physical_size, ChecksumAlgorithm::Crc32, true);
        let normal = zip_checksum(page, physical_size, ChecksumAlgorithm::Crc32, false);
        if legacy_first && stored == legacy {
            return Some(ChecksumVariant::Crc32LegacyBigEndian);
        }
        if stored == normal {
            return Some(ChecksumVariant::Crc32);
        }
        if !legacy_first && stored == legacy {
            return Some(ChecksumVariant::Crc32LegacyBigEndian);
        }
        None
    }

    /// Record a successful match: update the learning flag and, in strict
    /// mode, report any non-plain acceptance.
    fn note_match(&self, variant: ChecksumVariant, page_number: u32) {
        if variant == ChecksumVariant::Crc32LegacyBigEndian {
            self.legacy_big_endian_seen.store(true, Ordering::Relaxed);
        }
        let plain = match self.config.algorithm {
            ChecksumAlgorithm::Crc32 => ChecksumVariant::Crc32,
            ChecksumAlgorithm::InnoDB => ChecksumVariant::InnoDB,
            ChecksumAlgorithm::None => ChecksumVariant::NoneSentinel,
        };
        if self.config.strict && variant != plain {
            self.sink
                .algorithm_mismatch(self.config.algorithm, variant, page_number);
        }
    }
}

#[inline]
fn field_matches(field: u32, expected: u32) -> bool {
    field == expected || field == BUF_NO_CHECKSUM_MAGIC
}

/// True if every byte of the page is zero, excluding the flush-LSN window
/// `[26, 34)` which is legitimately repurposed for compression metadata even
/// on otherwise-empty pages.
fn page_is_zeroes(page: &[u8], physical_size: usize) -> bool {
    page[..FIL_PAGE_FILE_FLUSH_LSN].iter().all(|&b| b == 0)
        && page[FIL_PAGE_ARCH_LOG_NO_OR_SPACE_ID..physical_size]
            .iter()
            .all(|&b| b == 0)
}
