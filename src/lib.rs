//! Page integrity and page compression for InnoDB on-disk pages.
//!
//! `pagecheck` implements the read-side codec of an InnoDB page store:
//! deciding whether a fixed-size page read from disk is corrupt — across
//! every checksum format a correct writer could legally have produced — and
//! decoding whole-page-compressed pages back into ordinary page buffers
//! without trusting their contents.
//!
//! # Typical read path
//!
//! ```no_run
//! use pagecheck::compress::decode;
//! use pagecheck::corruption::{ChecksumConfig, CorruptionDetector, PageVerdict};
//! use pagecheck::size::PageSize;
//!
//! let mut page: Vec<u8> = read_page_somehow();
//! let size = PageSize::new(16384, 16384, false);
//! let detector = CorruptionDetector::new(ChecksumConfig::default());
//!
//! // Safe on every page: non-compressed pages pass through untouched.
//! decode(&mut page, None, false)?;
//!
//! match detector.classify(&page, size, None, false) {
//!     PageVerdict::Valid | PageVerdict::Empty => { /* proceed */ }
//!     PageVerdict::Corrupted => { /* surface to the caller */ }
//! }
//! # fn read_page_somehow() -> Vec<u8> { vec![0; 16384] }
//! # Ok::<(), pagecheck::DecodeError>(())
//! ```
//!
//! # Module overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`checksum`] | CRC-32C (normal and legacy big-endian), fold, and zip checksum kernels |
//! | [`corruption`] | Verdict logic, strict-mode diagnostics, legacy-format learning |
//! | [`compress`] | Whole-page compression codec (zlib, LZ4) |
//! | [`size`] | Physical/logical page size descriptor from FSP flags |
//! | [`constants`] | Fixed on-disk format offsets and magic values |
//!
//! This crate owns no I/O: callers read the raw bytes, call
//! [`compress::decode`] then [`corruption::CorruptionDetector::classify`],
//! and decide what to do with the verdict. Recovery policy (abort, tolerate,
//! rewrite) is deliberately out of scope.

pub mod checksum;
pub mod compress;
pub mod constants;
pub mod corruption;
pub mod size;

use thiserror::Error;

/// Errors returned by the page decompression codec.
///
/// `classify` never errors; only [`compress::decode`] does. `Overflow` is the
/// one retryable condition (call again with a larger scratch buffer); the
/// rest are terminal for the current page.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Malformed sub-header or length field (bounds violation).
    #[error("corrupt compressed page: {0}")]
    Corruption(&'static str),

    /// The compressed payload failed to decompress to the declared size.
    #[error("page decompression failed")]
    DecompressFailed,

    /// Caller-supplied scratch buffer is too small; retry with `required` bytes.
    #[error("scratch buffer too small, {required} bytes required")]
    Overflow { required: usize },

    /// Could not allocate the internal scratch buffer.
    #[error("failed to allocate {0}-byte scratch buffer")]
    OutOfMemory(usize),

    /// Unknown compression algorithm id in the sub-header.
    #[error("unsupported compression algorithm id {0}")]
    Unsupported(u8),
}
