//! Whole-page compression codec.
//!
//! A page stored with transparent page compression keeps its 38-byte FIL
//! header; the flush-LSN field is overlaid with a sub-header (version,
//! algorithm, original type, original size, compressed size) and the payload
//! after byte 38 is the compressed body, zero-padded to the physical size.
//!
//! [`decode`] reverses that in place and is safe to call unconditionally on
//! every page read: pages whose type is not `FIL_PAGE_COMPRESSED` pass
//! through untouched. The input is never trusted — every length comes from a
//! possibly-corrupt header and is bounds-checked before use.

use byteorder::{BigEndian, ByteOrder};
use flate2::write::ZlibEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};
use serde::Serialize;
use std::io::Write;

use crate::constants::*;
use crate::DecodeError;

/// Compression algorithm of a whole-page-compressed page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionAlgorithm {
    None,
    Zlib,
    Lz4,
}

impl CompressionAlgorithm {
    /// Map an on-disk algorithm id to the enum; unknown ids yield `None`.
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(CompressionAlgorithm::None),
            1 => Some(CompressionAlgorithm::Zlib),
            2 => Some(CompressionAlgorithm::Lz4),
            _ => None,
        }
    }

    /// On-disk algorithm id.
    pub fn id(self) -> u8 {
        match self {
            CompressionAlgorithm::None => 0,
            CompressionAlgorithm::Zlib => 1,
            CompressionAlgorithm::Lz4 => 2,
        }
    }
}

impl std::fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompressionAlgorithm::None => write!(f, "None"),
            CompressionAlgorithm::Zlib => write!(f, "Zlib"),
            CompressionAlgorithm::Lz4 => write!(f, "LZ4"),
        }
    }
}

/// Parsed compressed-page sub-header (bytes 26..34 of the FIL header).
///
/// `algorithm` is kept as the raw on-disk id so unknown values can be
/// reported precisely. Lifetime is a single decode call.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CompressionHeader {
    pub version: u8,
    pub algorithm: u8,
    pub original_type: u16,
    pub original_size: u16,
    pub compressed_size: u16,
}

impl CompressionHeader {
    /// Parse the sub-header from a page buffer of at least 38 bytes.
    pub fn parse(page: &[u8]) -> Option<Self> {
        if page.len() < SIZE_FIL_HEAD {
            return None;
        }
        Some(CompressionHeader {
            version: page[FIL_PAGE_VERSION],
            algorithm: page[FIL_PAGE_ALGORITHM_V1],
            original_type: BigEndian::read_u16(&page[FIL_PAGE_ORIGINAL_TYPE_V1..]),
            original_size: BigEndian::read_u16(&page[FIL_PAGE_ORIGINAL_SIZE_V1..]),
            compressed_size: BigEndian::read_u16(&page[FIL_PAGE_COMPRESS_SIZE_V1..]),
        })
    }
}

/// Decode a whole-page-compressed page in place.
///
/// No-op (and success) when `src` is not marked `FIL_PAGE_COMPRESSED`.
/// Otherwise the payload is decompressed, written back over the compressed
/// body at byte 38, and the original page type is restored.
///
/// `scratch`, when supplied, must hold at least `original_size + 38` bytes or
/// the call fails with [`DecodeError::Overflow`] (retryable with a larger
/// buffer). Without a scratch buffer a temporary one of `original_size * 3/2`
/// bytes is allocated for the duration of the call; allocation failure yields
/// [`DecodeError::OutOfMemory`].
///
/// `double_write_recovery` marks the source bytes as possibly inconsistent
/// (torn-write recovery); the post-decode LSN sanity assertion is skipped in
/// that mode. Decompression itself is always bounds-checked here — the
/// decoders never write past `original_size` regardless of input.
pub fn decode(
    src: &mut [u8],
    scratch: Option<&mut [u8]>,
    double_write_recovery: bool,
) -> Result<(), DecodeError> {
    if src.len() < SIZE_FIL_HEAD {
        return Err(DecodeError::Corruption("page shorter than the FIL header"));
    }
    if BigEndian::read_u16(&src[FIL_PAGE_TYPE..]) != FIL_PAGE_COMPRESSED {
        return Ok(());
    }

    // Header is attacker/corruption-exposed; validate everything.
    let header = CompressionHeader::parse(src)
        .ok_or(DecodeError::Corruption("page shorter than the FIL header"))?;
    if header.version != FIL_PAGE_VERSION_1 && header.version != FIL_PAGE_VERSION_2 {
        return Err(DecodeError::Corruption("unsupported sub-header version"));
    }
    let original_size = header.original_size as usize;
    if !(MIN_PAGE_PAYLOAD..=MAX_PAGE_PAYLOAD).contains(&original_size) {
        return Err(DecodeError::Corruption("original size out of bounds"));
    }
    if original_size + FIL_PAGE_DATA > src.len() {
        return Err(DecodeError::Corruption("original size exceeds the page"));
    }
    let compressed_size = header.compressed_size as usize;
    if compressed_size == 0 || FIL_PAGE_DATA + compressed_size > src.len() {
        return Err(DecodeError::Corruption("compressed size exceeds the page"));
    }

    let mut owned: Vec<u8>;
    let out: &mut [u8] = match scratch {
        Some(buf) => {
            let required = original_size + FIL_PAGE_DATA;
            if buf.len() < required {
                return Err(DecodeError::Overflow { required });
            }
            &mut buf[..original_size]
        }
        None => {
            // 50% headroom: some decoders write speculatively before the
            // final length is known.
            let capacity = original_size + original_size / 2;
            owned = Vec::new();
            owned
                .try_reserve_exact(capacity)
                .map_err(|_| DecodeError::OutOfMemory(capacity))?;
            owned.resize(capacity, 0);
            &mut owned[..original_size]
        }
    };

    let payload = &src[FIL_PAGE_DATA..FIL_PAGE_DATA + compressed_size];
    match CompressionAlgorithm::from_id(header.algorithm) {
        Some(CompressionAlgorithm::Zlib) => inflate_exact(payload, out)?,
        Some(CompressionAlgorithm::Lz4) => {
            let n = lz4_flex::block::decompress_into(payload, out)
                .map_err(|_| DecodeError::DecompressFailed)?;
            if n != out.len() {
                return Err(DecodeError::DecompressFailed);
            }
        }
        Some(CompressionAlgorithm::None) | None => {
            return Err(DecodeError::Unsupported(header.algorithm));
        }
    }

    src[FIL_PAGE_DATA..FIL_PAGE_DATA + original_size].copy_from_slice(out);
    BigEndian::write_u16(&mut src[FIL_PAGE_TYPE..], header.original_type);

    if !double_write_recovery {
        // A freshly decoded page of real content must carry an LSN.
        debug_assert_ne!(BigEndian::read_u64(&src[FIL_PAGE_LSN..]), 0);
    }

    Ok(())
}

/// One-shot zlib inflate that must fill `out` exactly.
///
/// Output is bounded by `out`; producing more than `out.len()` bytes (the
/// declared original size) or any codec error fails the decode.
fn inflate_exact(input: &[u8], out: &mut [u8]) -> Result<(), DecodeError> {
    let mut inflater = Decompress::new(true);
    match inflater.decompress(input, out, FlushDecompress::Finish) {
        Ok(Status::StreamEnd) if inflater.total_out() == out.len() as u64 => Ok(()),
        _ => Err(DecodeError::DecompressFailed),
    }
}

/// Build the whole-page-compressed representation of an ordinary page.
///
/// Returns a buffer of the same physical size: FIL header copied, type set to
/// `FIL_PAGE_COMPRESSED`, sub-header filled in, compressed payload at byte
/// 38, zero padding after it. When the payload does not shrink (or the
/// algorithm is `None`), the page is returned unchanged — such pages are
/// stored uncompressed and [`decode`] passes them through.
pub fn encode(page: &[u8], algorithm: CompressionAlgorithm) -> Vec<u8> {
    debug_assert!(page.len() >= UNIV_PAGE_SIZE_MIN as usize);

    let body = &page[FIL_PAGE_DATA..];
    let compressed = match algorithm {
        CompressionAlgorithm::None => return page.to_vec(),
        CompressionAlgorithm::Zlib => {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            // Writing to a Vec cannot fail
            encoder.write_all(body).expect("write to Vec");
            encoder.finish().expect("finish to Vec")
        }
        CompressionAlgorithm::Lz4 => lz4_flex::compress(body),
    };

    if FIL_PAGE_DATA + compressed.len() >= page.len() {
        return page.to_vec();
    }

    let mut out = vec![0u8; page.len()];
    out[..SIZE_FIL_HEAD].copy_from_slice(&page[..SIZE_FIL_HEAD]);
    let original_type = BigEndian::read_u16(&page[FIL_PAGE_TYPE..]);
    BigEndian::write_u16(&mut out[FIL_PAGE_TYPE..], FIL_PAGE_COMPRESSED);
    out[FIL_PAGE_VERSION] = FIL_PAGE_VERSION_1;
    out[FIL_PAGE_ALGORITHM_V1] = algorithm.id();
    BigEndian::write_u16(&mut out[FIL_PAGE_ORIGINAL_TYPE_V1..], original_type);
    BigEndian::write_u16(&mut out[FIL_PAGE_ORIGINAL_SIZE_V1..], body.len() as u16);
    BigEndian::write_u16(&mut out[FIL_PAGE_COMPRESS_SIZE_V1..], compressed.len() as u16);
    out[FIL_PAGE_DATA..FIL_PAGE_DATA + compressed.len()].copy_from_slice(&compressed);
    out
}
