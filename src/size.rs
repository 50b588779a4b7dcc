//! Physical and logical page size description.
//!
//! A tablespace stores its page geometry in the FSP flags on page 0. For an
//! uncompressed tablespace the physical (on-disk) and logical (in-memory)
//! sizes are equal; for a ROW_FORMAT=COMPRESSED tablespace the physical size
//! is the smaller zip block size and the logical size is the uncompressed
//! page size.

use serde::Serialize;

use crate::constants::*;

/// Page size descriptor: physical/logical byte sizes plus the compressed flag.
///
/// Constructed once per tablespace and copied by value afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageSize {
    physical: u32,
    logical: u32,
    compressed: bool,
}

impl PageSize {
    /// Create a descriptor from explicit sizes.
    ///
    /// Both sizes must be powers of two; `logical` must be within the
    /// supported range and never smaller than `physical`. The sizes differ
    /// only for compressed tablespaces.
    pub fn new(physical: u32, logical: u32, compressed: bool) -> Self {
        debug_assert!(physical.is_power_of_two() && logical.is_power_of_two());
        debug_assert!((UNIV_PAGE_SIZE_MIN..=UNIV_PAGE_SIZE_MAX).contains(&logical));
        debug_assert!(physical >= UNIV_ZIP_SIZE_MIN && physical <= logical);
        debug_assert!(compressed || physical == logical);
        PageSize {
            physical,
            logical,
            compressed,
        }
    }

    /// Derive the descriptor from the FSP space flags on page 0.
    ///
    /// Logical ssize lives in bits 6..=9 (`0` means the original 16K size,
    /// otherwise `1 << (ssize + 9)`). Zip ssize lives in bits 1..=4 (`0`
    /// means uncompressed, otherwise the physical size is `512 << ssize`).
    pub fn from_fsp_flags(flags: u32) -> Self {
        let ssize = (flags & FSP_FLAGS_MASK_PAGE_SSIZE) >> FSP_FLAGS_POS_PAGE_SSIZE;
        let logical = if ssize == 0 {
            UNIV_PAGE_SIZE_DEFAULT
        } else {
            1u32 << (ssize + 9)
        };

        let zip_ssize = (flags & FSP_FLAGS_MASK_ZIP_SSIZE) >> FSP_FLAGS_POS_ZIP_SSIZE;
        if zip_ssize == 0 {
            PageSize::new(logical, logical, false)
        } else {
            PageSize::new(512u32 << zip_ssize, logical, true)
        }
    }

    /// Bytes the page occupies on disk.
    pub fn physical(&self) -> u32 {
        self.physical
    }

    /// Bytes the page occupies once fully decompressed in memory.
    pub fn logical(&self) -> u32 {
        self.logical
    }

    /// True for ROW_FORMAT=COMPRESSED tablespaces.
    pub fn is_compressed(&self) -> bool {
        self.compressed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_flags() {
        let size = PageSize::from_fsp_flags(0);
        assert_eq!(size.physical(), 16384);
        assert_eq!(size.logical(), 16384);
        assert!(!size.is_compressed());
    }

    #[test]
    fn test_page_ssize_values() {
        // ssize=3 => 4K, ssize=4 => 8K, ssize=6 => 32K, ssize=7 => 64K
        for (ssize, expected) in [(3u32, 4096u32), (4, 8192), (6, 32768), (7, 65536)] {
            let size = PageSize::from_fsp_flags(ssize << FSP_FLAGS_POS_PAGE_SSIZE);
            assert_eq!(size.physical(), expected);
            assert_eq!(size.logical(), expected);
        }
    }

    #[test]
    fn test_zip_ssize() {
        // zip ssize=3 => 4K physical, default 16K logical
        let size = PageSize::from_fsp_flags(3 << FSP_FLAGS_POS_ZIP_SSIZE);
        assert_eq!(size.physical(), 4096);
        assert_eq!(size.logical(), 16384);
        assert!(size.is_compressed());
    }

    #[test]
    fn test_zip_with_explicit_logical() {
        // 8K zip blocks in a 32K-logical tablespace
        let flags = (4 << FSP_FLAGS_POS_ZIP_SSIZE) | (6 << FSP_FLAGS_POS_PAGE_SSIZE);
        let size = PageSize::from_fsp_flags(flags);
        assert_eq!(size.physical(), 8192);
        assert_eq!(size.logical(), 32768);
        assert!(size.is_compressed());
    }
}
