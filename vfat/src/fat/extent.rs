//! Extent representation of allocation table runs

use crate::types::{FAT_END_OF_CHAIN, FAT_MEDIA_MARKER};

/// A contiguous section of the FAT where the values either are all the
/// same literal (free, bad cluster, etc) or are ascending numbers with
/// each entry pointing at its neighbour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    /// First cluster covered by this run
    pub start: u32,

    /// Last cluster covered by this run (inclusive)
    pub end: u32,

    /// First cluster of the next extent in this chain, or end-of-chain,
    /// or the literal value if `prev == 0`
    pub next: u32,

    /// Last cluster of the previous extent in this chain, or
    /// end-of-chain, or 0 if this is a literal extent
    pub prev: u32,
}

impl Extent {
    /// Run of identical literal entries
    pub const fn literal(start: u32, end: u32, value: u32) -> Self {
        Self { start, end, next: value, prev: 0 }
    }

    /// Fresh chain segment, not yet linked to any neighbour
    pub const fn chain(start: u32, end: u32) -> Self {
        Self { start, end, next: FAT_END_OF_CHAIN, prev: FAT_END_OF_CHAIN }
    }

    /// Literal extents hold a value instead of chain links
    pub const fn is_literal(&self) -> bool {
        self.prev == 0
    }
}

/// Entry 0 contains the media descriptor in its low byte, matching the
/// media field of the boot sector.
pub const ENTRY_0: Extent = Extent::literal(0, 0, FAT_MEDIA_MARKER);

/// Entry 1 contains a permanent end-of-chain marker
pub const ENTRY_1: Extent = Extent::literal(1, 1, FAT_END_OF_CHAIN);
