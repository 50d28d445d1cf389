//! Layout constants and shared types
//!
//! The image always uses 512-byte sectors and 4096-byte clusters.
//! Despite its name, FAT32 only uses 28 bits per table entry; the
//! special values below are defined by the FAT specification.

use bitflags::bitflags;

/// Bytes per sector
pub const SECTOR_SIZE: u32 = 512;

/// Bytes per data cluster
pub const CLUSTER_SIZE: u32 = 4096;

/// Sectors per data cluster
pub const SECTORS_PER_CLUSTER: u32 = CLUSTER_SIZE / SECTOR_SIZE;

/// Sectors before the FAT: boot sector, FSINFO sector, zero padding
pub const RESERVED_SECTORS: u32 = 32;

/// FAT entries 0 and 1 are dummies and do not map to data clusters
pub const RESERVED_FAT_ENTRIES: u32 = 2;

/// The root directory always lives in the first data cluster
pub const ROOT_DIR_CLUSTER: u32 = 2;

/// End-of-chain marker
pub const FAT_END_OF_CHAIN: u32 = 0x0fff_ffff;

/// Bad-cluster marker
pub const FAT_BAD_CLUSTER: u32 = 0x0fff_fff7;

/// Entry 0 carries the media descriptor in its low byte
pub const FAT_MEDIA_MARKER: u32 = 0x0fff_fff8;

/// Unallocated cluster
pub const FAT_UNALLOCATED: u32 = 0;

/// A filesystem with fewer clusters must be FAT12 or FAT16
pub const MIN_FAT32_CLUSTERS: u32 = 65525;

/// Entries 0x0ffffff0 and up are reserved, as are 0 and 1
pub const MAX_FAT32_CLUSTERS: u32 = 0x0fff_fff0 - RESERVED_FAT_ENTRIES;

/// Attribute byte value marking a long-filename record
pub const ATTR_LFN: u8 = 0x0f;

bitflags! {
    /// Attribute flags of a directory entry
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Attributes: u8 {
        /// File may not be written
        const READ_ONLY = 0x01;
        /// Hidden from normal directory listings
        const HIDDEN = 0x02;
        /// Operating system file
        const SYSTEM = 0x04;
        /// Volume label pseudo-entry
        const LABEL = 0x08;
        /// Entry describes a directory
        const DIRECTORY = 0x10;
        /// Modified since last archival
        const ARCHIVE = 0x20;
    }
}

/// Filenames are UTF-16LE code units, including the 0x0000 terminator
pub type Filename = Vec<u16>;
