//! Image geometry
//!
//! A FAT32 layout has to be solved for, because the FAT's own size
//! depends on how many clusters it describes: a first optimistic pass
//! sizes the data area ignoring the FAT, a second pass corrects for
//! the sectors the FAT needs.

use crate::types::{
    MAX_FAT32_CLUSTERS, MIN_FAT32_CLUSTERS, RESERVED_FAT_ENTRIES, RESERVED_SECTORS, SECTORS_PER_CLUSTER,
    SECTOR_SIZE,
};
use crate::utils::align_up;

/// Sector counts of a FAT32-compatible image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Clusters in the data area
    pub data_clusters: u32,
    /// Sectors occupied by the allocation table
    pub fat_sectors: u32,
    /// Total image size in sectors
    pub total_sectors: u32,
}

impl Geometry {
    /// Fit a FAT32 layout into a device of `sectors` blocks, clamping
    /// the cluster count to the range the format allows. Returns `None`
    /// for sector sizes the image does not support.
    pub fn adjust(sectors: u32, sector_size: u32) -> Option<Self> {
        if sector_size != SECTOR_SIZE {
            return None;
        }

        let mut data_clusters = sectors.saturating_sub(RESERVED_SECTORS) / SECTORS_PER_CLUSTER;
        let mut fat_sectors = Self::fat_sectors_for(data_clusters);

        data_clusters =
            sectors.saturating_sub(fat_sectors + RESERVED_SECTORS) / SECTORS_PER_CLUSTER;
        data_clusters = data_clusters.clamp(MIN_FAT32_CLUSTERS, MAX_FAT32_CLUSTERS);
        fat_sectors = Self::fat_sectors_for(data_clusters);

        Some(Self {
            data_clusters,
            fat_sectors,
            total_sectors: RESERVED_SECTORS + fat_sectors + data_clusters * SECTORS_PER_CLUSTER,
        })
    }

    fn fat_sectors_for(data_clusters: u32) -> u32 {
        let bytes = (data_clusters as u64 + RESERVED_FAT_ENTRIES as u64) * 4;
        (align_up(bytes, SECTOR_SIZE as u64) / SECTOR_SIZE as u64) as u32
    }

    /// Image size in bytes
    pub fn image_size(&self) -> u64 {
        self.total_sectors as u64 * SECTOR_SIZE as u64
    }
}
