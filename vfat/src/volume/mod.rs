//! Volume assembly and serving
//!
//! Glues the subsystems together: sizes the image, installs the
//! reserved sectors, scans the host tree into the directory encoder
//! and file mappings, finalizes the allocation table, and serves block
//! requests against the finished image index.

pub mod bootsector;
pub mod geometry;
mod scan;

pub use geometry::Geometry;

use std::path::Path;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use log::info;

use crate::directory::DirTable;
use crate::error::{Error, Result};
use crate::fat::Fat;
use crate::image::Image;
use crate::types::{CLUSTER_SIZE, SECTOR_SIZE};

/// A read-only FAT32 rendition of one host directory tree
pub struct Volume {
    geometry: Geometry,
    fat: Rc<Fat>,
    image: Image,
}

impl Volume {
    /// Scan `top_dir` and build the volume for it. `free_bytes` caps
    /// the free space reported to the guest, so that it never exceeds
    /// what the host filesystem can actually back.
    pub fn build(
        top_dir: &Path,
        free_bytes: u64,
        label: Option<&str>,
        geometry: Geometry,
    ) -> Result<Self> {
        let mut image = Image::new();

        let volume_id = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);
        image.install(&bootsector::boot_sector(&geometry, volume_id, label), 0);
        image.install(&bootsector::fsinfo_sector(), SECTOR_SIZE as u64);

        let fat = Rc::new(Fat::new(geometry.data_clusters));
        let mut dirs = DirTable::new(&fat, &mut image);
        scan::scan(&fat, &mut image, &mut dirs, top_dir)?;

        let max_free = (free_bytes / CLUSTER_SIZE as u64).min(u32::MAX as u64) as u32;
        fat.finalize(max_free, &mut image);
        info!(
            "volume ready: {} sectors, {} data clusters",
            geometry.total_sectors, geometry.data_clusters
        );

        Ok(Self { geometry, fat, image })
    }

    /// The image geometry this volume was built for
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Image byte position of a data cluster
    pub fn cluster_pos(&self, cluster: u32) -> u64 {
        self.fat.cluster_pos(cluster)
    }

    /// Serve a block read. On failure the buffer is zeroed past the
    /// point of the error.
    pub fn fill(&self, buf: &mut [u8], offset: u64) -> Result<()> {
        if offset
            .checked_add(buf.len() as u64)
            .map_or(true, |end| end > self.geometry.image_size())
        {
            buf.fill(0);
            return Err(Error::InvalidArgument);
        }
        self.image.fill(buf, offset)
    }

    /// Accept a block write for diagnostic reconstruction. The serving
    /// layer refuses writes before they get here; this path exists for
    /// a future writable profile and for tests.
    pub fn receive(&mut self, buf: &[u8], offset: u64) -> Result<()> {
        if offset
            .checked_add(buf.len() as u64)
            .map_or(true, |end| end > self.geometry.image_size())
        {
            return Err(Error::InvalidArgument);
        }
        self.image.receive(buf, offset)
    }

    /// Chain structure check, for use after a diagnostic write-back
    pub fn is_consistent(&self) -> bool {
        self.fat.is_consistent()
    }
}
