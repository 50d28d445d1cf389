//! FAT32 directory construction
//!
//! Directories are allocated from the beginning of the data area. Each
//! one is a cluster chain whose bytes are the concatenation of 32-byte
//! records, zero padded to a cluster multiple; the chain grows through
//! the allocation table one cluster at a time as records are added.

pub mod entry;
pub mod service;

use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;

use log::debug;

use crate::error::{Error, Result};
use crate::fat::Fat;
use crate::image::{DataService, Image};
use crate::types::{Attributes, CLUSTER_SIZE, ROOT_DIR_CLUSTER};
use crate::utils::align_up;
use entry::{CHARS_PER_LFN_ENTRY, DIR_ENTRY_SIZE};
use service::DirService;

/// Longest representable filename in UTF-16 code units: the spec limit
/// of 255 characters plus the terminator
const MAX_FILENAME_UNITS: usize = 256;

/// Builder for all directories of a volume.
///
/// Creating the table allocates the root directory, which by
/// convention occupies the first data cluster.
pub struct DirTable {
    /// Directory services by starting cluster
    dirs: BTreeMap<u32, Rc<DirService>>,
    /// Feeds the invalid-but-unique short name tokens
    uniq_counter: u32,
}

impl DirTable {
    /// Create the table and the empty root directory
    pub fn new(fat: &Fat, image: &mut Image) -> Self {
        let mut table = Self { dirs: BTreeMap::new(), uniq_counter: 1 };
        table.alloc_new(fat, image, Path::new("."));
        table
    }

    /// Register a new directory for `path` and return its starting
    /// cluster. The first cluster is allocated immediately and bound to
    /// a fresh service.
    pub fn alloc_new(&mut self, fat: &Fat, image: &mut Image, path: &Path) -> u32 {
        let start = fat.alloc_beginning(1);
        let service = Rc::new(DirService::new(path.to_path_buf(), start));
        self.dirs.insert(start, Rc::clone(&service));
        image.register(service, fat.cluster_pos(start), CLUSTER_SIZE as u64, 0);
        debug!("directory {:?} starts at cluster {}", path, start);
        start
    }

    /// Extend the directory at `parent_cluster` with an entry for
    /// `entry_cluster`, growing the directory's chain if the records
    /// no longer fit in its allocated clusters.
    #[allow(clippy::too_many_arguments)]
    pub fn add_entry(
        &mut self,
        fat: &Fat,
        image: &mut Image,
        parent_cluster: u32,
        entry_cluster: u32,
        name: &[u16],
        size: u32,
        attrs: Attributes,
        mtime: i64,
        atime: i64,
    ) -> Result<()> {
        // The root directory lives in cluster 2 but directory entries
        // refer to it as cluster 0; correct for it here so that
        // callers don't have to.
        let parent_cluster = if parent_cluster == 0 { ROOT_DIR_CLUSTER } else { parent_cluster };
        let parent = Rc::clone(self.dirs.get(&parent_cluster).ok_or(Error::InvalidArgument)?);

        if name.len() > MAX_FILENAME_UNITS {
            return Err(Error::InvalidArgument);
        }
        // One record for the short name plus the long-filename records
        let num_entries = 1 + name.len().div_ceil(CHARS_PER_LFN_ENTRY);

        let needed = align_up(
            (parent.len() + num_entries * DIR_ENTRY_SIZE) as u64,
            CLUSTER_SIZE as u64,
        ) / CLUSTER_SIZE as u64;
        if needed > parent.allocated() as u64 {
            let grown = fat
                .extend_chain(parent.last_cluster())
                .ok_or(Error::SpaceExhausted)?;
            // The new cluster continues the directory's stream where
            // the allocated space left off, wherever it landed
            let stream_offset = parent.allocated() as u64 * CLUSTER_SIZE as u64;
            image.register(
                Rc::clone(&parent) as Rc<dyn DataService>,
                fat.cluster_pos(grown),
                CLUSTER_SIZE as u64,
                stream_offset,
            );
            parent.set_last_cluster(grown);
            parent.set_allocated(parent.allocated() + 1);
        }

        let mut short_name = [0u8; 11];
        entry::prep_short_name(&mut short_name, self.uniq_counter);
        self.uniq_counter += 1;

        let checksum = entry::shortname_checksum(&short_name);
        let short_record =
            entry::encode_short_entry(&short_name, entry_cluster, size, attrs, mtime, atime);

        // The name parts are stored last-to-first, with decreasing
        // sequence numbers, so sequence 1 ends up right before the
        // short record
        let lfn_records = num_entries - 1;
        for seq_nr in (1..=lfn_records).rev() {
            parent.append(&entry::encode_lfn_entry(
                seq_nr,
                seq_nr == lfn_records,
                name,
                checksum,
            ));
        }
        parent.append(&short_record);
        Ok(())
    }
}
