//! Per-directory byte storage behind the service interface

use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::image::DataService;

/// The accumulated records of one directory.
///
/// The service's logical stream is the directory's full record
/// sequence. Directories don't have to be allocated contiguously; the
/// image index maps every cluster of the chain onto the right stream
/// offset, so a fragmented directory needs nothing special here.
pub struct DirService {
    /// Host path, for diagnostics
    path: PathBuf,
    data: RefCell<Vec<u8>>,
    last_cluster: Cell<u32>,
    /// Clusters currently allocated to the chain
    allocated: Cell<u32>,
}

impl DirService {
    pub(crate) fn new(path: PathBuf, start_cluster: u32) -> Self {
        Self {
            path,
            data: RefCell::new(Vec::new()),
            last_cluster: Cell::new(start_cluster),
            allocated: Cell::new(1),
        }
    }

    /// Host directory this service describes
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn len(&self) -> usize {
        self.data.borrow().len()
    }

    pub(crate) fn append(&self, record: &[u8]) {
        self.data.borrow_mut().extend_from_slice(record);
    }

    pub(crate) fn last_cluster(&self) -> u32 {
        self.last_cluster.get()
    }

    pub(crate) fn set_last_cluster(&self, cluster: u32) {
        self.last_cluster.set(cluster);
    }

    pub(crate) fn allocated(&self) -> u32 {
        self.allocated.get()
    }

    pub(crate) fn set_allocated(&self, clusters: u32) {
        self.allocated.set(clusters);
    }
}

impl DataService for DirService {
    fn fill(&self, buf: &mut [u8], offset: u64) -> Result<()> {
        let data = self.data.borrow();
        let offset = offset as usize;
        // Allocated space past the records reads as zero
        let n = data.len().saturating_sub(offset).min(buf.len());
        buf[..n].copy_from_slice(&data[offset..offset + n]);
        buf[n..].fill(0);
        Ok(())
    }

    fn receive(&self, _buf: &[u8], _offset: u64) -> Result<()> {
        Err(Error::ReadOnlyMedium)
    }
}
