//! Host file mappings
//!
//! Maps contiguous cluster chains at the end of the data area onto
//! host files. The contents are never cached: a service holds only the
//! file's path, and every fill opens, reads and closes it, so serving
//! many files does not pin many descriptors.

use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use log::debug;

use crate::error::{Error, Result};
use crate::fat::Fat;
use crate::image::{DataService, Image};
use crate::types::CLUSTER_SIZE;

/// Lazily reads one host file
pub struct FileService {
    path: PathBuf,
}

/// Allocate clusters for a host file of `size` bytes, bind them to its
/// path and return the starting cluster.
pub fn add(fat: &Fat, image: &mut Image, path: &Path, size: u32) -> u32 {
    let clusters = size.div_ceil(CLUSTER_SIZE);
    let start = fat.alloc_end(clusters);
    let service = Rc::new(FileService { path: path.to_path_buf() });
    // Register the exact byte size, not the cluster-aligned size: the
    // slack between the end of the file and the end of its last
    // cluster reads as zero straight from the image index.
    image.register(service, fat.cluster_pos(start), size as u64, 0);
    debug!("file {:?}: {} bytes at cluster {}", path, size, start);
    start
}

impl DataService for FileService {
    fn fill(&self, buf: &mut [u8], offset: u64) -> Result<()> {
        let mut file = File::open(&self.path)?;
        if offset > 0 {
            file.seek(SeekFrom::Start(offset))?;
        }
        let mut nread = 0;
        while nread < buf.len() {
            match file.read(&mut buf[nread..]) {
                // The file may have been truncated since registration;
                // the missing part reads as zero
                Ok(0) => break,
                Ok(n) => nread += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
        buf[nread..].fill(0);
        Ok(())
    }

    fn receive(&self, _buf: &[u8], _offset: u64) -> Result<()> {
        Err(Error::ReadOnlyMedium)
    }
}
