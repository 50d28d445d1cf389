//! Host directory tree scan
//!
//! Walks the exported directory once at build time and materializes it
//! in the directory encoder and the file mappings. The walk is
//! physical: symbolic links and special files are not representable in
//! the image and are skipped, as are names that are not valid UTF-8
//! and files too large for FAT32. Changes to the host tree after the
//! scan are not reflected.

use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;

use log::warn;

use crate::directory::DirTable;
use crate::error::Result;
use crate::fat::Fat;
use crate::filemap;
use crate::image::Image;
use crate::types::{Attributes, Filename, ROOT_DIR_CLUSTER};
use crate::utils::string::utf16_name;

fn unix_time(time: std::io::Result<std::time::SystemTime>) -> i64 {
    time.ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Populate the volume from the tree rooted at `top_dir`. The root
/// directory itself must already exist in `dirs`.
pub fn scan(fat: &Fat, image: &mut Image, dirs: &mut DirTable, top_dir: &Path) -> Result<()> {
    let meta = fs::metadata(top_dir)?;
    let mut scanner = Scanner { fat, image, dirs };
    // In directory entries the root is referred to as cluster 0
    scanner.scan_dir(
        top_dir,
        ROOT_DIR_CLUSTER,
        0,
        unix_time(meta.modified()),
        unix_time(meta.accessed()),
    );
    Ok(())
}

struct Scanner<'a> {
    fat: &'a Fat,
    image: &'a mut Image,
    dirs: &'a mut DirTable,
}

impl Scanner<'_> {
    fn scan_dir(&mut self, path: &Path, cluster: u32, entry_cluster: u32, mtime: i64, atime: i64) {
        let entries = match fs::read_dir(path) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("skipping unreadable directory {:?}: {}", path, err);
                return;
            }
        };

        for item in entries.flatten() {
            let Ok(file_type) = item.file_type() else { continue };
            let Some(name) = item.file_name().to_str().map(utf16_name) else {
                // The name cannot be represented in UTF-16; for a
                // directory that skips its whole subtree
                warn!("skipping unrepresentable name {:?}", item.path());
                continue;
            };
            let Ok(meta) = item.metadata() else { continue };
            let child_mtime = unix_time(meta.modified());
            let child_atime = unix_time(meta.accessed());

            if file_type.is_dir() {
                let child_path = item.path();
                let child = self.dirs.alloc_new(self.fat, self.image, &child_path);
                // Link the new directory into the hierarchy
                self.add(child, child, &utf16_name("."), 0, Attributes::DIRECTORY, child_mtime, child_atime);
                self.add(child, entry_cluster, &utf16_name(".."), 0, Attributes::DIRECTORY, mtime, atime);
                self.add(cluster, child, &name, 0, Attributes::DIRECTORY, child_mtime, child_atime);
                self.scan_dir(&child_path, child, child, child_mtime, child_atime);
            } else if file_type.is_file() {
                let Ok(size) = u32::try_from(meta.len()) else {
                    warn!("skipping {:?}: too large for FAT32", item.path());
                    continue;
                };
                let start = if size > 0 {
                    filemap::add(self.fat, self.image, &item.path(), size)
                } else {
                    0
                };
                self.add(cluster, start, &name, size, Attributes::empty(), child_mtime, child_atime);
            }
            // Anything else (symlinks, sockets, devices) is skipped
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn add(
        &mut self,
        parent: u32,
        entry_cluster: u32,
        name: &Filename,
        size: u32,
        attrs: Attributes,
        mtime: i64,
        atime: i64,
    ) {
        if let Err(err) = self.dirs.add_entry(
            self.fat, self.image, parent, entry_cluster, name, size, attrs, mtime, atime,
        ) {
            // A full table only loses this entry; the scan carries on
            warn!("could not add directory entry: {}", err);
        }
    }
}
