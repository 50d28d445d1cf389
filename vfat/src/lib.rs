//! Virtual FAT32 volume synthesis
//!
//! Presents a snapshot of a host directory tree as a read-only FAT32
//! block image without ever materializing the image. Only the metadata
//! (allocation table and directories) is held in memory; file contents
//! are fetched from the host files when the corresponding blocks are
//! read.
//!
//! # Architecture
//!
//! The implementation is layered:
//! 1. **FAT layer** - cluster chain allocation, stored as extents
//! 2. **Image layer** - maps byte ranges of the image to data producers
//! 3. **Directory layer** - encodes directory entries and long filenames
//! 4. **File mappings** - bind cluster ranges to host files
//! 5. **Volume layer** - geometry, boot sector, host tree scan
//!
//! # Usage
//!
//! ```ignore
//! use vfat::{Geometry, Volume};
//!
//! let geometry = Geometry::adjust(device_blocks, 512).unwrap();
//! let volume = Volume::build(path, free_space, None, geometry)?;
//!
//! // Serve block reads
//! volume.fill(&mut buf, request_offset)?;
//! ```
//!
//! The image is laid out with all directories at the low end of the
//! data area and all file contents at the high end; the space between
//! them is reported free up to a caller-supplied cap and marked
//! unusable beyond it, so the guest never sees more free space than
//! the host filesystem can actually back.

#![warn(missing_docs)]

pub mod error;
pub mod types;
pub mod utils;
pub mod image;
pub mod fat;
pub mod directory;
pub mod filemap;
pub mod volume;

pub use error::{Error, Result};
pub use fat::Fat;
pub use image::{DataService, Image};
pub use directory::DirTable;
pub use volume::{Geometry, Volume};
