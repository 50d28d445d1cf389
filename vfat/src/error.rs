//! Error types for volume operations

use core::fmt;

/// Result type for volume operations
pub type Result<T> = core::result::Result<T, Error>;

/// Errors that can occur while building or serving the volume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Request outside the image, or a misaligned FAT access
    InvalidArgument,

    /// Write to a read-only part of the volume
    ReadOnlyMedium,

    /// Host file I/O failure, carrying the OS errno
    Io(i32),

    /// The FAT has no room left to grow a chain
    SpaceExhausted,

    /// A guest write that would corrupt the FAT
    InconsistentWrite,
}

impl Error {
    /// The errno reported to the block-device client for this error
    pub fn errno(&self) -> i32 {
        match self {
            Self::InvalidArgument => libc::EINVAL,
            Self::ReadOnlyMedium => libc::EROFS,
            Self::Io(errno) => *errno,
            Self::SpaceExhausted => libc::ENOSPC,
            Self::InconsistentWrite => libc::EIO,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument => write!(f, "invalid request"),
            Self::ReadOnlyMedium => write!(f, "read-only filesystem"),
            Self::Io(errno) => write!(f, "I/O error (errno {})", errno),
            Self::SpaceExhausted => write!(f, "no space left in the allocation table"),
            Self::InconsistentWrite => write!(f, "write would corrupt the allocation table"),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.raw_os_error().unwrap_or(libc::EIO))
    }
}
