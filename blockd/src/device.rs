//! Kernel network-block-device attachment
//!
//! The kernel side of an nbd device is configured over ioctls: hand it
//! a socket, the block size and the device size, then park a thread in
//! NBD_DO_IT while the kernel turns block reads into requests on the
//! socket.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::io::AsRawFd;
use std::os::unix::net::UnixStream;

use log::warn;

// Request numbers from <linux/nbd.h>
const NBD_SET_SOCK: libc::c_ulong = 0xab00;
const NBD_SET_BLKSIZE: libc::c_ulong = 0xab01;
const NBD_DO_IT: libc::c_ulong = 0xab03;
const NBD_SET_SIZE_BLOCKS: libc::c_ulong = 0xab07;
// From <linux/fs.h>
const BLKROSET: libc::c_ulong = 0x125d;

/// An open nbd device node
pub struct NbdDevice {
    file: File,
}

impl NbdDevice {
    pub fn open(path: &str) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self { file })
    }

    fn ioctl(&self, request: libc::c_ulong, arg: libc::c_ulong) -> io::Result<()> {
        if unsafe { libc::ioctl(self.file.as_raw_fd(), request, arg) } < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Mark the device read-only towards the rest of the system. Only
    /// read-only serving is supported, but a failure here just means
    /// writes get refused at the protocol level instead.
    pub fn set_read_only(&self) {
        let read_only: libc::c_int = 1;
        let ret = unsafe {
            libc::ioctl(self.file.as_raw_fd(), BLKROSET, &read_only as *const libc::c_int)
        };
        if ret < 0 {
            warn!("could not set read-only mode");
        }
    }

    /// Set the device block size. There is no ioctl to query it back,
    /// so if this fails the size is unknown and serving cannot start.
    pub fn set_block_size(&self, size: u32) -> io::Result<()> {
        self.ioctl(NBD_SET_BLKSIZE, size as libc::c_ulong)
    }

    pub fn set_size_blocks(&self, blocks: u32) -> io::Result<()> {
        self.ioctl(NBD_SET_SIZE_BLOCKS, blocks as libc::c_ulong)
    }

    /// Associate the kernel side with one end of a socket pair
    pub fn set_socket(&self, socket: &UnixStream) -> io::Result<()> {
        self.ioctl(NBD_SET_SOCK, socket.as_raw_fd() as libc::c_ulong)
    }

    /// Run the kernel's request pump; returns when the device is
    /// disconnected.
    pub fn serve_kernel(&self) -> io::Result<()> {
        self.ioctl(NBD_DO_IT, 0)
    }
}
