//! The block request loop
//!
//! Wire format from <linux/nbd.h>: fixed-size requests and replies
//! with big-endian fields. Reads are answered from the volume, writes
//! are drained and refused, everything else is not supported.

use std::io::{self, Read, Write};
use std::os::unix::net::UnixStream;

use log::{debug, info, warn};
use vfat::Volume;

const REQUEST_MAGIC: u32 = 0x2560_9513;
const REPLY_MAGIC: u32 = 0x6744_6698;
const REQUEST_SIZE: usize = 28;

const CMD_READ: u32 = 0;
const CMD_WRITE: u32 = 1;
const CMD_DISC: u32 = 2;

struct Request {
    magic: u32,
    cmd: u32,
    handle: [u8; 8],
    from: u64,
    len: u32,
}

impl Request {
    fn parse(buf: &[u8; REQUEST_SIZE]) -> Self {
        let mut handle = [0u8; 8];
        handle.copy_from_slice(&buf[8..16]);
        Self {
            magic: u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]),
            cmd: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
            handle,
            from: u64::from_be_bytes([
                buf[16], buf[17], buf[18], buf[19], buf[20], buf[21], buf[22], buf[23],
            ]),
            len: u32::from_be_bytes([buf[24], buf[25], buf[26], buf[27]]),
        }
    }
}

fn encode_reply(handle: [u8; 8], error: i32) -> [u8; 16] {
    let mut reply = [0u8; 16];
    reply[0..4].copy_from_slice(&REPLY_MAGIC.to_be_bytes());
    reply[4..8].copy_from_slice(&(error as u32).to_be_bytes());
    reply[8..16].copy_from_slice(&handle);
    reply
}

fn send_reply(sock: &mut UnixStream, handle: [u8; 8], error: i32) -> io::Result<()> {
    sock.write_all(&encode_reply(handle, error))
}

/// Serve requests from the kernel until it disconnects
pub fn serve(mut sock: UnixStream, volume: &Volume) -> io::Result<()> {
    loop {
        let mut raw = [0u8; REQUEST_SIZE];
        sock.read_exact(&mut raw)?;
        let req = Request::parse(&raw);
        if req.magic != REQUEST_MAGIC {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("bad request magic 0x{:x}", req.magic),
            ));
        }

        match req.cmd {
            CMD_READ => {
                debug!("READ {} bytes starting 0x{:x}", req.len, req.from);
                let mut buf = vec![0u8; req.len as usize];
                let error = match volume.fill(&mut buf, req.from) {
                    Ok(()) => 0,
                    Err(err) => err.errno(),
                };
                send_reply(&mut sock, req.handle, error)?;
                if error == 0 {
                    sock.write_all(&buf)?;
                }
            }
            CMD_WRITE => {
                debug!("WRITE {} bytes starting 0x{:x}", req.len, req.from);
                // Drain the payload, then refuse it: the volume is
                // read-only
                let mut buf = vec![0u8; req.len as usize];
                sock.read_exact(&mut buf)?;
                send_reply(&mut sock, req.handle, libc::EROFS)?;
            }
            CMD_DISC => {
                info!("disconnect requested");
                return Ok(());
            }
            other => {
                warn!("unsupported command {}", other);
                send_reply(&mut sock, req.handle, libc::EINVAL)?;
            }
        }
    }
}
