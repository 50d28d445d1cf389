//! Read-only FAT32 network block device server
//!
//! Reads a directory tree and presents it as a network block device
//! holding a FAT32 image, sized to match the host filesystem. The
//! device can then be mounted or exported (for example via the USB
//! mass storage function) without interfering with normal use of the
//! directory.

mod config;
mod device;
mod logger;
mod notify;
mod server;

use std::env;
use std::ffi::CString;
use std::io;
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::process;

use log::{error, info};
use vfat::types::{RESERVED_SECTORS, SECTOR_SIZE};
use vfat::{Geometry, Volume};

fn main() {
    let options = match config::Options::parse(env::args().skip(1)) {
        Ok(options) => options,
        Err(err) => {
            eprintln!("{}: {}", config::PROGRAM, err);
            config::print_usage();
            process::exit(2);
        }
    };

    if options.help {
        config::print_usage();
        return;
    }
    if options.version {
        println!("{} {}", config::PROGRAM, env!("CARGO_PKG_VERSION"));
        return;
    }

    logger::init(options.verbose);

    let Some(target_dir) = options.target_dir.clone() else {
        config::print_usage();
        process::exit(2);
    };

    if let Err(err) = run(&options, &target_dir) {
        error!("{}", err);
        process::exit(1);
    }
}

fn run(options: &config::Options, target_dir: &str) -> io::Result<()> {
    let device = device::NbdDevice::open(&options.device)?;
    let (fs_size, free_space) = host_space(target_dir)?;

    device.set_read_only(); // only read-only is supported, for now
    device.set_block_size(SECTOR_SIZE)?;

    let blocks = size_in_blocks(fs_size)?;
    let Some(geometry) = Geometry::adjust(blocks, SECTOR_SIZE) else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "image size not representable as FAT32",
        ));
    };
    info!(
        "image size {} sectors, {} reserved, {} FAT",
        geometry.total_sectors, RESERVED_SECTORS, geometry.fat_sectors
    );
    device.set_size_blocks(geometry.total_sectors)?;

    let (kernel_end, server_end) = UnixStream::pair()?;

    if options.daemonize {
        daemonize()?;
    }

    // Split into the server child, which scans the tree and answers
    // requests, and the parent, which parks in the kernel's request
    // pump until the device is disconnected.
    match unsafe { libc::fork() } {
        -1 => Err(io::Error::last_os_error()),
        0 => {
            drop(kernel_end);
            // The scan can take a while on big trees; tell the
            // launcher what is going on
            notify::notify(false, "scanning directory tree");
            let volume = Volume::build(
                Path::new(target_dir),
                free_space,
                options.label.as_deref(),
                geometry,
            )
            .map_err(|err| io::Error::from_raw_os_error(err.errno()))?;
            notify::notify(true, "ready");
            server::serve(server_end, &volume)
        }
        _ => {
            drop(server_end);
            device.set_socket(&kernel_end)?;
            device.serve_kernel()
        }
    }
}

/// Total size and free space of the filesystem holding `dir`, in bytes
fn host_space(dir: &str) -> io::Result<(u64, u64)> {
    let path = CString::new(dir).map_err(|_| io::Error::from_raw_os_error(libc::EINVAL))?;
    let mut st: libc::statvfs = unsafe { std::mem::zeroed() };
    if unsafe { libc::statvfs(path.as_ptr(), &mut st) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok((
        st.f_frsize as u64 * st.f_blocks as u64,
        st.f_frsize as u64 * st.f_bavail as u64,
    ))
}

fn size_in_blocks(size: u64) -> io::Result<u32> {
    u32::try_from(size.div_ceil(SECTOR_SIZE as u64)).map_err(|_| {
        io::Error::new(io::ErrorKind::InvalidInput, "directory filesystem too large")
    })
}

/// Fork out of the current context and continue as the child
fn daemonize() -> io::Result<()> {
    match unsafe { libc::fork() } {
        -1 => return Err(io::Error::last_os_error()),
        0 => {}
        _ => process::exit(0), // parent exits
    }

    unsafe {
        libc::umask(0);
        libc::setsid(); // start our own process group
        // Don't hold open anything inherited from the shell
        libc::chdir(c"/".as_ptr());
        let null = libc::open(c"/dev/null".as_ptr(), libc::O_RDWR);
        if null >= 0 {
            libc::dup2(null, 0);
            libc::dup2(null, 1);
            libc::dup2(null, 2);
            if null > 2 {
                libc::close(null);
            }
        }
    }
    Ok(())
}
