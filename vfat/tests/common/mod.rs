//! Shared helpers for the integration tests

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use vfat::error::{Error, Result};
use vfat::image::DataService;

/// Parameters recorded from one service call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Call {
    /// Address of the segment the service was handed, for checking
    /// where in the caller's buffer it landed
    pub ptr: usize,
    pub length: usize,
    pub offset: u64,
}

/// Service double that records every call and fills with zeroes
#[derive(Default)]
pub struct RecordingService {
    pub fill_calls: RefCell<Vec<Call>>,
    pub receive_calls: RefCell<Vec<Call>>,
    pub fill_error: Cell<Option<Error>>,
    pub receive_error: Cell<Option<Error>>,
    drop_flag: RefCell<Option<Rc<Cell<bool>>>>,
}

impl RecordingService {
    /// Get a flag that turns true when the service is destroyed
    pub fn track_drop(&self) -> Rc<Cell<bool>> {
        let flag = Rc::new(Cell::new(false));
        *self.drop_flag.borrow_mut() = Some(Rc::clone(&flag));
        flag
    }

    pub fn take_fill_call(&self) -> Call {
        self.fill_calls.borrow_mut().remove(0)
    }

    pub fn take_receive_call(&self) -> Call {
        self.receive_calls.borrow_mut().remove(0)
    }
}

impl DataService for RecordingService {
    fn fill(&self, buf: &mut [u8], offset: u64) -> Result<()> {
        self.fill_calls.borrow_mut().push(Call {
            ptr: buf.as_ptr() as usize,
            length: buf.len(),
            offset,
        });
        if let Some(err) = self.fill_error.get() {
            return Err(err);
        }
        buf.fill(0);
        Ok(())
    }

    fn receive(&self, buf: &[u8], offset: u64) -> Result<()> {
        self.receive_calls.borrow_mut().push(Call {
            ptr: buf.as_ptr() as usize,
            length: buf.len(),
            offset,
        });
        if let Some(err) = self.receive_error.get() {
            return Err(err);
        }
        Ok(())
    }
}

impl Drop for RecordingService {
    fn drop(&mut self) {
        if let Some(flag) = self.drop_flag.borrow().as_ref() {
            flag.set(true);
        }
    }
}

/// Assert that every byte of `buf` equals `value`
pub fn assert_filled(buf: &[u8], value: u8) {
    if let Some(pos) = buf.iter().position(|&b| b != value) {
        panic!("byte at {} is 0x{:02x}, expected 0x{:02x}", pos, buf[pos], value);
    }
}

/// Decode a buffer of little-endian FAT entries
pub fn fat_entries(buf: &[u8]) -> Vec<u32> {
    buf.chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Scratch directory tree, removed again on drop
pub struct TempTree {
    pub path: PathBuf,
}

impl TempTree {
    pub fn new(tag: &str) -> Self {
        let path = std::env::temp_dir().join(format!("vfat-test-{}-{}", tag, std::process::id()));
        let _ = fs::remove_dir_all(&path);
        fs::create_dir_all(&path).unwrap();
        Self { path }
    }

    pub fn file(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.path.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    pub fn dir(&self, name: &str) -> PathBuf {
        let path = self.path.join(name);
        fs::create_dir_all(&path).unwrap();
        path
    }
}

impl Drop for TempTree {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

/// Pattern bytes for recognizable file contents
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Path helper for tests that need a missing file
pub fn missing_path() -> PathBuf {
    Path::new("/nonexistent").join("vfat-test-missing")
}
