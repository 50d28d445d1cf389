//! Host file mapping tests

mod common;

use std::rc::Rc;

use common::{pattern, TempTree};
use vfat::error::Error;
use vfat::fat::Fat;
use vfat::filemap;
use vfat::image::Image;
use vfat::types::CLUSTER_SIZE;

const DATA_CLUSTERS: u32 = 1_000_000;

fn setup() -> (Rc<Fat>, Image) {
    (Rc::new(Fat::new(DATA_CLUSTERS)), Image::new())
}

#[test]
fn file_contents_round_trip() {
    let tree = TempTree::new("filemap-roundtrip");
    let contents = pattern(8000);
    let path = tree.file("data.bin", &contents);

    let (fat, mut image) = setup();
    let start = filemap::add(&fat, &mut image, &path, contents.len() as u32);
    // Two clusters, allocated at the very end of the data area
    assert_eq!(start, DATA_CLUSTERS + 2 - 2);
    fat.finalize(DATA_CLUSTERS, &mut image);

    let mut buf = vec![1u8; 2 * CLUSTER_SIZE as usize];
    image.fill(&mut buf, fat.cluster_pos(start)).unwrap();
    assert_eq!(&buf[..8000], &contents[..]);
    // The slack after the file reads as zero
    common::assert_filled(&buf[8000..], 0);
}

#[test]
fn reads_at_offsets() {
    let tree = TempTree::new("filemap-offsets");
    let contents = pattern(CLUSTER_SIZE as usize + 100);
    let path = tree.file("data.bin", &contents);

    let (fat, mut image) = setup();
    let start = filemap::add(&fat, &mut image, &path, contents.len() as u32);
    fat.finalize(DATA_CLUSTERS, &mut image);

    // Read only the second cluster of the file
    let mut buf = vec![1u8; 512];
    image
        .fill(&mut buf, fat.cluster_pos(start + 1))
        .unwrap();
    assert_eq!(&buf[..100], &contents[CLUSTER_SIZE as usize..]);
    common::assert_filled(&buf[100..], 0);
}

// A file that shrank since registration serves zeroes for the lost tail
#[test]
fn truncated_file_zero_fills() {
    let tree = TempTree::new("filemap-truncated");
    let path = tree.file("data.bin", &pattern(5000));

    let (fat, mut image) = setup();
    let start = filemap::add(&fat, &mut image, &path, 5000);
    fat.finalize(DATA_CLUSTERS, &mut image);
    tree.file("data.bin", &pattern(100)); // shrink it

    let mut buf = vec![1u8; 5000];
    image.fill(&mut buf, fat.cluster_pos(start)).unwrap();
    assert_eq!(&buf[..100], &pattern(100)[..]);
    common::assert_filled(&buf[100..], 0);
}

// A vanished file surfaces the open failure as its errno
#[test]
fn missing_file_reports_errno() {
    let (fat, mut image) = setup();
    let start = filemap::add(&fat, &mut image, &common::missing_path(), 1000);
    fat.finalize(DATA_CLUSTERS, &mut image);

    let mut buf = vec![1u8; 1000];
    assert_eq!(
        image.fill(&mut buf, fat.cluster_pos(start)),
        Err(Error::Io(libc::ENOENT))
    );
    // No stale bytes reach the caller
    common::assert_filled(&buf, 0);
}

// Writes over mapped files are refused
#[test]
fn writes_are_refused() {
    let tree = TempTree::new("filemap-readonly");
    let path = tree.file("data.bin", &pattern(1000));

    let (fat, mut image) = setup();
    let start = filemap::add(&fat, &mut image, &path, 1000);
    fat.finalize(DATA_CLUSTERS, &mut image);

    let written = vec![b'x'; 512];
    assert_eq!(
        image.receive(&written, fat.cluster_pos(start)),
        Err(Error::ReadOnlyMedium)
    );

    // The rejected write must not shadow the file
    let mut buf = vec![0u8; 512];
    image.fill(&mut buf, fat.cluster_pos(start)).unwrap();
    assert_eq!(&buf[..], &pattern(1000)[..512]);
}
