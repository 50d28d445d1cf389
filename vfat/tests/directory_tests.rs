//! Directory encoding tests

mod common;

use std::rc::Rc;

use vfat::directory::entry::{shortname_checksum, DIR_ENTRY_SIZE};
use vfat::directory::DirTable;
use vfat::error::Error;
use vfat::fat::Fat;
use vfat::image::Image;
use vfat::types::{Attributes, ATTR_LFN, CLUSTER_SIZE, FAT_END_OF_CHAIN};
use vfat::utils::string::utf16_name;

const DATA_CLUSTERS: u32 = 1_000_000;

fn setup() -> (Rc<Fat>, Image, DirTable) {
    let fat = Rc::new(Fat::new(DATA_CLUSTERS));
    let mut image = Image::new();
    let dirs = DirTable::new(&fat, &mut image);
    (fat, image, dirs)
}

fn read_cluster(fat: &Fat, image: &Image, cluster: u32) -> Vec<u8> {
    let mut buf = vec![0u8; CLUSTER_SIZE as usize];
    image.fill(&mut buf, fat.cluster_pos(cluster)).unwrap();
    buf
}

// Byte-exact check of a single-LFN entry in the root directory
#[test]
fn lfn_and_short_entry_encoding() {
    let (fat, mut image, mut dirs) = setup();
    dirs.add_entry(
        &fat,
        &mut image,
        0, // the root may be named by its entry convention
        0x2004_2448,
        &utf16_name("testname.tst"),
        0x1003_1337,
        Attributes::READ_ONLY,
        0x536b_4b33,
        0x536e_589b,
    )
    .unwrap();
    fat.finalize(DATA_CLUSTERS, &mut image);

    let cluster = read_cluster(&fat, &image, 2);

    // First record: the one and only long-filename part
    assert_eq!(cluster[0], 0x41); // sequence 1, end of sequence
    assert_eq!(cluster[11], ATTR_LFN);
    assert_eq!(cluster[13], 212); // checksum of the short-name token

    let offsets = [1, 3, 5, 7, 9, 14, 16, 18, 20, 22, 24, 28, 30];
    let expected: Vec<u16> = "testname.tst".encode_utf16().chain([0]).collect();
    for (i, &pos) in offsets.iter().enumerate() {
        let unit = u16::from_le_bytes([cluster[pos], cluster[pos + 1]]);
        assert_eq!(unit, expected[i], "code unit {}", i);
    }

    // Second record: the short entry
    let short = &cluster[32..64];
    assert_eq!(shortname_checksum(short[0..11].try_into().unwrap()), 212);
    assert_eq!(short[11], 0x01); // read-only
    assert_eq!(short[13], 100); // odd mtime second
    assert_eq!(&short[20..22], &[0x04, 0x20]); // cluster bits 16..32
    assert_eq!(&short[26..28], &[0x48, 0x24]); // cluster bits 0..16
    assert_eq!(&short[28..32], &[0x37, 0x13, 0x03, 0x10]); // file size

    // Nothing else in the cluster
    common::assert_filled(&cluster[64..], 0);
}

// A name needing several LFN records stores them in descending
// sequence order, all carrying the same checksum
#[test]
fn multi_part_names() {
    let (fat, mut image, mut dirs) = setup();
    let name = "a".repeat(30); // 31 units with terminator: 3 LFN records
    dirs.add_entry(&fat, &mut image, 0, 5, &utf16_name(&name), 123, Attributes::empty(), 0, 0)
        .unwrap();
    fat.finalize(DATA_CLUSTERS, &mut image);

    let cluster = read_cluster(&fat, &image, 2);
    assert_eq!(cluster[0], 0x43); // sequence 3, end of sequence
    assert_eq!(cluster[32], 0x02);
    assert_eq!(cluster[64], 0x01);
    for record in 0..3 {
        assert_eq!(cluster[record * 32 + 11], ATTR_LFN);
        assert_eq!(cluster[record * 32 + 13], cluster[13]);
    }
    // The short record follows the last name part
    let short = &cluster[96..128];
    assert_eq!(
        shortname_checksum(short[0..11].try_into().unwrap()),
        cluster[13]
    );
    common::assert_filled(&cluster[128..], 0);
}

// The record count is one short record plus ceil(units / 13) LFN parts
#[test]
fn record_counts() {
    for (len, expected_records) in [(1, 2), (12, 2), (13, 3), (26, 4), (255, 21)] {
        let (fat, mut image, mut dirs) = setup();
        let name = "x".repeat(len);
        dirs.add_entry(&fat, &mut image, 0, 5, &utf16_name(&name), 0, Attributes::empty(), 0, 0)
            .unwrap();
        fat.finalize(DATA_CLUSTERS, &mut image);

        let cluster = read_cluster(&fat, &image, 2);
        let used = cluster
            .chunks_exact(DIR_ENTRY_SIZE)
            .take_while(|record| record[0] != 0)
            .count();
        assert_eq!(used, expected_records, "name length {}", len);
    }
}

#[test]
fn name_too_long() {
    let (fat, mut image, mut dirs) = setup();
    let name = "x".repeat(256); // 257 units with the terminator
    assert_eq!(
        dirs.add_entry(&fat, &mut image, 0, 5, &utf16_name(&name), 0, Attributes::empty(), 0, 0),
        Err(Error::InvalidArgument)
    );

    // 255 characters is the limit and must still encode
    let name = "x".repeat(255);
    dirs.add_entry(&fat, &mut image, 0, 5, &utf16_name(&name), 0, Attributes::empty(), 0, 0)
        .unwrap();
}

#[test]
fn unknown_parent_rejected() {
    let (fat, mut image, mut dirs) = setup();
    assert_eq!(
        dirs.add_entry(&fat, &mut image, 999, 5, &utf16_name("a"), 0, Attributes::empty(), 0, 0),
        Err(Error::InvalidArgument)
    );
}

// Directory attributes force the size field to zero and always carry
// the read-only bit
#[test]
fn directory_attributes() {
    let (fat, mut image, mut dirs) = setup();
    dirs.add_entry(
        &fat,
        &mut image,
        0,
        5,
        &utf16_name("sub"),
        0xdead_beef,
        Attributes::DIRECTORY,
        0,
        0,
    )
    .unwrap();
    fat.finalize(DATA_CLUSTERS, &mut image);

    let cluster = read_cluster(&fat, &image, 2);
    let short = &cluster[32..64];
    assert_eq!(short[11], (Attributes::DIRECTORY | Attributes::READ_ONLY).bits());
    assert_eq!(&short[28..32], &[0, 0, 0, 0]);
}

// Filling a directory past one cluster grows its chain; the new
// cluster lands after everything else and continues the record stream
#[test]
fn growth_across_clusters() {
    let (fat, mut image, mut dirs) = setup();
    // A second directory right after the root forces the root's growth
    // to be non-contiguous
    let other = dirs.alloc_new(&fat, &mut image, std::path::Path::new("other"));
    assert_eq!(other, 3);

    // Single-LFN names make every entry exactly two records, so 64
    // entries fill the root cluster exactly
    for i in 0..65 {
        let name = format!("file-{:03}", i);
        dirs.add_entry(&fat, &mut image, 0, 10 + i, &utf16_name(&name), 1, Attributes::empty(), 0, 0)
            .unwrap();
    }
    fat.finalize(DATA_CLUSTERS, &mut image);

    // The root chain continues in cluster 4
    let mut buf = vec![0u8; 5 * 4];
    image.fill(&mut buf, (32 * 512) as u64).unwrap();
    let entries = common::fat_entries(&buf);
    assert_eq!(entries[2], 4);
    assert_eq!(entries[3], FAT_END_OF_CHAIN); // the other directory
    assert_eq!(entries[4], FAT_END_OF_CHAIN); // continuation of the root

    // The 65th entry's records start the overflow cluster
    let overflow = read_cluster(&fat, &image, 4);
    assert_eq!(overflow[0], 0x41);
    let expected: Vec<u16> = "file-064".encode_utf16().collect();
    assert_eq!(
        u16::from_le_bytes([overflow[1], overflow[2]]),
        expected[0]
    );
    let short = &overflow[32..64];
    assert_eq!(short[26], 10 + 64); // starting cluster of the entry
    common::assert_filled(&overflow[64..], 0);

    // The first cluster is still fully populated
    let first = read_cluster(&fat, &image, 2);
    assert!(first.chunks_exact(DIR_ENTRY_SIZE).all(|r| r[0] != 0));
}
