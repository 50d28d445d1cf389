//! Boot sector and filesystem information sector
//!
//! All multibyte fields are little-endian. Offsets follow the FAT32
//! BIOS parameter block layout.

use super::Geometry;
use crate::types::{RESERVED_SECTORS, ROOT_DIR_CLUSTER, SECTORS_PER_CLUSTER, SECTOR_SIZE};

/// Build the boot sector for the given geometry. `label` is truncated
/// to the 11 bytes the format allows.
pub fn boot_sector(geometry: &Geometry, volume_id: u32, label: Option<&str>) -> [u8; 512] {
    let mut sector = [0u8; 512];

    sector[0..3].copy_from_slice(&[0xeb, 0xfe, 0x90]); // x86 asm, infinite loop
    sector[3..11].copy_from_slice(b"BLOCKD  "); // system id

    // Bios parameter block
    sector[11..13].copy_from_slice(&(SECTOR_SIZE as u16).to_le_bytes());
    sector[13] = SECTORS_PER_CLUSTER as u8;
    sector[14..16].copy_from_slice(&(RESERVED_SECTORS as u16).to_le_bytes());
    sector[16] = 1; // number of FATs; a virtual image needs no backup copy
    // bytes 17..21: root dir size and total sectors, N/A for FAT32
    sector[21] = 0xf8; // media descriptor: fixed disk
    // bytes 22..24: sectors per FAT, stored in the 32-bit field below
    sector[24..26].copy_from_slice(&1u16.to_le_bytes()); // sectors per track, unused
    sector[26..28].copy_from_slice(&1u16.to_le_bytes()); // heads, unused
    // bytes 28..32: sectors before the start of the partition
    sector[32..36].copy_from_slice(&geometry.total_sectors.to_le_bytes());
    sector[36..40].copy_from_slice(&geometry.fat_sectors.to_le_bytes());
    // bytes 40..44: FAT usage flags and format version 0.0
    sector[44..48].copy_from_slice(&ROOT_DIR_CLUSTER.to_le_bytes());
    sector[48..50].copy_from_slice(&1u16.to_le_bytes()); // FSINFO sector location
    // bytes 50..52: backup boot sector (none)
    // bytes 52..64: reserved
    sector[64] = 0x80; // drive number: first fixed disk
    sector[66] = 0x29; // the id, label and type fields below are valid
    sector[67..71].copy_from_slice(&volume_id.to_le_bytes());

    sector[71..82].copy_from_slice(b"BLOCKD FS  ");
    if let Some(label) = label {
        let bytes = label.as_bytes();
        let n = bytes.len().min(11);
        sector[71..71 + n].copy_from_slice(&bytes[..n]);
        sector[71 + n..82].fill(b' ');
    }
    sector[82..90].copy_from_slice(b"FAT32   ");
    // The rest stays zero filled
    sector
}

/// Build the filesystem information sector. Nothing in it is useful
/// for a read-only volume, but it is expected to be present.
pub fn fsinfo_sector() -> [u8; 512] {
    let mut sector = [0u8; 512];
    sector[0..4].copy_from_slice(b"RRaA");
    sector[0x1e4..0x1e8].copy_from_slice(b"rrAa");
    // Unset values for the free cluster count and allocation hint
    sector[0x1e8..0x1ec].fill(0xff);
    sector[0x1ec..0x1f0].fill(0xff);
    sector[0x1fc..0x200].copy_from_slice(&[0x00, 0x00, 0x55, 0xaa]);
    sector
}
