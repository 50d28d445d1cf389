//! The File Allocation Table, stored as extents
//!
//! The FAT uses 4 bytes per data cluster to record allocation. The
//! allocations are singly linked lists, with each entry pointing to the
//! next or holding an end marker. Instead of materializing the table,
//! it is kept as a sorted sequence of [`Extent`] runs.
//!
//! The table has two stages. During construction, directories are
//! allocated from the beginning of the data area and file mappings
//! from the end. `finalize` then fills the space in between with a
//! free run (capped, so the guest never sees more free space than the
//! host has) and a bad-cluster run, and registers the table with the
//! image index as the producer of the FAT region's bytes. After that
//! the table only changes through the diagnostic write-back path.

pub mod extent;

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::rc::Rc;

use log::debug;

use crate::error::{Error, Result};
use crate::image::{DataService, Image};
use crate::types::{
    CLUSTER_SIZE, FAT_BAD_CLUSTER, FAT_END_OF_CHAIN, FAT_UNALLOCATED, RESERVED_FAT_ENTRIES,
    RESERVED_SECTORS, SECTOR_SIZE,
};
use crate::utils::align_up;
use extent::{Extent, ENTRY_0, ENTRY_1};

/// The allocation table of one volume.
///
/// Shared as `Rc<Fat>` so that finalize can hand the image index a
/// reference to the same table the construction code used. All
/// requests run on one execution context, so the interior mutability
/// never sees concurrent borrows.
pub struct Fat {
    data_clusters: u32,
    fat_size: u64,
    /// The dummy entries, the directories and (after finalize)
    /// everything else, sorted by starting cluster
    front: RefCell<Vec<Extent>>,
    /// File mapping extents ordered from high to low cluster numbers,
    /// which makes appending cheap. Emptied into `front` by finalize.
    tail: RefCell<Vec<Extent>>,
    finalized: Cell<bool>,
}

// Index of the extent containing the given cluster number
fn find_extent(extents: &[Extent], cluster: u32) -> Option<usize> {
    extents
        .binary_search_by(|fe| {
            if fe.end < cluster {
                Ordering::Less
            } else if fe.start > cluster {
                Ordering::Greater
            } else {
                Ordering::Equal
            }
        })
        .ok()
}

fn valid_chain_value(value: u32, data_clusters: u32) -> bool {
    if value == FAT_END_OF_CHAIN {
        return true;
    }
    value >= RESERVED_FAT_ENTRIES && value < data_clusters + RESERVED_FAT_ENTRIES
}

/// Try to add one entry holding `value` to the end of this extent.
/// The caller patches up the following extent on success.
fn try_inc_extent(extents: &mut [Extent], extent_nr: usize, value: u32, data_clusters: u32) -> bool {
    let fe = &mut extents[extent_nr];

    // Literal extents absorb an entry of the same value
    if fe.is_literal() {
        if fe.next == value {
            fe.end += 1;
            return true;
        }
        return false;
    }

    // Chains can absorb the entry if their next pointer was pointing at
    // the following cluster anyway. That won't happen in a properly
    // constructed FAT, but is typical while a guest writes out a new
    // chain front to back.
    if fe.next == fe.end + 1 && valid_chain_value(value, data_clusters) {
        fe.next = value;
        fe.end += 1;
        return true;
    }

    false
}

/// This extent had its first entry stolen by its predecessor
fn bump_extent(extents: &mut Vec<Extent>, extent_nr: usize) {
    let fe = &mut extents[extent_nr];
    if fe.start == fe.end {
        extents.remove(extent_nr);
    } else {
        fe.start += 1;
        if !fe.is_literal() {
            // Whatever prev pointed at no longer points back here
            fe.prev = FAT_END_OF_CHAIN;
        }
    }
}

/// Change the last entry of a chain extent, if that makes sense
fn try_renext_extent(extents: &mut [Extent], extent_nr: usize, value: u32, data_clusters: u32) -> bool {
    if extent_nr < RESERVED_FAT_ENTRIES as usize {
        return false;
    }
    let fe = &mut extents[extent_nr];
    if fe.is_literal() {
        return false;
    }
    if valid_chain_value(value, data_clusters) {
        fe.next = value;
        return true;
    }
    false
}

/// Split or reuse an extent so that `cluster` gets a single-entry
/// extent of its own, holding `value`.
fn punch_extent(extents: &mut Vec<Extent>, extent_nr: usize, cluster: u32, value: u32) {
    let new_ext = if value == FAT_UNALLOCATED || value == FAT_BAD_CLUSTER {
        Extent::literal(cluster, cluster, value)
    } else {
        Extent { start: cluster, end: cluster, next: value, prev: FAT_END_OF_CHAIN }
    };

    let fe = extents[extent_nr];
    if fe.start == fe.end {
        extents[extent_nr] = new_ext; // re-use
        return;
    }
    if fe.start == cluster {
        extents[extent_nr].start += 1;
        extents.insert(extent_nr, new_ext);
        return;
    }
    if fe.end == cluster {
        let fe = &mut extents[extent_nr];
        fe.end -= 1;
        if !fe.is_literal() {
            fe.next = cluster; // preserve the displaced value
        }
        extents.insert(extent_nr + 1, new_ext);
        return;
    }

    // The extent has to be split into two pieces around the new one
    let mut post = fe;
    post.start = cluster + 1;
    {
        let pre = &mut extents[extent_nr];
        pre.end = cluster - 1;
        if !pre.is_literal() {
            pre.next = cluster; // preserve the displaced value
            post.prev = FAT_END_OF_CHAIN; // the chain is broken here
        }
    }
    extents.insert(extent_nr + 1, new_ext);
    extents.insert(extent_nr + 2, post);
}

fn put_entry(buf: &mut [u8], index: usize, value: u32) {
    buf[index * 4..index * 4 + 4].copy_from_slice(&value.to_le_bytes());
}

fn get_entry(buf: &[u8], index: usize) -> u32 {
    u32::from_le_bytes([
        buf[index * 4],
        buf[index * 4 + 1],
        buf[index * 4 + 2],
        buf[index * 4 + 3],
    ])
}

impl Fat {
    /// Table for a data area of `data_clusters` clusters, containing
    /// only the two dummy entries.
    pub fn new(data_clusters: u32) -> Self {
        Self {
            data_clusters,
            fat_size: align_up(
                (data_clusters as u64 + RESERVED_FAT_ENTRIES as u64) * 4,
                SECTOR_SIZE as u64,
            ),
            front: RefCell::new(vec![ENTRY_0, ENTRY_1]),
            tail: RefCell::new(Vec::new()),
            finalized: Cell::new(false),
        }
    }

    /// Number of data clusters the table covers
    pub fn data_clusters(&self) -> u32 {
        self.data_clusters
    }

    /// Byte size of the FAT region, aligned up to a full sector
    pub fn fat_size(&self) -> u64 {
        self.fat_size
    }

    /// Image byte position of a data cluster
    pub fn cluster_pos(&self, cluster: u32) -> u64 {
        (RESERVED_SECTORS * SECTOR_SIZE) as u64
            + self.fat_size
            + (cluster as u64 - RESERVED_FAT_ENTRIES as u64) * CLUSTER_SIZE as u64
    }

    // Only valid during the construction stage
    fn first_free_cluster(front: &[Extent]) -> u32 {
        front.last().map(|fe| fe.end + 1).unwrap_or(RESERVED_FAT_ENTRIES)
    }

    // Only valid during the construction stage
    fn last_free_cluster(&self, tail: &[Extent]) -> u32 {
        match tail.last() {
            Some(fe) => fe.start - 1,
            None => self.data_clusters + RESERVED_FAT_ENTRIES - 1,
        }
    }

    /// Reserve a fresh chain of `clusters` clusters at the start of the
    /// data area and return its first cluster.
    pub fn alloc_beginning(&self, clusters: u32) -> u32 {
        debug_assert!(!self.finalized.get());
        let mut front = self.front.borrow_mut();
        let start = Self::first_free_cluster(&front);
        front.push(Extent::chain(start, start + clusters - 1));
        start
    }

    /// Reserve a fresh chain of `clusters` clusters at the end of the
    /// data area and return its first cluster.
    pub fn alloc_end(&self, clusters: u32) -> u32 {
        debug_assert!(!self.finalized.get());
        let mut tail = self.tail.borrow_mut();
        let end = self.last_free_cluster(&tail);
        let start = end - clusters + 1;
        tail.push(Extent::chain(start, end));
        start
    }

    /// Add one cluster to the chain containing `cluster` and return the
    /// chain's new last cluster. Fails if `cluster` is not part of a
    /// chain or if there is no room left between the two regions.
    pub fn extend_chain(&self, cluster: u32) -> Option<u32> {
        debug_assert!(!self.finalized.get());
        let mut front = self.front.borrow_mut();
        let last_free = self.last_free_cluster(&self.tail.borrow());

        // Search for the extent ending this chain
        let mut extent_nr = find_extent(&front, cluster)?;
        while front[extent_nr].next != FAT_END_OF_CHAIN {
            if front[extent_nr].is_literal() {
                return None;
            }
            extent_nr = find_extent(&front, front[extent_nr].next)?;
        }
        if front[extent_nr].is_literal() {
            return None;
        }

        if extent_nr == front.len() - 1 {
            // The chain ends the front region; extend it in place
            if front[extent_nr].end >= last_free {
                return None;
            }
            front[extent_nr].end += 1;
            return Some(front[extent_nr].end);
        }

        let start = Self::first_free_cluster(&front);
        if start > last_free {
            return None;
        }
        let mut new_extent = Extent::chain(start, start);
        new_extent.prev = front[extent_nr].end;
        front[extent_nr].next = start;
        front.push(new_extent);
        Some(start)
    }

    /// Transition from construction to serving: fill the gap between
    /// the regions with a free run of at most `max_free_clusters` and a
    /// bad-cluster run for the rest, splice in the file mappings, and
    /// register the table with `image` for the FAT region.
    pub fn finalize(self: &Rc<Self>, max_free_clusters: u32, image: &mut Image) {
        {
            let mut front = self.front.borrow_mut();
            let mut tail = self.tail.borrow_mut();

            // The unused space is split into an unallocated part and a
            // marked-unusable part, so the guest cannot be promised
            // more room than the host filesystem has.
            let first_free = Self::first_free_cluster(&front) as i64;
            let last_free = self.last_free_cluster(&tail) as i64;
            let free_end = last_free.min(first_free + max_free_clusters as i64 - 1);

            if free_end >= first_free {
                front.push(Extent::literal(first_free as u32, free_end as u32, FAT_UNALLOCATED));
            }
            if last_free > free_end {
                front.push(Extent::literal((free_end + 1) as u32, last_free as u32, FAT_BAD_CLUSTER));
            }

            while let Some(fe) = tail.pop() {
                front.push(fe);
            }
            debug!("allocation table finalized with {} extents", front.len());
        }
        self.finalized.set(true);

        image.register(
            Rc::clone(self) as Rc<dyn DataService>,
            (RESERVED_SECTORS * SECTOR_SIZE) as u64,
            self.fat_size,
            0,
        );
    }

    /// Check chain structure after a write-back: every chain's next
    /// pointer must lead to the start of another chain extent, and no
    /// two chains may share a successor. Unset prev back-pointers are
    /// claimed when a matching next pointer is found.
    pub fn is_consistent(&self) -> bool {
        let front = &mut *self.front.borrow_mut();
        for i in (0..front.len()).rev() {
            let fe = front[i];
            if fe.is_literal() || fe.next == FAT_END_OF_CHAIN {
                continue;
            }
            if !valid_chain_value(fe.next, self.data_clusters) {
                return false;
            }
            let Some(next_nr) = find_extent(front, fe.next) else {
                return false;
            };
            let nfe = &mut front[next_nr];
            if nfe.is_literal() {
                return false;
            }
            if fe.next != nfe.start {
                return false;
            }
            if nfe.prev == FAT_END_OF_CHAIN {
                // Nothing claimed this extent yet; claim it now
                nfe.prev = fe.end;
            } else if nfe.prev != fe.end {
                return false;
            }
        }
        true
    }
}

impl DataService for Fat {
    /// Render FAT entries as little-endian 32-bit values. `offset` and
    /// the buffer length must be multiples of the entry size.
    fn fill(&self, buf: &mut [u8], offset: u64) -> Result<()> {
        if offset % 4 != 0 || buf.len() % 4 != 0 {
            return Err(Error::InvalidArgument);
        }
        let front = self.front.borrow();
        let entry_nr = (offset / 4) as u32;
        let entries = buf.len() / 4;
        let mut i = 0;

        let mut extent_nr = find_extent(&front, entry_nr);
        while let Some(nr) = extent_nr {
            let fe = front[nr];
            if fe.is_literal() {
                while entry_nr + (i as u32) <= fe.end && i < entries {
                    put_entry(buf, i, fe.next);
                    i += 1;
                }
            } else {
                while entry_nr + (i as u32) < fe.end && i < entries {
                    put_entry(buf, i, entry_nr + i as u32 + 1);
                    i += 1;
                }
                if i < entries {
                    put_entry(buf, i, fe.next);
                    i += 1;
                }
            }
            if i == entries {
                return Ok(());
            }
            // The finalized table is dense, so the neighbour by index
            // is the neighbour by cluster; no need to search again
            extent_nr = if nr < front.len() - 1 { Some(nr + 1) } else { None };
        }

        // Past the end of the data clusters. The FAT can still extend
        // here because its byte size rounds up to a full sector; there
        // is no spec for that space, but bad-cluster markers make sure
        // nothing tries to use it.
        while i < entries {
            put_entry(buf, i, FAT_BAD_CLUSTER);
            i += 1;
        }
        Ok(())
    }

    /// Interpret entries written by the guest and adjust the extents
    /// where conclusions can be drawn. Writes are diffed against the
    /// rendered table; changes to reserved or unusable entries are
    /// rejected.
    fn receive(&self, buf: &[u8], offset: u64) -> Result<()> {
        if offset % 4 != 0 || buf.len() % 4 != 0 {
            return Err(Error::InvalidArgument);
        }
        let mut orig = vec![0u8; buf.len()];
        self.fill(&mut orig, offset)?;

        let entry_nr = (offset / 4) as u32;
        let front = &mut *self.front.borrow_mut();

        for i in 0..buf.len() / 4 {
            let value = get_entry(buf, i);
            if value == get_entry(&orig, i) {
                continue;
            }
            let target = entry_nr + i as u32;
            if target < RESERVED_FAT_ENTRIES {
                return Err(Error::InconsistentWrite);
            }
            if get_entry(&orig, i) == FAT_BAD_CLUSTER {
                return Err(Error::InconsistentWrite);
            }
            let Some(extent_nr) = find_extent(front, target) else {
                return Err(Error::InconsistentWrite);
            };

            if front[extent_nr].start == target
                && extent_nr > 0
                && try_inc_extent(front, extent_nr - 1, value, self.data_clusters)
            {
                // The previous extent absorbed this entry
                bump_extent(front, extent_nr);
                continue;
            }
            if front[extent_nr].end == target
                && try_renext_extent(front, extent_nr, value, self.data_clusters)
            {
                continue;
            }
            // Split off a new extent for this entry and record it as a
            // single-cluster chain
            punch_extent(front, extent_nr, target, value);
        }
        Ok(())
    }
}
