//! Spatial index of the image contents
//!
//! Most of the image is never stored literally; it is described by
//! data services that produce bytes on demand. The index keeps two
//! ordered maps keyed by image byte offset: one mapping ranges to
//! services, one holding literal chunks (bytes received from writes,
//! or installed directly, like the boot sector). Chunks shadow
//! services; anything covered by neither reads as zero.

pub mod service;

pub use service::DataService;

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::error::Result;

struct ServiceRange {
    length: u64,
    /// Stream offset of this range's first byte, from the service's
    /// point of view
    offset: u64,
    service: Rc<dyn DataService>,
}

/// Byte-range index mapping image offsets to data producers
#[derive(Default)]
pub struct Image {
    // Both maps are keyed by the image offset where the range starts.
    // Ranges within one map never overlap.
    services: BTreeMap<u64, ServiceRange>,
    chunks: BTreeMap<u64, Vec<u8>>,
}

impl Image {
    /// Create an empty index; everything reads as zero
    pub fn new() -> Self {
        Self::default()
    }

    // Key of the chunk containing `pos` or, if there is no such chunk,
    // of the first chunk starting after it.
    fn chunk_from(&self, pos: u64) -> Option<u64> {
        if let Some((&start, data)) = self.chunks.range(..=pos).next_back() {
            if start + data.len() as u64 > pos {
                return Some(start);
            }
        }
        self.chunks.range(pos..).next().map(|(&start, _)| start)
    }

    // Same as chunk_from but for service ranges
    fn service_from(&self, pos: u64) -> Option<u64> {
        if let Some((&start, range)) = self.services.range(..=pos).next_back() {
            if start + range.length > pos {
                return Some(start);
            }
        }
        self.services.range(pos..).next().map(|(&start, _)| start)
    }

    /// Mark `[start, start + length)` as provided by `service`, with
    /// `offset` as the stream position of `start`. Anything previously
    /// registered there is cleared first.
    ///
    /// A zero-length registration keeps no handle; if the caller passed
    /// in the only one, the service is destroyed here.
    pub fn register(&mut self, service: Rc<dyn DataService>, start: u64, length: u64, offset: u64) {
        if length == 0 {
            drop(service);
            return;
        }
        self.clear_services(start, length);
        // The cleared range cannot contain this key anymore
        self.services.insert(start, ServiceRange { length, offset, service });
    }

    /// Store literal bytes without notifying services. Used for content
    /// that is fixed at build time, like the reserved sectors.
    pub fn install(&mut self, buf: &[u8], start: u64) {
        if buf.is_empty() {
            return;
        }
        self.clear_data(start, buf.len() as u64);
        self.chunks.insert(start, buf.to_vec());
    }

    /// Accept data written to the image and store it for future fills.
    ///
    /// Every service overlapping the range is offered its part of the
    /// data first; if any of them rejects it, nothing is stored and the
    /// error is returned.
    pub fn receive(&mut self, buf: &[u8], start: u64) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        self.notify_services(buf, start)?;
        self.clear_data(start, buf.len() as u64);
        self.chunks.insert(start, buf.to_vec());
        Ok(())
    }

    fn notify_services(&self, buf: &[u8], start: u64) -> Result<()> {
        let end = start + buf.len() as u64;
        let Some(first) = self.service_from(start) else {
            return Ok(());
        };
        for (&range_start, range) in self.services.range(first..) {
            if range_start >= end {
                break;
            }
            // Clip the buffer to this range
            let seg_start = range_start.max(start);
            let seg_end = (range_start + range.length).min(end);
            if seg_end <= seg_start {
                continue;
            }
            let bufpos = (seg_start - start) as usize;
            let len = (seg_end - seg_start) as usize;
            range.service.receive(
                &buf[bufpos..bufpos + len],
                range.offset + (seg_start - range_start),
            )?;
        }
        Ok(())
    }

    /// Fill `buf` with image contents starting at byte `start`.
    ///
    /// At every position a stored chunk wins over a service, and a
    /// service wins over the zero fill. If a service fails, the
    /// remainder of `buf` is zeroed and the error is surfaced.
    pub fn fill(&self, buf: &mut [u8], start: u64) -> Result<()> {
        let length = buf.len() as u64;
        let mut chunks = self
            .chunks
            .range(self.chunk_from(start).unwrap_or(u64::MAX)..)
            .peekable();
        let mut services = self
            .services
            .range(self.service_from(start).unwrap_or(u64::MAX)..)
            .peekable();

        let mut filled: u64 = 0;
        while filled < length {
            let pos = start + filled;
            let mut limit = length - filled;

            // A literal chunk has priority at this position
            if let Some((&chunk_start, data)) = chunks.peek().copied() {
                if chunk_start <= pos {
                    let copy_off = (pos - chunk_start) as usize;
                    let n = (data.len() - copy_off).min(limit as usize);
                    buf[filled as usize..filled as usize + n]
                        .copy_from_slice(&data[copy_off..copy_off + n]);
                    filled += n as u64;
                    chunks.next();
                    continue;
                }
                limit = limit.min(chunk_start - pos);
            }

            // Then a data service
            if let Some((&range_start, range)) = services.peek().copied() {
                if range_start <= pos {
                    let fill_off = pos - range_start;
                    if range.length <= fill_off {
                        // A chunk overlay ran past the end of this range
                        services.next();
                        continue;
                    }
                    let n = (range.length - fill_off).min(limit);
                    let seg = &mut buf[filled as usize..(filled + n) as usize];
                    if let Err(err) = range.service.fill(seg, range.offset + fill_off) {
                        // Don't leak stale buffer contents on a failure
                        buf[filled as usize..].fill(0);
                        return Err(err);
                    }
                    filled += n;
                    services.next();
                    continue;
                }
                limit = limit.min(range_start - pos);
            }

            // Nothing covers this span
            buf[filled as usize..(filled + limit) as usize].fill(0);
            filled += limit;
        }
        Ok(())
    }

    /// Throw away stored chunks in `[start, start + length)`, clipping
    /// chunks that cross either boundary. Services covering the range
    /// become visible to fills again.
    pub fn clear_data(&mut self, start: u64, length: u64) {
        if length == 0 {
            return;
        }
        let end = start + length;

        let mut keys: Vec<u64> = Vec::new();
        if let Some((&key, data)) = self.chunks.range(..start).next_back() {
            if key + data.len() as u64 > start {
                keys.push(key);
            }
        }
        keys.extend(self.chunks.range(start..end).map(|(&key, _)| key));

        for key in keys {
            let Some(data) = self.chunks.get(&key) else {
                continue;
            };
            let chunk_end = key + data.len() as u64;
            // A chunk sticking out past the cleared range keeps its tail
            let tail = (chunk_end > end).then(|| data[(end - key) as usize..].to_vec());

            if key < start {
                if let Some(data) = self.chunks.get_mut(&key) {
                    data.truncate((start - key) as usize);
                }
            } else {
                self.chunks.remove(&key);
            }
            if let Some(tail) = tail {
                self.chunks.insert(end, tail);
            }
        }
    }

    /// Remove service coverage in `[start, start + length)`. Ranges
    /// that only partly overlap stay registered for their remainder; a
    /// range whose middle is cleared is split in two, with the new
    /// piece holding its own handle on the service. Ranges removed
    /// entirely release their handle.
    pub fn clear_services(&mut self, start: u64, length: u64) {
        if length == 0 {
            return;
        }
        let end = start + length;

        let mut keys: Vec<u64> = Vec::new();
        if let Some((&key, range)) = self.services.range(..start).next_back() {
            if key + range.length > start {
                keys.push(key);
            }
        }
        keys.extend(self.services.range(start..end).map(|(&key, _)| key));

        for key in keys {
            let Some(range) = self.services.get(&key) else {
                continue;
            };
            let range_end = key + range.length;
            let tail = (range_end > end).then(|| ServiceRange {
                length: range_end - end,
                offset: range.offset + (end - key),
                service: Rc::clone(&range.service),
            });

            if key < start {
                if let Some(range) = self.services.get_mut(&key) {
                    range.length = start - key;
                }
            } else {
                self.services.remove(&key);
            }
            if let Some(tail) = tail {
                self.services.insert(end, tail);
            }
        }
    }
}
