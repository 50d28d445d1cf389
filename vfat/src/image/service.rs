//! The data service capability

use crate::error::Result;

/// A producer of bytes for a range of the image.
///
/// Services are registered with the [`Image`](super::Image) index and
/// shared through `Rc`: the index holds one handle per covered range,
/// and may take extra handles when a later registration splits a range
/// in two. A service bound at several image positions (a fragmented
/// directory, say) sees one logical byte stream; the index translates
/// image offsets to stream offsets before calling in.
pub trait DataService {
    /// Fill `buf` with bytes of this service's stream, starting at
    /// `offset` within the stream.
    fn fill(&self, buf: &mut [u8], offset: u64) -> Result<()>;

    /// Accept bytes written to this service's stream starting at
    /// `offset`. Returning an error rejects the write; on success the
    /// image index stores the bytes and serves them on future fills.
    fn receive(&self, buf: &[u8], offset: u64) -> Result<()>;
}
