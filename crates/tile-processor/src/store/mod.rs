//! Persistent chunked output store.

mod zarr_store;

pub use zarr_store::ZarrChunkStore;

use std::fmt;
use std::ops::Range;

use crate::block::TileBlock;
use crate::error::Result;
use crate::resume::ExistingChunks;
use crate::types::Tczyx;

/// An absolute region of the output array, one range per TCZYX axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRegion {
    pub ranges: [Range<u64>; 5],
}

impl OutputRegion {
    /// Region of `shape` starting at `start`.
    pub fn new(start: Tczyx, shape: Tczyx) -> Self {
        let start = start.to_array();
        let shape = shape.to_array();
        Self {
            ranges: std::array::from_fn(|i| start[i]..start[i] + shape[i]),
        }
    }

    pub fn start(&self) -> Tczyx {
        Tczyx::from_array(self.ranges.clone().map(|r| r.start))
    }

    pub fn shape(&self) -> Tczyx {
        Tczyx::from_array(self.ranges.clone().map(|r| r.end - r.start))
    }
}

impl fmt::Display for OutputRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [t, c, z, y, x] = &self.ranges;
        write!(
            f,
            "t={}..{} c={}..{} z={}..{} y={}..{} x={}..{}",
            t.start, t.end, c.start, c.end, z.start, z.end, y.start, y.end, x.start, x.end
        )
    }
}

/// A chunked TCZYX `uint16` array that tiles are written into.
///
/// Writes from different tiles cover disjoint sets of storage chunks, so
/// implementations must allow concurrent `write_region` calls.
pub trait ChunkStore: Send + Sync {
    /// Full array shape.
    fn shape(&self) -> Tczyx;

    /// Storage chunk shape.
    fn chunk_shape(&self) -> Tczyx;

    /// Keys of every object currently in the store, chunk keys included.
    fn list_keys(&self) -> Result<Vec<String>>;

    /// Write `block` into `region`; the region's shape must equal the block's.
    fn write_region(&self, region: &OutputRegion, block: &TileBlock) -> Result<()>;

    /// Snapshot of the storage chunks already written.
    fn existing_chunks(&self) -> Result<ExistingChunks> {
        let keys = self.list_keys()?;
        let channel_chunks = self.shape().c.div_ceil(self.chunk_shape().c.max(1));
        Ok(ExistingChunks::from_keys(
            keys.iter().map(String::as_str),
            channel_chunks,
        ))
    }
}
