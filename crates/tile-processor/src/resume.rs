//! Resumability: mapping tiles onto storage chunks and deciding whether a
//! tile's whole storage footprint has already been written.

use std::collections::{HashMap, HashSet};

use crate::error::{Result, TileProcessorError};
use crate::types::{Tczyx, Tzyx, TILED_AXES};

/// Ratio of tile size to storage chunk size on each tiled axis.
///
/// The storage chunk must not be larger than the tile and must divide it
/// exactly, so every tile covers a whole number of storage chunks.
pub fn chunk_ratios(tile_size: Tzyx, storage_chunk: Tzyx) -> Result<Tzyx> {
    let tile = tile_size.to_array();
    let chunk = storage_chunk.to_array();
    let mut ratios = [0u64; 4];
    for axis in 0..4 {
        let name = TILED_AXES[axis];
        let (d, f) = (tile[axis], chunk[axis]);
        if f == 0 || d == 0 {
            return Err(TileProcessorError::config(format!(
                "axis {name}: tile size {d} and output chunk size {f} must both be > 0"
            )));
        }
        if f > d {
            return Err(TileProcessorError::config(format!(
                "axis {name}: output chunk size {f} is larger than tile size {d}"
            )));
        }
        if d % f != 0 {
            return Err(TileProcessorError::config(format!(
                "axis {name}: tile size {d} is not a multiple of output chunk size {f}"
            )));
        }
        ratios[axis] = d / f;
    }
    Ok(Tzyx::from_array(ratios))
}

/// Parse a storage chunk key into its TCZYX chunk coordinate.
///
/// Accepts the Zarr V3 default encoding (`c/0/1/0/3/2`, also with `.`
/// separators) and the V2 encoding (`0.1.0.3.2`). Metadata keys and keys of
/// other dimensionality yield `None`.
pub fn parse_chunk_key(key: &str) -> Option<Tczyx> {
    let key = key.rsplit_once("c/").map_or(key, |(prefix, rest)| {
        if prefix.is_empty() || prefix.ends_with('/') {
            rest
        } else {
            key
        }
    });
    let key = key.strip_prefix("c.").unwrap_or(key);
    let coords = key
        .split(&['/', '.'][..])
        .map(|part| part.parse::<u64>().ok())
        .collect::<Option<Vec<_>>>()?;
    Tczyx::from_slice(&coords)
}

/// Snapshot of the storage chunks present when the run started.
///
/// Coordinates are on the tiled axes only. A TZYX coordinate counts as
/// present when every channel chunk at that coordinate exists, so a write
/// interrupted between channels is not mistaken for a finished one.
#[derive(Debug, Clone, Default)]
pub struct ExistingChunks {
    present: HashSet<Tzyx>,
}

impl ExistingChunks {
    /// Build from parsed keys. `channel_chunks` is the number of storage
    /// chunks along the channel axis.
    pub fn from_coords(coords: impl IntoIterator<Item = Tczyx>, channel_chunks: u64) -> Self {
        let mut channels: HashMap<Tzyx, HashSet<u64>> = HashMap::new();
        for coord in coords {
            if coord.c < channel_chunks {
                channels.entry(coord.tzyx()).or_default().insert(coord.c);
            }
        }
        let present = channels
            .into_iter()
            .filter(|(_, cs)| cs.len() as u64 == channel_chunks)
            .map(|(coord, _)| coord)
            .collect();
        Self { present }
    }

    /// Build from raw store keys, skipping anything that is not a chunk key.
    pub fn from_keys<'a>(keys: impl IntoIterator<Item = &'a str>, channel_chunks: u64) -> Self {
        Self::from_coords(keys.into_iter().filter_map(parse_chunk_key), channel_chunks)
    }

    pub fn contains(&self, coord: &Tzyx) -> bool {
        self.present.contains(coord)
    }

    pub fn len(&self) -> usize {
        self.present.len()
    }

    pub fn is_empty(&self) -> bool {
        self.present.is_empty()
    }
}

impl FromIterator<Tzyx> for ExistingChunks {
    fn from_iter<I: IntoIterator<Item = Tzyx>>(iter: I) -> Self {
        Self {
            present: iter.into_iter().collect(),
        }
    }
}

/// Whether every storage chunk covered by the tile at `tile_index` exists.
///
/// Walks the product of per-axis storage ranges `[i*r, (i+1)*r)` and stops
/// at the first missing chunk.
pub fn already_done(tile_index: Tzyx, ratios: Tzyx, existing: &ExistingChunks) -> bool {
    let lo = tile_index.zip_with(ratios, |i, r| i * r);
    let hi = lo.zip_with(ratios, |l, r| l + r);
    chunks_present(lo, hi, existing)
}

/// Like [`already_done`], with the storage ranges clipped to `chunk_grid`.
///
/// A short last tile covers fewer storage chunks than its ratio implies;
/// the chunks past the end of the array never exist.
pub fn already_done_within(
    tile_index: Tzyx,
    ratios: Tzyx,
    chunk_grid: Tzyx,
    existing: &ExistingChunks,
) -> bool {
    let lo = tile_index.zip_with(ratios, |i, r| i * r);
    let hi = lo.zip_with(ratios, |l, r| l + r).zip_with(chunk_grid, u64::min);
    chunks_present(lo, hi, existing)
}

fn chunks_present(lo: Tzyx, hi: Tzyx, existing: &ExistingChunks) -> bool {
    for t in lo.t..hi.t {
        for z in lo.z..hi.z {
            for y in lo.y..hi.y {
                for x in lo.x..hi.x {
                    if !existing.contains(&Tzyx::new(t, z, y, x)) {
                        return false;
                    }
                }
            }
        }
    }
    true
}
