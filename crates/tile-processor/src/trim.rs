//! Removal of overlap padding from processed tiles.

use std::ops::Range;

use crate::block::TileBlock;
use crate::error::{Result, TileProcessorError};
use crate::plan::{nominal_extent, TileSpec, VolumeBounds};
use crate::types::{Tzyx, TILED_AXES};

/// Slice bounds that strip the overlap from one axis of length `len`.
///
/// Tiles on the leading edge keep their low side, tiles on the trailing edge
/// keep their high side; they never read any overlap there.
fn axis_trim(len: u64, index: u64, grid: u64, overlap: u64) -> Option<Range<u64>> {
    let lo = if index > 0 { overlap } else { 0 };
    let hi = if overlap > 0 && index + 1 < grid {
        len.checked_sub(overlap)?
    } else {
        len
    };
    (lo <= hi).then_some(lo..hi)
}

/// Trim the overlap off a processed tile.
///
/// `tile_index` is the tile's position on the processing grid and
/// `grid_dims` the number of tiles per axis. The channel axis is passed
/// through untouched.
pub fn trim(block: &TileBlock, tile_index: Tzyx, grid_dims: Tzyx, overlaps: Tzyx) -> Result<TileBlock> {
    let shape = block.shape();
    let lens = shape.tzyx().to_array();
    let index = tile_index.to_array();
    let grid = grid_dims.to_array();
    let overlap = overlaps.to_array();

    let mut axes: [Range<u64>; 4] = Default::default();
    for i in 0..4 {
        axes[i] = axis_trim(lens[i], index[i], grid[i], overlap[i]).ok_or_else(|| {
            TileProcessorError::shape_mismatch(
                format!(
                    "axis {} of at least {} voxels to trim overlap {}",
                    TILED_AXES[i],
                    2 * overlap[i],
                    overlap[i]
                ),
                lens[i],
            )
        })?;
    }

    let [t, z, y, x] = axes;
    block.slice(&[t, 0..shape.c, z, y, x])
}

/// Trim a processed tile back to its nominal region using the window it was
/// read with.
///
/// Each side loses exactly the overlap that was actually read there, so the
/// result covers the nominal region even when a neighbouring short tile
/// clamped the window to less than the configured overlap.
pub fn trim_window(block: &TileBlock, spec: &TileSpec, bounds: &VolumeBounds, tile_size: Tzyx) -> Result<TileBlock> {
    let shape = block.shape();
    let lens = shape.tzyx().to_array();
    let index = spec.index.to_array();
    let tile = tile_size.to_array();
    let origin = bounds.origin.to_array();
    let window = spec.window.to_array();
    let nominal = nominal_extent(spec.index, tile_size, bounds.extent.tzyx()).to_array();

    let mut axes: [Range<u64>; 4] = Default::default();
    for i in 0..4 {
        let start = origin[i] + (index[i] * tile[i]) as i64;
        let lo = (start - window[i].start()).max(0) as u64;
        let hi = lo + nominal[i];
        if hi > lens[i] {
            return Err(TileProcessorError::shape_mismatch(
                format!("axis {} of at least {} voxels", TILED_AXES[i], hi),
                lens[i],
            ));
        }
        axes[i] = lo..hi;
    }

    let [t, z, y, x] = axes;
    block.slice(&[t, 0..shape.c, z, y, x])
}
