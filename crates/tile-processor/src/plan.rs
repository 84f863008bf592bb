//! Tile planning: grid dimensions and overlapped read windows.
//!
//! Tiles are laid out on a regular grid starting at the volume origin. Each
//! tile's read window is its nominal region grown by the overlap on both
//! sides and then clamped to the volume; windows are never padded.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, TileProcessorError};
use crate::range::StridedRange;
use crate::types::{AxisOrigin, Tczyx, Tzyx, TILED_AXES};

/// Extent and origin of the source volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeBounds {
    /// Size along each axis, channel included.
    pub extent: Tczyx,
    /// Absolute coordinate of the first voxel on each tiled axis.
    pub origin: AxisOrigin,
}

impl VolumeBounds {
    pub fn new(extent: Tczyx, origin: AxisOrigin) -> Self {
        Self { extent, origin }
    }

    /// Valid absolute coordinates on each tiled axis, in TZYX order.
    pub fn valid_ranges(&self) -> [StridedRange; 4] {
        let extent = self.extent.tzyx().to_array();
        let origin = self.origin.to_array();
        std::array::from_fn(|i| StridedRange::new(origin[i], origin[i] + extent[i] as i64))
    }
}

/// Per-axis read window of a tile. The channel axis is always read whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReadWindow {
    pub t: StridedRange,
    pub z: StridedRange,
    pub y: StridedRange,
    pub x: StridedRange,
}

impl ReadWindow {
    pub fn to_array(&self) -> [StridedRange; 4] {
        [self.t, self.z, self.y, self.x]
    }

    /// Shape of the raw block this window produces for `channels` channels.
    pub fn block_shape(&self, channels: u64) -> Tczyx {
        Tczyx::new(
            self.t.len(),
            channels,
            self.z.len(),
            self.y.len(),
            self.x.len(),
        )
    }
}

impl fmt::Display for ReadWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "t={} z={} y={} x={}",
            self.t, self.z, self.y, self.x
        )
    }
}

/// A tile's grid position and the window to read for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileSpec {
    pub index: Tzyx,
    pub window: ReadWindow,
}

impl fmt::Display for TileSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tile {} window {}", self.index, self.window)
    }
}

/// Number of tiles along each axis: `ceil(extent / tile)`.
pub fn grid_dims(extent: Tzyx, tile_size: Tzyx) -> Tzyx {
    extent.zip_with(tile_size, |e, s| e.div_ceil(s))
}

/// Size of the nominal (non-overlapped) region of the tile at `index`.
///
/// Equals the tile size except for a short last tile, which gets the remainder.
pub fn nominal_extent(index: Tzyx, tile_size: Tzyx, extent: Tzyx) -> Tzyx {
    let start = index.zip_with(tile_size, |i, s| i * s);
    let remaining = extent.zip_with(start, u64::saturating_sub);
    remaining.zip_with(tile_size, u64::min)
}

/// Check that the tile sizes describe a usable grid over `extent`.
///
/// Overlaps are unrestricted: windows are clamped to the volume and the
/// pipeline trims each side by the overlap actually read.
pub fn validate_tiling(extent: Tzyx, tile_size: Tzyx, overlap: Tzyx) -> Result<()> {
    if let Some(axis) = tile_size.to_array().iter().position(|&s| s == 0) {
        return Err(TileProcessorError::config(format!(
            "tile size on axis {} must be > 0",
            TILED_AXES[axis]
        )));
    }
    debug!(extent = %extent, tile_size = %tile_size, overlap = %overlap, "Tiling accepted");
    Ok(())
}

/// Overlapped windows along one axis, one per tile position.
fn axis_windows(origin: i64, extent: u64, tile: u64, overlap: u64) -> Vec<StridedRange> {
    let end = origin + extent as i64;
    let (tile, overlap) = (tile as i64, overlap as i64);
    (origin..end)
        .step_by(tile as usize)
        .map(|start| {
            StridedRange::new(
                (start - overlap).max(origin),
                end.min(start + tile + overlap),
            )
        })
        .collect()
}

/// Enumerate every tile position and its clamped, overlap-expanded window.
///
/// Tiles are produced with T varying slowest and X fastest.
pub fn plan_tiles(bounds: &VolumeBounds, tile_size: Tzyx, overlap: Tzyx) -> Result<Vec<TileSpec>> {
    if let Some(axis) = tile_size.to_array().iter().position(|&s| s == 0) {
        return Err(TileProcessorError::config(format!(
            "tile size on axis {} must be > 0",
            TILED_AXES[axis]
        )));
    }

    let extent = bounds.extent.tzyx().to_array();
    let origin = bounds.origin.to_array();
    let tile = tile_size.to_array();
    let overlap = overlap.to_array();
    let windows: [Vec<StridedRange>; 4] =
        std::array::from_fn(|i| axis_windows(origin[i], extent[i], tile[i], overlap[i]));
    let [tw, zw, yw, xw] = &windows;

    let mut tiles = Vec::with_capacity(tw.len() * zw.len() * yw.len() * xw.len());
    for (ti, t) in tw.iter().enumerate() {
        for (zi, z) in zw.iter().enumerate() {
            for (yi, y) in yw.iter().enumerate() {
                for (xi, x) in xw.iter().enumerate() {
                    tiles.push(TileSpec {
                        index: Tzyx::new(ti as u64, zi as u64, yi as u64, xi as u64),
                        window: ReadWindow {
                            t: *t,
                            z: *z,
                            y: *y,
                            x: *x,
                        },
                    });
                }
            }
        }
    }
    Ok(tiles)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_bounds() -> VolumeBounds {
        VolumeBounds::new(Tczyx::new(4, 2, 1, 8, 8), AxisOrigin::default())
    }

    #[test]
    fn test_grid_dims_ceiling() {
        assert_eq!(
            grid_dims(Tzyx::new(4, 1, 8, 10), Tzyx::new(2, 1, 4, 4)),
            Tzyx::new(2, 1, 2, 3)
        );
    }

    #[test]
    fn test_small_volume_plan() {
        let tiles = plan_tiles(&small_bounds(), Tzyx::new(2, 1, 4, 4), Tzyx::new(1, 0, 1, 1)).unwrap();
        // 2 time positions x a 1x2x2 spatial grid.
        assert_eq!(tiles.len(), 8);

        let first = tiles[0];
        assert_eq!(first.index, Tzyx::new(0, 0, 0, 0));
        assert_eq!(first.window.t, StridedRange::new(0, 3));
        assert_eq!(first.window.z, StridedRange::new(0, 1));
        assert_eq!(first.window.y, StridedRange::new(0, 5));
        assert_eq!(first.window.x, StridedRange::new(0, 5));

        let last = tiles[7];
        assert_eq!(last.index, Tzyx::new(1, 0, 1, 1));
        assert_eq!(last.window.t, StridedRange::new(1, 4));
        assert_eq!(last.window.y, StridedRange::new(3, 8));
        assert_eq!(last.window.x, StridedRange::new(3, 8));
    }

    #[test]
    fn test_windows_stay_inside_offset_bounds() {
        let bounds = VolumeBounds::new(Tczyx::new(5, 3, 7, 37, 29), AxisOrigin::new(0, 0, -12, 140));
        let tiles = plan_tiles(&bounds, Tzyx::new(2, 3, 8, 6), Tzyx::new(1, 2, 3, 4)).unwrap();
        let valid = bounds.valid_ranges();
        assert_eq!(tiles.len(), 3 * 3 * 5 * 5);
        for tile in &tiles {
            for (w, v) in tile.window.to_array().iter().zip(valid.iter()) {
                assert!(w.is_within(v), "{} not within {}", w, v);
                assert!(!w.is_empty());
            }
        }
        assert_eq!(tiles[0].window.y.start(), -12);
        assert_eq!(tiles[0].window.x.start(), 140);
    }

    #[test]
    fn test_zero_tile_size_rejected() {
        assert!(plan_tiles(&small_bounds(), Tzyx::new(2, 0, 4, 4), Tzyx::splat(0)).is_err());
    }

    #[test]
    fn test_nominal_extent_short_last_tile() {
        let extent = Tzyx::new(4, 1, 10, 8);
        let tile = Tzyx::new(2, 1, 4, 4);
        assert_eq!(nominal_extent(Tzyx::new(0, 0, 0, 0), tile, extent), Tzyx::new(2, 1, 4, 4));
        assert_eq!(nominal_extent(Tzyx::new(1, 0, 2, 1), tile, extent), Tzyx::new(2, 1, 2, 4));
    }

    #[test]
    fn test_validate_tiling() {
        let extent = Tzyx::new(4, 1, 10, 8);
        assert!(validate_tiling(extent, Tzyx::new(2, 1, 4, 4), Tzyx::new(1, 0, 2, 1)).is_ok());
        // Overlap wider than the tile and than the short last Y tile.
        assert!(validate_tiling(extent, Tzyx::new(2, 1, 4, 4), Tzyx::new(3, 0, 3, 1)).is_ok());
        assert!(validate_tiling(Tzyx::new(35, 1, 8, 8), Tzyx::new(17, 1, 8, 8), Tzyx::new(2, 0, 0, 0)).is_ok());
        assert!(validate_tiling(extent, Tzyx::new(2, 0, 4, 4), Tzyx::splat(0)).is_err());
    }
}
