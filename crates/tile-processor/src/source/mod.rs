//! Source reader trait and implementations.
//!
//! The reader is the only component that knows the source file format. It
//! exposes volume bounds and returns one (time, depth) plane at a time.

mod zarr;

pub use zarr::ZarrSource;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::plan::VolumeBounds;
use crate::range::StridedRange;
use crate::types::{AxisOrigin, Tczyx};

/// Pixel rectangle in absolute source coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneRect {
    pub x: i64,
    pub y: i64,
    pub width: u64,
    pub height: u64,
}

impl SceneRect {
    pub fn new(x: i64, y: i64, width: u64, height: u64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn x_range(&self) -> StridedRange {
        StridedRange::new(self.x, self.x + self.width as i64)
    }

    pub fn y_range(&self) -> StridedRange {
        StridedRange::new(self.y, self.y + self.height as i64)
    }
}

/// Counts along the non-spatial axes plus the full-image rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub times: u64,
    pub channels: u64,
    pub depths: u64,
    pub full_rect: SceneRect,
}

/// Reads rectangular regions from a multi-scene TCZYX source.
///
/// Implementations do blocking I/O; the pipeline calls them from blocking
/// worker threads.
pub trait SourceReader: Send + Sync {
    /// Axis counts and the full-image rectangle.
    fn info(&self) -> Result<SourceInfo>;

    /// The rectangle of `scene`, if the source defines one.
    fn scene_rectangle(&self, scene: u32) -> Result<Option<SceneRect>>;

    /// Read one (time, depth) plane of `roi` from `scene`.
    ///
    /// Returns `channels * roi.height * roi.width` pixels, channel-major then
    /// row-major.
    fn read_plane(&self, t: u64, z: u64, scene: u32, roi: SceneRect) -> Result<Vec<u16>>;
}

/// Bounds of `scene`, falling back to the full-image rectangle.
pub fn scene_bounds(reader: &dyn SourceReader, scene: u32) -> Result<VolumeBounds> {
    let info = reader.info()?;
    let rect = reader.scene_rectangle(scene)?.unwrap_or(info.full_rect);
    Ok(VolumeBounds::new(
        Tczyx::new(info.times, info.channels, info.depths, rect.height, rect.width),
        AxisOrigin::new(0, 0, rect.y, rect.x),
    ))
}
