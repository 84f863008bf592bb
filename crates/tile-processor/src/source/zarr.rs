//! Source reader over an existing TCZYX `uint16` Zarr array.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;
use zarrs::array::{Array, DataType};
use zarrs::array_subset::ArraySubset;
use zarrs_filesystem::FilesystemStore;

use crate::error::{Result, TileProcessorError};
use crate::store::ZarrChunkStore;
use crate::types::Tczyx;

use super::{SceneRect, SourceInfo, SourceReader};

/// Reads planes from a Zarr array on the local filesystem.
///
/// The array has no notion of scenes; every scene resolves to the full image.
pub struct ZarrSource {
    array: Array<FilesystemStore>,
    shape: Tczyx,
}

impl ZarrSource {
    /// Open the array stored at the root of `path`.
    ///
    /// Returns [`TileProcessorError::NotFound`] only when `path` holds no
    /// array metadata; unreadable metadata is a Zarr error.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !ZarrChunkStore::exists(path) {
            return Err(TileProcessorError::NotFound(format!(
                "no Zarr array at {}",
                path.display()
            )));
        }
        let store = FilesystemStore::new(path)
            .map_err(|e| TileProcessorError::storage_error(format!("{}: {}", path.display(), e)))?;
        let array = Array::open(Arc::new(store), "/")
            .map_err(|e| TileProcessorError::zarr_error(format!("{}: {}", path.display(), e)))?;

        let shape = Tczyx::from_slice(array.shape()).ok_or_else(|| {
            TileProcessorError::zarr_error(format!(
                "expected a 5-dimensional TCZYX array, found shape {:?}",
                array.shape()
            ))
        })?;
        if array.data_type() != &DataType::UInt16 {
            return Err(TileProcessorError::zarr_error(format!(
                "expected uint16 pixels, found {:?}",
                array.data_type()
            )));
        }

        debug!(path = %path.display(), shape = %shape, "Opened Zarr source");
        Ok(Self { array, shape })
    }

    pub fn shape(&self) -> Tczyx {
        self.shape
    }
}

impl SourceReader for ZarrSource {
    fn info(&self) -> Result<SourceInfo> {
        Ok(SourceInfo {
            times: self.shape.t,
            channels: self.shape.c,
            depths: self.shape.z,
            full_rect: SceneRect::new(0, 0, self.shape.x, self.shape.y),
        })
    }

    fn scene_rectangle(&self, _scene: u32) -> Result<Option<SceneRect>> {
        Ok(None)
    }

    fn read_plane(&self, t: u64, z: u64, _scene: u32, roi: SceneRect) -> Result<Vec<u16>> {
        let full = SceneRect::new(0, 0, self.shape.x, self.shape.y);
        let inside = t < self.shape.t
            && z < self.shape.z
            && roi.x_range().is_within(&full.x_range())
            && roi.y_range().is_within(&full.y_range());
        if !inside {
            return Err(TileProcessorError::out_of_bounds(
                format!("t={t} z={z} roi={roi:?}"),
                format!("shape {}", self.shape),
            ));
        }

        let subset = ArraySubset::new_with_start_shape(
            vec![t, 0, z, roi.y as u64, roi.x as u64],
            vec![1, self.shape.c, 1, roi.height, roi.width],
        )
        .map_err(|e| TileProcessorError::source_read(e.to_string()))?;

        self.array
            .retrieve_array_subset_elements::<u16>(&subset)
            .map_err(|e| TileProcessorError::source_read(e.to_string()))
    }
}
