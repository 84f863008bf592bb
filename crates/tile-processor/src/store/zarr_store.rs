//! Zarr V3 output store on the local filesystem.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};
use zarrs::array::codec::{CodecOptions, CodecOptionsBuilder};
use zarrs::array::{Array, ArrayBuilder, DataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs::storage::ListableStorageTraits;
use zarrs_filesystem::FilesystemStore;

use crate::block::TileBlock;
use crate::error::{Result, TileProcessorError};
use crate::types::{Tczyx, BLOCK_AXES};

use super::{ChunkStore, OutputRegion};

/// Metadata documents that mark an existing array at a store root.
const METADATA_KEYS: [&str; 2] = ["zarr.json", ".zarray"];

/// A `uint16` TCZYX Zarr array stored at the root of a directory.
pub struct ZarrChunkStore {
    store: Arc<FilesystemStore>,
    array: Array<FilesystemStore>,
    path: PathBuf,
    shape: Tczyx,
    chunk_shape: Tczyx,
}

impl ZarrChunkStore {
    /// Open an existing array.
    ///
    /// Returns [`TileProcessorError::NotFound`] when `path` holds no array
    /// metadata, so callers can create one instead.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !Self::exists(path) {
            return Err(TileProcessorError::NotFound(format!(
                "no Zarr array at {}",
                path.display()
            )));
        }

        let store = Arc::new(
            FilesystemStore::new(path).map_err(|e| TileProcessorError::storage_error(e.to_string()))?,
        );
        let array = Array::open(store.clone(), "/")
            .map_err(|e| TileProcessorError::zarr_error(format!("{}: {}", path.display(), e)))?;

        if array.data_type() != &DataType::UInt16 {
            return Err(TileProcessorError::zarr_error(format!(
                "{}: expected uint16 array, found {:?}",
                path.display(),
                array.data_type()
            )));
        }
        let shape = Tczyx::from_slice(array.shape()).ok_or_else(|| {
            TileProcessorError::zarr_error(format!(
                "{}: expected a TCZYX array, found shape {:?}",
                path.display(),
                array.shape()
            ))
        })?;
        let chunk_shape = Self::read_chunk_shape(&array)?;

        debug!(path = %path.display(), shape = %shape, chunks = %chunk_shape, "Opened output array");
        Ok(Self {
            store,
            array,
            path: path.to_path_buf(),
            shape,
            chunk_shape,
        })
    }

    /// Create a new array and store its metadata.
    pub fn create(
        path: impl AsRef<Path>,
        shape: Tczyx,
        chunk_shape: Tczyx,
        fill_value: u16,
    ) -> Result<Self> {
        let path = path.as_ref();
        if chunk_shape.to_array().contains(&0) {
            return Err(TileProcessorError::config(format!(
                "output chunk shape {} must be > 0 on every axis",
                chunk_shape
            )));
        }
        std::fs::create_dir_all(path)?;
        let store = Arc::new(
            FilesystemStore::new(path).map_err(|e| TileProcessorError::storage_error(e.to_string()))?,
        );

        let chunk_grid: zarrs::array::ChunkGrid = chunk_shape
            .to_array()
            .to_vec()
            .try_into()
            .map_err(|e| TileProcessorError::config(format!("{:?}", e)))?;

        let array = ArrayBuilder::new(
            shape.to_array().to_vec(),
            DataType::UInt16,
            chunk_grid,
            FillValue::from(fill_value),
        )
        .attributes({
            let mut attrs = serde_json::Map::new();
            attrs.insert("axes".to_string(), serde_json::json!(BLOCK_AXES));
            attrs
        })
        .build(store.clone(), "/")
        .map_err(|e| TileProcessorError::zarr_error(e.to_string()))?;

        array
            .store_metadata()
            .map_err(|e| TileProcessorError::storage_error(e.to_string()))?;

        info!(path = %path.display(), shape = %shape, chunks = %chunk_shape, "Created output array");
        Ok(Self {
            store,
            array,
            path: path.to_path_buf(),
            shape,
            chunk_shape,
        })
    }

    /// Open the array at `path`, creating it if it does not exist yet.
    pub fn open_or_create(
        path: impl AsRef<Path>,
        shape: Tczyx,
        chunk_shape: Tczyx,
        fill_value: u16,
    ) -> Result<Self> {
        match Self::open(path.as_ref()) {
            Err(TileProcessorError::NotFound(_)) => {
                Self::create(path, shape, chunk_shape, fill_value)
            }
            other => other,
        }
    }

    /// Whether `path` holds array metadata.
    pub fn exists(path: &Path) -> bool {
        METADATA_KEYS.iter().any(|key| path.join(key).is_file())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write options that keep chunks holding only the fill value.
    ///
    /// Resume treats a missing chunk as unwritten, so every written chunk
    /// must reach the store.
    fn write_options() -> CodecOptions {
        CodecOptionsBuilder::new().store_empty_chunks(true).build()
    }

    /// Read back a region, mainly for verification.
    pub fn read_region(&self, region: &OutputRegion) -> Result<TileBlock> {
        let subset = Self::subset(region)?;
        let data = self
            .array
            .retrieve_array_subset_elements::<u16>(&subset)
            .map_err(|e| TileProcessorError::storage_error(e.to_string()))?;
        TileBlock::new(region.shape(), data)
    }

    fn subset(region: &OutputRegion) -> Result<ArraySubset> {
        ArraySubset::new_with_start_shape(
            region.start().to_array().to_vec(),
            region.shape().to_array().to_vec(),
        )
        .map_err(|e| TileProcessorError::zarr_error(e.to_string()))
    }

    fn read_chunk_shape(array: &Array<FilesystemStore>) -> Result<Tczyx> {
        let origin = vec![0u64; array.shape().len()];
        let chunk_shape = array
            .chunk_grid()
            .chunk_shape(&origin, array.shape())
            .map_err(|e| TileProcessorError::zarr_error(e.to_string()))?
            .ok_or_else(|| TileProcessorError::zarr_error("missing chunk shape"))?;
        let dims: Vec<u64> = chunk_shape.iter().map(|c| c.get()).collect();
        Tczyx::from_slice(&dims).ok_or_else(|| {
            TileProcessorError::zarr_error(format!("expected a TCZYX chunk shape, found {:?}", dims))
        })
    }
}

impl ChunkStore for ZarrChunkStore {
    fn shape(&self) -> Tczyx {
        self.shape
    }

    fn chunk_shape(&self) -> Tczyx {
        self.chunk_shape
    }

    fn list_keys(&self) -> Result<Vec<String>> {
        let keys = self
            .store
            .list()
            .map_err(|e| TileProcessorError::storage_error(e.to_string()))?;
        Ok(keys.iter().map(|k| k.as_str().to_string()).collect())
    }

    fn write_region(&self, region: &OutputRegion, block: &TileBlock) -> Result<()> {
        if region.shape() != block.shape() {
            return Err(TileProcessorError::shape_mismatch(region.shape(), block.shape()));
        }
        let subset = Self::subset(region)?;
        self.array
            .store_array_subset_elements_opt::<u16>(&subset, block.data(), &Self::write_options())
            .map_err(|e| TileProcessorError::storage_error(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Tzyx;

    #[test]
    fn test_open_missing_is_not_found() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let err = ZarrChunkStore::open(temp_dir.path().join("absent.zarr")).err().unwrap();
        assert!(matches!(err, TileProcessorError::NotFound(_)));
    }

    #[test]
    fn test_create_then_reopen() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("out.zarr");
        let shape = Tczyx::new(4, 2, 1, 8, 8);
        let chunks = Tczyx::new(1, 1, 1, 4, 4);

        let created = ZarrChunkStore::open_or_create(&path, shape, chunks, 0).expect("create");
        assert!(ZarrChunkStore::exists(&path));
        assert_eq!(created.shape(), shape);

        let reopened = ZarrChunkStore::open_or_create(&path, Tczyx::default(), Tczyx::new(1, 1, 1, 1, 1), 0)
            .expect("reopen");
        assert_eq!(reopened.shape(), shape);
        assert_eq!(reopened.chunk_shape(), chunks);
        assert_eq!(
            reopened.array.attributes().get("axes"),
            Some(&serde_json::json!("TCZYX"))
        );
    }

    #[test]
    fn test_write_region_and_list_chunks() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("out.zarr");
        let store = ZarrChunkStore::create(&path, Tczyx::new(2, 2, 1, 8, 8), Tczyx::new(1, 1, 1, 4, 4), 0)
            .expect("create");

        let region = OutputRegion::new(Tczyx::new(0, 0, 0, 4, 0), Tczyx::new(1, 2, 1, 4, 8));
        let block = TileBlock::from_fn(region.shape(), |p| 1 + (p.c * 100 + p.y * 10 + p.x) as u16);
        store.write_region(&region, &block).expect("write");

        let back = store.read_region(&region).expect("read");
        assert_eq!(back, block);

        let existing = store.existing_chunks().expect("list");
        assert_eq!(existing.len(), 2);
        assert!(existing.contains(&Tzyx::new(0, 0, 1, 0)));
        assert!(existing.contains(&Tzyx::new(0, 0, 1, 1)));
        assert!(!existing.contains(&Tzyx::new(0, 0, 0, 0)));
    }

    #[test]
    fn test_fill_value_region_still_stores_chunks() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store = ZarrChunkStore::create(
            temp_dir.path().join("out.zarr"),
            Tczyx::new(1, 2, 1, 8, 8),
            Tczyx::new(1, 1, 1, 4, 4),
            0,
        )
        .expect("create");

        let region = OutputRegion::new(Tczyx::default(), Tczyx::new(1, 2, 1, 4, 8));
        store.write_region(&region, &TileBlock::zeros(region.shape())).expect("write");

        let keys = store.list_keys().expect("list");
        assert!(keys.iter().any(|k| k == "c/0/1/0/0/1"), "{keys:?}");
        let existing = store.existing_chunks().expect("existing");
        assert_eq!(existing.len(), 2);
        assert!(existing.contains(&Tzyx::new(0, 0, 0, 0)));
        assert!(existing.contains(&Tzyx::new(0, 0, 0, 1)));
    }

    #[test]
    fn test_write_region_shape_mismatch() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store = ZarrChunkStore::create(
            temp_dir.path().join("out.zarr"),
            Tczyx::new(1, 1, 1, 4, 4),
            Tczyx::new(1, 1, 1, 2, 2),
            0,
        )
        .expect("create");
        let region = OutputRegion::new(Tczyx::default(), Tczyx::new(1, 1, 1, 2, 2));
        let block = TileBlock::zeros(Tczyx::new(1, 1, 1, 2, 3));
        assert!(store.write_region(&region, &block).is_err());
    }
}
