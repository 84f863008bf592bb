//! Common test fixtures for tiler tests.
//!
//! Small volumes and matching configurations that exercise short last
//! tiles, multi-chunk tiles and channel handling.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use tile_processor::{
    ChunkStore, OutputRegion, PipelineConfig, Result, Tczyx, TileBlock, Tzyx, ZarrChunkStore,
};

use crate::generators::create_test_volume;

/// Common volume shapes for testing.
pub mod shapes {
    use tile_processor::Tczyx;

    /// Four time points, two channels, a single 8x8 plane.
    pub const SMALL: Tczyx = Tczyx::new(4, 2, 1, 8, 8);

    /// Extents that leave a short last tile on every axis for tile size (2, 2, 4, 4).
    pub const RAGGED: Tczyx = Tczyx::new(3, 2, 5, 10, 9);

    /// A single voxel.
    pub const SINGLE: Tczyx = Tczyx::new(1, 1, 1, 1, 1);
}

/// A configuration for [`shapes::SMALL`] with tile (2, 1, 4, 4), overlap
/// (1, 0, 1, 1) and one storage chunk per 4x4 plane.
pub fn small_config(source: &Path, output: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.source.path = source.to_path_buf();
    config.output.path = output.to_path_buf();
    config.tiling.tile_size = Tzyx::new(2, 1, 4, 4);
    config.tiling.overlap = Tzyx::new(1, 0, 1, 1);
    config.output.chunk_shape = Tczyx::new(1, 1, 1, 4, 4);
    config.execution.concurrency = 4;
    config.execution.retry_delay_ms = 1;
    config
}

/// A configuration for [`shapes::RAGGED`] with storage chunks smaller than
/// the tiles.
pub fn ragged_config(source: &Path, output: &Path) -> PipelineConfig {
    let mut config = small_config(source, output);
    config.tiling.tile_size = Tzyx::new(2, 2, 4, 4);
    config.tiling.overlap = Tzyx::new(1, 1, 2, 1);
    config.output.chunk_shape = Tczyx::new(1, 1, 1, 2, 2);
    config
}

/// A scratch directory with source and output array paths inside it.
///
/// The directory is removed when the returned [`TempDir`] is dropped.
pub fn scratch_paths() -> std::io::Result<(TempDir, PathBuf, PathBuf)> {
    let dir = tempfile::tempdir()?;
    let source = dir.path().join("source.zarr");
    let output = dir.path().join("output.zarr");
    Ok((dir, source, output))
}

/// Write the test pattern for `extent` as a Zarr array at `path`.
pub fn write_pattern_zarr(path: &Path, extent: Tczyx, chunk_shape: Tczyx) -> Result<TileBlock> {
    let volume = create_test_volume(extent);
    let store = ZarrChunkStore::create(path, extent, chunk_shape, 0)?;
    store.write_region(&OutputRegion::new(Tczyx::default(), extent), &volume)?;
    Ok(volume)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configs_validate() {
        let config = small_config(Path::new("/in.zarr"), Path::new("/out.zarr"));
        assert!(config.validate().is_ok());
        let config = ragged_config(Path::new("/in.zarr"), Path::new("/out.zarr"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_write_pattern_zarr() {
        let (_dir, source, _output) = scratch_paths().unwrap();
        let volume = write_pattern_zarr(&source, shapes::SMALL, Tczyx::new(1, 1, 1, 4, 4)).unwrap();
        assert_eq!(volume.shape(), shapes::SMALL);
        assert!(ZarrChunkStore::exists(&source));
    }
}
