//! Overlapped, resumable tile processing for chunked TCZYX volumes
//!
//! This crate splits a large microscopy volume (time, channel, depth, row,
//! column) into overlapping tiles, runs each tile through an opaque
//! shape-preserving transform, trims the overlap back off and writes the
//! result into a chunked Zarr V3 output array. It provides:
//!
//! - **Tile planning**: overlap-expanded read windows clamped to the volume
//! - **Resumability**: tiles whose output chunks already exist are skipped
//! - **Bounded parallelism**: tiles run on a retrying worker pool
//!
//! # Architecture
//!
//! ```text
//! PipelineConfig + SourceReader + TileTransform + ChunkStore
//!      │
//!      ▼
//! TilePipeline::plan()
//!      │
//!      ├─► Check output shape and chunk alignment (config errors)
//!      │
//!      ├─► plan_tiles(): one overlapped window per grid position
//!      │
//!      └─► already_done(): skip tiles whose chunks all exist
//!               │
//!               ▼
//! TilePipeline::execute()  (TileExecutor, N tiles at a time)
//!      │
//!      └─► per tile: load_tile → apply_transform → trim_window → write_tile
//!               │
//!               ▼
//!          RunSummary { planned, skipped, written, failed }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tile_processor::{IdentityTransform, PipelineConfig, TilePipeline, ZarrChunkStore, ZarrSource};
//!
//! let config = PipelineConfig::from_yaml_file("tiler.yaml")?;
//! let source = ZarrSource::open(&config.source.path)?;
//! let store = ZarrChunkStore::open_or_create(
//!     &config.output.path,
//!     source.shape(),
//!     config.output.chunk_shape,
//!     config.output.fill_value,
//! )?;
//!
//! let pipeline = TilePipeline::new(config, Arc::new(source), Arc::new(IdentityTransform), Arc::new(store));
//! let summary = pipeline.run().await?;
//! ```

pub mod block;
pub mod config;
pub mod error;
pub mod executor;
pub mod loader;
pub mod pipeline;
pub mod plan;
pub mod range;
pub mod resume;
pub mod source;
pub mod store;
pub mod transform;
pub mod trim;
pub mod types;
pub mod writer;

// Re-export commonly used types at crate root
pub use block::TileBlock;
pub use config::{ExecutionConfig, OutputConfig, PipelineConfig, SourceConfig, TilingConfig};
pub use error::{Result, TileProcessorError};
pub use executor::{TaskOutcome, TileExecutor};
pub use loader::{check_window, load_tile};
pub use pipeline::{PlannedTile, RunPlan, RunSummary, TileFailure, TilePipeline};
pub use plan::{grid_dims, nominal_extent, plan_tiles, validate_tiling, ReadWindow, TileSpec, VolumeBounds};
pub use range::{contains, StridedRange};
pub use resume::{already_done, already_done_within, chunk_ratios, parse_chunk_key, ExistingChunks};
pub use source::{scene_bounds, SceneRect, SourceInfo, SourceReader, ZarrSource};
pub use store::{ChunkStore, OutputRegion, ZarrChunkStore};
pub use transform::{apply_transform, FnTransform, IdentityTransform, TileTransform};
pub use trim::{trim, trim_window};
pub use types::{AxisOrigin, Tczyx, Tzyx};
pub use writer::{output_region, write_tile};
