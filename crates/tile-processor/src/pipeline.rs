//! The tile pipeline driver.
//!
//! Preparing a run checks the configuration against the source and the
//! output array, plans every tile and decides which ones can be skipped.
//! Executing it pushes each remaining tile through
//! load → transform → trim → write on the worker pool.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, info, instrument};

use crate::block::TileBlock;
use crate::config::PipelineConfig;
use crate::error::{Result, TileProcessorError};
use crate::executor::TileExecutor;
use crate::loader::load_tile;
use crate::plan::{grid_dims, nominal_extent, plan_tiles, validate_tiling, TileSpec, VolumeBounds};
use crate::resume::{already_done_within, chunk_ratios};
use crate::source::{scene_bounds, SourceReader};
use crate::store::{ChunkStore, OutputRegion};
use crate::transform::{apply_transform, TileTransform};
use crate::trim::trim_window;
use crate::types::Tzyx;
use crate::writer::write_tile;

/// A planned tile and whether its output already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlannedTile {
    pub spec: TileSpec,
    pub skip: bool,
}

/// Everything decided before any tile is processed.
#[derive(Debug, Clone, Serialize)]
pub struct RunPlan {
    pub bounds: VolumeBounds,
    pub tile_size: Tzyx,
    pub overlap: Tzyx,
    /// Tiles along each axis.
    pub grid: Tzyx,
    /// Storage chunks per tile along each axis.
    pub chunk_ratios: Tzyx,
    /// Complete storage chunk coordinates found at startup.
    pub existing_chunks: usize,
    pub tiles: Vec<PlannedTile>,
}

impl RunPlan {
    pub fn pending(&self) -> impl Iterator<Item = &TileSpec> {
        self.tiles.iter().filter(|t| !t.skip).map(|t| &t.spec)
    }

    pub fn skipped_count(&self) -> usize {
        self.tiles.iter().filter(|t| t.skip).count()
    }
}

/// A tile that failed after all retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TileFailure {
    pub index: Tzyx,
    pub attempts: u32,
    pub error: String,
}

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub planned: usize,
    pub skipped: usize,
    pub written: usize,
    pub failed: Vec<TileFailure>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Shared, read-only state for the per-tile stages.
struct TileContext {
    reader: Arc<dyn SourceReader>,
    transform: Arc<dyn TileTransform>,
    store: Arc<dyn ChunkStore>,
    bounds: VolumeBounds,
    tile_size: Tzyx,
    scene: u32,
}

/// Drives a tiling run over injected reader, transform and store.
pub struct TilePipeline {
    config: PipelineConfig,
    reader: Arc<dyn SourceReader>,
    transform: Arc<dyn TileTransform>,
    store: Arc<dyn ChunkStore>,
}

impl TilePipeline {
    pub fn new(
        config: PipelineConfig,
        reader: Arc<dyn SourceReader>,
        transform: Arc<dyn TileTransform>,
        store: Arc<dyn ChunkStore>,
    ) -> Self {
        Self {
            config,
            reader,
            transform,
            store,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Check the run's preconditions and plan every tile.
    ///
    /// Fails with a configuration error when the output array does not match
    /// the source extent or the tile grid does not align with its chunks.
    /// Nothing is read from the source beyond its bounds.
    #[instrument(skip(self), fields(scene = self.config.source.scene))]
    pub fn plan(&self) -> Result<RunPlan> {
        self.config.validate()?;
        let tile_size = self.config.tiling.tile_size;
        let overlap = self.config.tiling.overlap;

        let bounds = scene_bounds(self.reader.as_ref(), self.config.source.scene)?;
        if self.store.shape() != bounds.extent {
            return Err(TileProcessorError::config(format!(
                "output array shape {} does not match source extent {}",
                self.store.shape(),
                bounds.extent
            )));
        }

        let extent = bounds.extent.tzyx();
        validate_tiling(extent, tile_size, overlap)?;
        let storage_chunk = self.store.chunk_shape().tzyx();
        let ratios = chunk_ratios(tile_size, storage_chunk)?;
        let grid = grid_dims(extent, tile_size);
        let chunk_grid = grid_dims(extent, storage_chunk);

        let existing = self.store.existing_chunks()?;
        let tiles: Vec<PlannedTile> = plan_tiles(&bounds, tile_size, overlap)?
            .into_iter()
            .map(|spec| PlannedTile {
                spec,
                skip: already_done_within(spec.index, ratios, chunk_grid, &existing),
            })
            .collect();

        info!(
            extent = %bounds.extent,
            grid = %grid,
            tiles = tiles.len(),
            existing_chunks = existing.len(),
            "Planned tiles"
        );

        Ok(RunPlan {
            bounds,
            tile_size,
            overlap,
            grid,
            chunk_ratios: ratios,
            existing_chunks: existing.len(),
            tiles,
        })
    }

    /// Plan and execute the run.
    pub async fn run(&self) -> Result<RunSummary> {
        let plan = self.plan()?;
        self.execute(plan).await
    }

    /// Process every non-skipped tile of `plan` and wait for all of them.
    ///
    /// Per-tile failures are collected in the summary; only errors that
    /// prevent the run from starting are returned as `Err`.
    #[instrument(skip(self, plan), fields(tiles = plan.tiles.len()))]
    pub async fn execute(&self, plan: RunPlan) -> Result<RunSummary> {
        let start = Instant::now();
        let mut summary = RunSummary {
            planned: plan.tiles.len(),
            skipped: plan.skipped_count(),
            ..Default::default()
        };

        let mut pending = Vec::with_capacity(plan.tiles.len() - summary.skipped);
        for tile in &plan.tiles {
            if tile.skip {
                debug!(tile = %tile.spec.index, "Tile already written, skipping");
            } else {
                info!(tile = %tile.spec.index, window = %tile.spec.window, "Added tile");
                pending.push(tile.spec);
            }
        }

        let ctx = Arc::new(TileContext {
            reader: self.reader.clone(),
            transform: self.transform.clone(),
            store: self.store.clone(),
            bounds: plan.bounds,
            tile_size: plan.tile_size,
            scene: self.config.source.scene,
        });

        let executor = TileExecutor::from_config(&self.config.execution);
        let outcomes = executor
            .run(pending, |spec| process_tile(ctx.clone(), spec))
            .await;

        for outcome in outcomes {
            match outcome.result {
                Ok(region) => {
                    debug!(tile = %outcome.key.index, section = %region, "Tile written");
                    summary.written += 1;
                }
                Err(e) => {
                    error!(
                        tile = %outcome.key.index,
                        attempts = outcome.attempts,
                        error = %e,
                        "Tile failed"
                    );
                    summary.failed.push(TileFailure {
                        index: outcome.key.index,
                        attempts: outcome.attempts,
                        error: e.to_string(),
                    });
                }
            }
        }
        summary.failed.sort_by_key(|f| f.index);

        info!(
            duration_ms = start.elapsed().as_millis() as u64,
            planned = summary.planned,
            skipped = summary.skipped,
            written = summary.written,
            failed = summary.failed.len(),
            "Tiling run complete"
        );
        Ok(summary)
    }
}

/// Run one tile through every stage, tagging any error with the tile.
async fn process_tile(ctx: Arc<TileContext>, spec: TileSpec) -> Result<OutputRegion> {
    run_stages(ctx, spec)
        .await
        .map_err(|e| TileProcessorError::TileFailed {
            index: spec.index,
            window: spec.window.to_string(),
            source: Box::new(e),
        })
}

async fn run_stages(ctx: Arc<TileContext>, spec: TileSpec) -> Result<OutputRegion> {
    let stage = ctx.clone();
    let raw = blocking(move || {
        load_tile(stage.reader.as_ref(), &stage.bounds, &spec.window, stage.scene)
    })
    .await?;
    debug!(tile = %spec.index, shape = %raw.shape(), "Loaded tile");

    let stage = ctx.clone();
    let transformed = blocking(move || apply_transform(stage.transform.as_ref(), raw)).await?;
    debug!(tile = %spec.index, "Transformed tile");

    let stage = ctx;
    blocking(move || {
        let trimmed = trim_checked(&stage, &transformed, &spec)?;
        write_tile(stage.store.as_ref(), &trimmed, spec.index, stage.tile_size)
    })
    .await
}

/// Trim a transformed block and verify it covers exactly the tile's nominal region.
fn trim_checked(ctx: &TileContext, block: &TileBlock, spec: &TileSpec) -> Result<TileBlock> {
    let trimmed = trim_window(block, spec, &ctx.bounds, ctx.tile_size)?;
    let expected = nominal_extent(spec.index, ctx.tile_size, ctx.bounds.extent.tzyx())
        .with_channel(ctx.bounds.extent.c);
    if trimmed.shape() != expected {
        return Err(TileProcessorError::shape_mismatch(expected, trimmed.shape()));
    }
    Ok(trimmed)
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resume::ExistingChunks;
    use crate::source::{SceneRect, SourceInfo};
    use crate::transform::{FnTransform, IdentityTransform};
    use crate::types::{Tczyx, Tzyx};
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Mutex;

    fn voxel(t: u64, c: u64, z: u64, y: i64, x: i64) -> u16 {
        (1 + t * 10_000 + c * 1_000 + z * 100 + (y as u64) * 10 + x as u64) as u16
    }

    struct GridSource {
        extent: Tczyx,
    }

    impl SourceReader for GridSource {
        fn info(&self) -> Result<SourceInfo> {
            Ok(SourceInfo {
                times: self.extent.t,
                channels: self.extent.c,
                depths: self.extent.z,
                full_rect: SceneRect::new(0, 0, self.extent.x, self.extent.y),
            })
        }

        fn scene_rectangle(&self, _scene: u32) -> Result<Option<SceneRect>> {
            Ok(None)
        }

        fn read_plane(&self, t: u64, z: u64, _scene: u32, roi: SceneRect) -> Result<Vec<u16>> {
            let mut out = Vec::new();
            for c in 0..self.extent.c {
                for y in roi.y_range().start()..roi.y_range().stop() {
                    for x in roi.x_range().start()..roi.x_range().stop() {
                        out.push(voxel(t, c, z, y, x));
                    }
                }
            }
            Ok(out)
        }
    }

    /// Records every written region in memory.
    struct RecordingStore {
        shape: Tczyx,
        chunk_shape: Tczyx,
        keys: Vec<String>,
        written: Mutex<HashMap<Tczyx, TileBlock>>,
    }

    impl RecordingStore {
        fn new(shape: Tczyx, chunk_shape: Tczyx) -> Self {
            Self {
                shape,
                chunk_shape,
                keys: Vec::new(),
                written: Mutex::new(HashMap::new()),
            }
        }
    }

    impl ChunkStore for RecordingStore {
        fn shape(&self) -> Tczyx {
            self.shape
        }

        fn chunk_shape(&self) -> Tczyx {
            self.chunk_shape
        }

        fn list_keys(&self) -> Result<Vec<String>> {
            Ok(self.keys.clone())
        }

        fn write_region(&self, region: &OutputRegion, block: &TileBlock) -> Result<()> {
            self.written.lock().unwrap().insert(region.start(), block.clone());
            Ok(())
        }
    }

    const EXTENT: Tczyx = Tczyx::new(4, 2, 1, 8, 8);

    fn config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.source.path = PathBuf::from("memory://grid");
        config.output.path = PathBuf::from("memory://out");
        config.tiling.tile_size = Tzyx::new(2, 1, 4, 4);
        config.tiling.overlap = Tzyx::new(1, 0, 1, 1);
        config.execution.concurrency = 3;
        config.execution.retry_delay_ms = 1;
        config
    }

    fn pipeline(store: Arc<RecordingStore>, transform: Arc<dyn TileTransform>) -> TilePipeline {
        TilePipeline::new(config(), Arc::new(GridSource { extent: EXTENT }), transform, store)
    }

    #[test]
    fn test_plan_small_volume() {
        let store = Arc::new(RecordingStore::new(EXTENT, Tczyx::new(1, 1, 1, 4, 4)));
        let plan = pipeline(store, Arc::new(IdentityTransform)).plan().unwrap();
        assert_eq!(plan.grid, Tzyx::new(2, 1, 2, 2));
        assert_eq!(plan.chunk_ratios, Tzyx::new(2, 1, 1, 1));
        assert_eq!(plan.tiles.len(), 8);
        assert_eq!(plan.skipped_count(), 0);
    }

    #[test]
    fn test_plan_marks_complete_tiles_skipped() {
        let mut store = RecordingStore::new(EXTENT, Tczyx::new(1, 1, 1, 4, 4));
        // Tile (0, 0, 0, 0) spans time chunks 0 and 1; both channels written.
        store.keys = ["c/0/0/0/0/0", "c/0/1/0/0/0", "c/1/0/0/0/0", "c/1/1/0/0/0", "c/0/0/0/1/1"]
            .iter()
            .map(|k| k.to_string())
            .collect();
        let plan = pipeline(Arc::new(store), Arc::new(IdentityTransform)).plan().unwrap();
        let skipped: Vec<Tzyx> = plan.tiles.iter().filter(|t| t.skip).map(|t| t.spec.index).collect();
        assert_eq!(skipped, vec![Tzyx::new(0, 0, 0, 0)]);
        assert_eq!(plan.pending().count(), 7);
    }

    #[test]
    fn test_plan_rejects_misaligned_chunks() {
        let store = Arc::new(RecordingStore::new(EXTENT, Tczyx::new(1, 1, 1, 3, 4)));
        let err = pipeline(store, Arc::new(IdentityTransform)).plan().unwrap_err();
        assert!(matches!(err, TileProcessorError::Config(_)));
    }

    #[test]
    fn test_plan_rejects_shape_mismatch() {
        let store = Arc::new(RecordingStore::new(Tczyx::new(4, 2, 1, 8, 9), Tczyx::new(1, 1, 1, 4, 4)));
        let err = pipeline(store, Arc::new(IdentityTransform)).plan().unwrap_err();
        assert!(matches!(err, TileProcessorError::Config(_)));
    }

    #[tokio::test]
    async fn test_run_writes_trimmed_tiles() {
        let store = Arc::new(RecordingStore::new(EXTENT, Tczyx::new(1, 1, 1, 4, 4)));
        let summary = pipeline(store.clone(), Arc::new(IdentityTransform)).run().await.unwrap();
        assert_eq!(summary.planned, 8);
        assert_eq!(summary.written, 8);
        assert!(summary.is_success());

        let written = store.written.lock().unwrap();
        let first = &written[&Tczyx::new(0, 0, 0, 0, 0)];
        assert_eq!(first.shape(), Tczyx::new(2, 2, 1, 4, 4));
        // Trimmed block starts at the tile's nominal origin, not the overlap.
        assert_eq!(first.get(Tczyx::default()), Some(voxel(0, 0, 0, 0, 0)));

        let last = &written[&Tczyx::new(2, 0, 0, 4, 4)];
        assert_eq!(last.get(Tczyx::new(1, 1, 0, 3, 3)), Some(voxel(3, 1, 0, 7, 7)));
    }

    #[tokio::test]
    async fn test_failed_tile_reported_with_index_and_window() {
        let store = Arc::new(RecordingStore::new(EXTENT, Tczyx::new(1, 1, 1, 4, 4)));
        // Only the tile whose block starts at y=3 and x=3 (index y=1, x=1) fails.
        let transform = FnTransform::new("picky", |block: TileBlock, _axes: &str| {
            if block.shape().y == 5 && block.shape().x == 5 && block.data()[0] == voxel(0, 0, 0, 3, 3) {
                Err(TileProcessorError::out_of_bounds("y", "x"))
            } else {
                Ok(block)
            }
        });
        let summary = pipeline(store.clone(), Arc::new(transform)).run().await.unwrap();
        assert_eq!(summary.written, 7);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].index, Tzyx::new(0, 0, 1, 1));
        assert_eq!(summary.failed[0].attempts, 1);
        let message = &summary.failed[0].error;
        assert!(message.contains("(0, 0, 1, 1)"), "{message}");
        assert!(message.contains("t=[0, 3) z=[0, 1) y=[3, 8) x=[3, 8)"), "{message}");
        assert_eq!(store.written.lock().unwrap().len(), 7);
    }

    #[tokio::test]
    async fn test_shape_changing_transform_fails_tile() {
        let store = Arc::new(RecordingStore::new(EXTENT, Tczyx::new(1, 1, 1, 4, 4)));
        let transform = FnTransform::new("shrink", |block: TileBlock, _axes: &str| {
            let mut shape = block.shape();
            shape.x -= 1;
            Ok(TileBlock::zeros(shape))
        });
        let summary = pipeline(store, Arc::new(transform)).run().await.unwrap();
        assert_eq!(summary.written, 0);
        assert_eq!(summary.failed.len(), 8);
    }

    #[test]
    fn test_existing_chunks_default_needs_every_channel() {
        let existing = ExistingChunks::from_keys(["c/0/0/0/0/0"], 2);
        assert!(existing.is_empty());
    }
}
