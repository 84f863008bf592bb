//! Plan reporting for `--dry-run`.

use serde::Serialize;

use tile_processor::{
    ChunkStore, OutputRegion, Result, RunPlan, Tczyx, TileBlock, TileProcessorError, Tzyx,
};

/// Stand-in for an output array that has not been created yet.
///
/// Has the shape the array would be created with and no chunks. Writes are
/// refused.
pub struct UnwrittenStore {
    shape: Tczyx,
    chunk_shape: Tczyx,
}

impl UnwrittenStore {
    pub fn new(shape: Tczyx, chunk_shape: Tczyx) -> Self {
        Self { shape, chunk_shape }
    }
}

impl ChunkStore for UnwrittenStore {
    fn shape(&self) -> Tczyx {
        self.shape
    }

    fn chunk_shape(&self) -> Tczyx {
        self.chunk_shape
    }

    fn list_keys(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn write_region(&self, region: &OutputRegion, _block: &TileBlock) -> Result<()> {
        Err(TileProcessorError::storage_error(format!(
            "dry run: refusing to write {}",
            region
        )))
    }
}

/// What a run would do, printed as JSON.
#[derive(Debug, Serialize)]
pub struct PlanReport {
    pub extent: Tczyx,
    pub tile_size: Tzyx,
    pub overlap: Tzyx,
    pub grid: Tzyx,
    pub chunk_ratios: Tzyx,
    pub existing_chunks: usize,
    pub planned: usize,
    pub skipped: usize,
    pub pending: Vec<PendingTile>,
}

#[derive(Debug, Serialize)]
pub struct PendingTile {
    pub index: Tzyx,
    pub window: String,
}

impl From<&RunPlan> for PlanReport {
    fn from(plan: &RunPlan) -> Self {
        Self {
            extent: plan.bounds.extent,
            tile_size: plan.tile_size,
            overlap: plan.overlap,
            grid: plan.grid,
            chunk_ratios: plan.chunk_ratios,
            existing_chunks: plan.existing_chunks,
            planned: plan.tiles.len(),
            skipped: plan.skipped_count(),
            pending: plan
                .pending()
                .map(|spec| PendingTile {
                    index: spec.index,
                    window: spec.window.to_string(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use test_utils::{fixtures, scratch_paths, shapes, InMemorySource};
    use tile_processor::{IdentityTransform, TilePipeline};

    #[test]
    fn test_report_for_fresh_output() {
        let (_dir, source, output) = scratch_paths().unwrap();
        let config = fixtures::small_config(&source, &output);
        let store = UnwrittenStore::new(shapes::SMALL, config.output.chunk_shape);
        let pipeline = TilePipeline::new(
            config,
            Arc::new(InMemorySource::new(shapes::SMALL)),
            Arc::new(IdentityTransform),
            Arc::new(store),
        );

        let report = PlanReport::from(&pipeline.plan().unwrap());
        assert_eq!(report.planned, 8);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.pending.len(), 8);
        assert_eq!(report.pending[0].window, "t=[0, 3) z=[0, 1) y=[0, 5) x=[0, 5)");

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["grid"]["y"], 2);
        assert!(!output.exists());
    }

    #[test]
    fn test_unwritten_store_refuses_writes() {
        let store = UnwrittenStore::new(shapes::SINGLE, shapes::SINGLE);
        let block = TileBlock::zeros(shapes::SINGLE);
        assert!(store
            .write_region(&OutputRegion::new(Tczyx::default(), shapes::SINGLE), &block)
            .is_err());
        assert!(store.existing_chunks().unwrap().is_empty());
    }
}
