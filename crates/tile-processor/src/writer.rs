//! Placement of trimmed tiles in the output array.

use tracing::debug;

use crate::block::TileBlock;
use crate::error::Result;
use crate::store::{ChunkStore, OutputRegion};
use crate::types::Tzyx;

/// Absolute output region of a trimmed tile.
///
/// Each tiled axis starts at `index * tile_size` and spans the trimmed
/// extent; the channel axis spans the whole block.
pub fn output_region(block: &TileBlock, tile_index: Tzyx, tile_size: Tzyx) -> OutputRegion {
    let start = tile_index.zip_with(tile_size, |i, s| i * s).with_channel(0);
    OutputRegion::new(start, block.shape())
}

/// Write a trimmed tile into `store` at its nominal position.
pub fn write_tile(
    store: &dyn ChunkStore,
    block: &TileBlock,
    tile_index: Tzyx,
    tile_size: Tzyx,
) -> Result<OutputRegion> {
    let region = output_region(block, tile_index, tile_size);
    debug!(tile = %tile_index, section = %region, "Saving section");
    store.write_region(&region, block)?;
    Ok(region)
}
