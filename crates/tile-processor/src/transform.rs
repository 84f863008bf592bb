//! The per-tile transform seam.
//!
//! Transforms are opaque to the pipeline: they take a raw block and must
//! return a block of the same shape. The pipeline only checks the shape.

use crate::block::TileBlock;
use crate::error::{Result, TileProcessorError};
use crate::types::BLOCK_AXES;

/// A shape-preserving per-tile transform.
pub trait TileTransform: Send + Sync {
    /// Transform `block`, whose axes are named by `axes` (e.g. `"TCZYX"`).
    fn transform(&self, block: TileBlock, axes: &str) -> Result<TileBlock>;

    /// Short name for logs.
    fn name(&self) -> &str {
        "transform"
    }
}

/// Returns the block unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTransform;

impl TileTransform for IdentityTransform {
    fn transform(&self, block: TileBlock, _axes: &str) -> Result<TileBlock> {
        Ok(block)
    }

    fn name(&self) -> &str {
        "identity"
    }
}

/// Adapts a closure into a [`TileTransform`].
pub struct FnTransform<F> {
    name: String,
    f: F,
}

impl<F> FnTransform<F>
where
    F: Fn(TileBlock, &str) -> Result<TileBlock> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> TileTransform for FnTransform<F>
where
    F: Fn(TileBlock, &str) -> Result<TileBlock> + Send + Sync,
{
    fn transform(&self, block: TileBlock, axes: &str) -> Result<TileBlock> {
        (self.f)(block, axes)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Run `transform` on `block` and verify it kept the shape.
pub fn apply_transform(transform: &dyn TileTransform, block: TileBlock) -> Result<TileBlock> {
    let expected = block.shape();
    let out = transform.transform(block, BLOCK_AXES)?;
    if out.shape() != expected {
        return Err(TileProcessorError::transform(format!(
            "{} changed block shape from {} to {}",
            transform.name(),
            expected,
            out.shape()
        )));
    }
    Ok(out)
}
