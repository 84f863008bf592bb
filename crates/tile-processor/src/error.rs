//! Error types for tile processing.

use thiserror::Error;

use crate::types::Tzyx;

/// Errors that can occur while planning, processing or writing tiles.
#[derive(Error, Debug)]
pub enum TileProcessorError {
    /// Invalid configuration, detected before any tile work is scheduled.
    #[error("configuration error: {0}")]
    Config(String),

    /// A read window is not contained in the source's valid range.
    #[error("range out of bounds: requested {requested} is outside valid {valid}")]
    OutOfBounds { requested: String, valid: String },

    /// Failed to read pixels from the source.
    #[error("failed to read source: {0}")]
    SourceRead(String),

    /// The per-tile transform failed.
    #[error("transform failed: {0}")]
    Transform(String),

    /// A block does not have the shape a stage expects.
    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    /// Zarr format error.
    #[error("Zarr format error: {0}")]
    ZarrError(String),

    /// Storage/IO error.
    #[error("storage error: {0}")]
    Storage(String),

    /// The output array or source does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A blocking stage panicked or was cancelled.
    #[error("tile task did not complete: {0}")]
    Join(String),

    /// A single tile's pipeline failed.
    #[error("tile {index} (window {window}) failed: {source}")]
    TileFailed {
        index: Tzyx,
        window: String,
        #[source]
        source: Box<TileProcessorError>,
    },
}

impl TileProcessorError {
    /// Create a Config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an OutOfBounds error.
    pub fn out_of_bounds(requested: impl Into<String>, valid: impl Into<String>) -> Self {
        Self::OutOfBounds {
            requested: requested.into(),
            valid: valid.into(),
        }
    }

    /// Create a SourceRead error.
    pub fn source_read(msg: impl Into<String>) -> Self {
        Self::SourceRead(msg.into())
    }

    /// Create a Transform error.
    pub fn transform(msg: impl Into<String>) -> Self {
        Self::Transform(msg.into())
    }

    /// Create a ShapeMismatch error.
    pub fn shape_mismatch(expected: impl ToString, actual: impl ToString) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Create a ZarrError.
    pub fn zarr_error(msg: impl Into<String>) -> Self {
        Self::ZarrError(msg.into())
    }

    /// Create a Storage error.
    pub fn storage_error(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Whether retrying the same tile could succeed.
    ///
    /// Configuration, bounds and shape errors are deterministic; everything
    /// else (I/O, transform, task failures) is handed back to the executor.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Config(_) | Self::OutOfBounds { .. } | Self::ShapeMismatch { .. } => false,
            Self::TileFailed { source, .. } => source.is_retryable(),
            _ => true,
        }
    }
}

impl From<std::io::Error> for TileProcessorError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_yaml::Error> for TileProcessorError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<tokio::task::JoinError> for TileProcessorError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Join(err.to_string())
    }
}

/// Result type for tile processor operations.
pub type Result<T> = std::result::Result<T, TileProcessorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(!TileProcessorError::config("bad").is_retryable());
        assert!(!TileProcessorError::out_of_bounds("[0, 5)", "[0, 4)").is_retryable());
        assert!(TileProcessorError::storage_error("disk full").is_retryable());
        assert!(TileProcessorError::transform("oom").is_retryable());
    }

    #[test]
    fn test_tile_failed_delegates_to_source() {
        let err = TileProcessorError::TileFailed {
            index: Tzyx::new(0, 0, 1, 2),
            window: "t=[0, 3) z=[0, 1) y=[3, 9) x=[7, 13)".to_string(),
            source: Box::new(TileProcessorError::out_of_bounds("a", "b")),
        };
        assert!(!err.is_retryable());
        let msg = err.to_string();
        assert!(msg.contains("(0, 0, 1, 2)"));
        assert!(msg.contains("y=[3, 9)"));
    }
}
