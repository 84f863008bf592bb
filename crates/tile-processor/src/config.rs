//! Configuration for a tiling run.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TileProcessorError};
use crate::types::{Tczyx, Tzyx};

/// Everything a tiling run needs, passed explicitly into the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    pub source: SourceConfig,
    pub tiling: TilingConfig,
    pub output: OutputConfig,
    pub execution: ExecutionConfig,
}

/// Where to read pixels from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SourceConfig {
    /// Path to the source volume.
    pub path: PathBuf,
    /// Scene to read.
    pub scene: u32,
}

/// Processing grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TilingConfig {
    /// Nominal tile size on each tiled axis.
    pub tile_size: Tzyx,
    /// Context margin read on each side of a tile.
    pub overlap: Tzyx,
}

impl Default for TilingConfig {
    fn default() -> Self {
        Self {
            tile_size: Tzyx::new(17, 1501, 512, 484),
            overlap: Tzyx::new(2, 4, 16, 16),
        }
    }
}

/// Output array settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory of the output Zarr array.
    pub path: PathBuf,
    /// Storage chunk shape used when the array is created.
    pub chunk_shape: Tczyx,
    /// Fill value used when the array is created.
    pub fill_value: u16,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            chunk_shape: Tczyx::new(1, 1, 1501, 512, 484),
            fill_value: 0,
        }
    }
}

/// Worker pool settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Tiles processed at once.
    pub concurrency: usize,
    /// Extra attempts for a tile after a retryable failure.
    pub max_retries: u32,
    /// Pause before a retry, in milliseconds.
    pub retry_delay_ms: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            max_retries: 2,
            retry_delay_ms: 1000,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            TileProcessorError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&text)
    }

    /// Parse configuration from YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Override fields from `TILER_*` environment variables.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("TILER_SOURCE_PATH") {
            self.source.path = PathBuf::from(val);
        }

        if let Some(val) = var("TILER_SCENE") {
            if let Ok(scene) = val.parse() {
                self.source.scene = scene;
            }
        }

        if let Some(val) = var("TILER_OUTPUT_PATH") {
            self.output.path = PathBuf::from(val);
        }

        if let Some(val) = var("TILER_CONCURRENCY") {
            if let Ok(n) = val.parse() {
                self.execution.concurrency = n;
            }
        }

        if let Some(val) = var("TILER_MAX_RETRIES") {
            if let Ok(n) = val.parse() {
                self.execution.max_retries = n;
            }
        }
    }

    /// Validate the configuration.
    ///
    /// Checks that only depend on the configuration itself; checks against
    /// the source and output array happen when the run is prepared.
    pub fn validate(&self) -> Result<()> {
        if self.source.path.as_os_str().is_empty() {
            return Err(TileProcessorError::config("source path must be set"));
        }

        if self.output.path.as_os_str().is_empty() {
            return Err(TileProcessorError::config("output path must be set"));
        }

        if self.tiling.tile_size.to_array().contains(&0) {
            return Err(TileProcessorError::config(format!(
                "tile size {} must be > 0 on every axis",
                self.tiling.tile_size
            )));
        }

        if self.output.chunk_shape.to_array().contains(&0) {
            return Err(TileProcessorError::config(format!(
                "output chunk shape {} must be > 0 on every axis",
                self.output.chunk_shape
            )));
        }

        if self.execution.concurrency == 0 {
            return Err(TileProcessorError::config("concurrency must be > 0"));
        }

        Ok(())
    }
}
