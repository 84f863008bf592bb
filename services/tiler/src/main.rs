//! Overlapped tile processing service.
//!
//! Reads a TCZYX volume, runs every tile through the configured transform
//! and writes the trimmed result into a Zarr V3 array. Re-running against the
//! same output only processes tiles that are not on disk yet.

mod dry_run;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use tile_processor::{
    scene_bounds, ChunkStore, IdentityTransform, PipelineConfig, TilePipeline, ZarrChunkStore,
    ZarrSource,
};

use dry_run::{PlanReport, UnwrittenStore};

#[derive(Parser, Debug)]
#[command(name = "tiler")]
#[command(about = "Resumable overlapped tile processing into Zarr arrays")]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "TILER_CONFIG")]
    config: Option<PathBuf>,

    /// Source volume (overrides the configuration)
    #[arg(short, long)]
    source: Option<PathBuf>,

    /// Output Zarr array (overrides the configuration)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Scene to process
    #[arg(long)]
    scene: Option<u32>,

    /// Tiles processed at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Print the tile plan and exit without processing
    #[arg(long)]
    dry_run: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

impl Args {
    /// Build the run configuration: file, then environment, then flags.
    fn load_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_yaml_file(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
            None => PipelineConfig::default(),
        };
        config.apply_env_overrides();
        self.apply_overrides(&mut config);
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut PipelineConfig) {
        if let Some(source) = &self.source {
            config.source.path = source.clone();
        }
        if let Some(output) = &self.output {
            config.output.path = output.clone();
        }
        if let Some(scene) = self.scene {
            config.source.scene = scene;
        }
        if let Some(concurrency) = self.concurrency {
            config.execution.concurrency = concurrency;
        }
    }
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let builder = FmtSubscriber::builder()
        .with_max_level(parse_level(&args.log_level))
        .with_target(true)
        .with_thread_ids(true);
    if args.json_logs {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }

    info!("Starting tiler");

    let config = args.load_config()?;
    info!(
        source = %config.source.path.display(),
        output = %config.output.path.display(),
        scene = config.source.scene,
        tile_size = %config.tiling.tile_size,
        overlap = %config.tiling.overlap,
        "Loaded configuration"
    );

    let source = ZarrSource::open(&config.source.path)
        .with_context(|| format!("Failed to open source {}", config.source.path.display()))?;
    let bounds = scene_bounds(&source, config.source.scene)?;

    if args.dry_run {
        let store: Arc<dyn ChunkStore> = if ZarrChunkStore::exists(&config.output.path) {
            Arc::new(ZarrChunkStore::open(&config.output.path)?)
        } else {
            Arc::new(UnwrittenStore::new(bounds.extent, config.output.chunk_shape))
        };
        let pipeline = TilePipeline::new(config, Arc::new(source), Arc::new(IdentityTransform), store);
        let plan = pipeline.plan().context("Failed to plan tiles")?;
        println!("{}", serde_json::to_string_pretty(&PlanReport::from(&plan))?);
        return Ok(());
    }

    let store = ZarrChunkStore::open_or_create(
        &config.output.path,
        bounds.extent,
        config.output.chunk_shape,
        config.output.fill_value,
    )
    .with_context(|| format!("Failed to open output {}", config.output.path.display()))?;

    let pipeline = TilePipeline::new(
        config,
        Arc::new(source),
        Arc::new(IdentityTransform),
        Arc::new(store),
    );
    let summary = pipeline.run().await.context("Tiling run failed")?;

    info!(
        planned = summary.planned,
        skipped = summary.skipped,
        written = summary.written,
        failed = summary.failed.len(),
        "Tiling finished"
    );

    if !summary.is_success() {
        for failure in &summary.failed {
            eprintln!("tile {}: {}", failure.index, failure.error);
        }
        bail!(
            "{} of {} tiles failed; re-run to retry them",
            summary.failed.len(),
            summary.planned - summary.skipped
        );
    }

    Ok(())
}
