//! Headless forecast player.
//!
//! Loads a batched forecast dataset (cache first, then network), animates
//! its timesteps with cross-fades and writes every presented frame as a PNG:
//! - Batch 1 blocks startup; the rest stream in the background
//! - Playback starts as soon as batch 1 is merged
//! - Fetched batches are written through to a SQLite cache

mod config;
mod presenter;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use forecast_common::BoundingBox;
use ingestion::{BatchIngestionPipeline, HttpBatchSource, LoadState};
use playback::AnimationController;
use projection::Viewport;
use renderer::GridRasterizer;
use storage::{BatchStore, PersistentBatchCache};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use config::PlayerConfig;
use presenter::PngPresenter;

#[derive(Parser, Debug)]
#[command(name = "forecast-player")]
#[command(about = "Animate a batched forecast dataset into PNG frames")]
struct Args {
    /// YAML configuration file
    #[arg(short, long, env = "PLAYER_CONFIG")]
    config: Option<PathBuf>,

    /// Forecast API base URL (overrides config)
    #[arg(long, env = "FORECAST_API_URL")]
    base_url: Option<String>,

    /// Variable to display (overrides config)
    #[arg(long)]
    variable: Option<String>,

    /// Viewport as "min_lon,min_lat,max_lon,max_lat" (overrides config)
    #[arg(long)]
    bbox: Option<String>,

    /// Zoom level (overrides config)
    #[arg(long)]
    zoom: Option<f64>,

    /// Directory for rendered frames (overrides config)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Batch cache database (overrides config)
    #[arg(long, env = "BATCH_CACHE_PATH")]
    cache_path: Option<PathBuf>,

    /// Maximum concurrent background fetches (overrides config)
    #[arg(long)]
    max_in_flight: Option<usize>,

    /// Stop after this many frames have been written
    #[arg(long)]
    frames: Option<u64>,

    /// Attempts at loading the first batch before giving up
    #[arg(long, default_value = "3")]
    init_attempts: u32,

    /// Seconds between first-batch attempts
    #[arg(long, default_value = "5")]
    retry_delay: u64,

    /// Drop all cached batches before starting
    #[arg(long)]
    clear_cache: bool,

    /// Log level (RUST_LOG takes precedence)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

impl Args {
    fn apply(&self, config: &mut PlayerConfig) -> Result<()> {
        if let Some(url) = &self.base_url {
            config.pipeline.base_url = url.clone();
        }
        if let Some(variable) = &self.variable {
            config.view.variable = variable.clone();
        }
        if let Some(bbox) = &self.bbox {
            let bounds = BoundingBox::from_bbox_string(bbox).context("Invalid --bbox")?;
            config.view.bbox = [bounds.min_x, bounds.min_y, bounds.max_x, bounds.max_y];
        }
        if let Some(zoom) = self.zoom {
            config.view.zoom = zoom;
        }
        if let Some(dir) = &self.output_dir {
            config.output.dir = dir.clone();
        }
        if let Some(path) = &self.cache_path {
            config.cache.path = path.clone();
        }
        if let Some(limit) = self.max_in_flight {
            config.pipeline.max_in_flight = limit;
        }
        Ok(())
    }
}

fn init_tracing(args: &Args) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true);

    if args.json_logs {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args)?;

    let mut config = PlayerConfig::load(args.config.as_deref())?;
    args.apply(&mut config)?;

    info!(
        base_url = %config.pipeline.base_url,
        variable = %config.view.variable,
        "Starting forecast player"
    );

    // Open the cache and sweep expired entries
    let cache = PersistentBatchCache::open(&config.cache.to_cache_config())
        .await
        .context("Failed to open batch cache")?;
    if args.clear_cache {
        cache.clear().await.context("Failed to clear batch cache")?;
        info!("Cleared batch cache");
    }
    match cache.prune_expired().await {
        Ok(0) => {}
        Ok(removed) => info!(removed, "Pruned expired cache entries"),
        Err(e) => warn!(error = %e, "Failed to prune batch cache"),
    }
    let cache: Arc<dyn BatchStore> = Arc::new(cache);

    let source = HttpBatchSource::new(&config.pipeline).context("Failed to build HTTP client")?;
    let mut pipeline =
        BatchIngestionPipeline::spawn(config.pipeline.clone(), cache, Arc::new(source));

    let viewport = Viewport::new(config.view.bounds(), config.view.zoom)
        .context("Invalid viewport configuration")?;
    let presenter = PngPresenter::new(&config.output.dir, config.output.write_transitions)?;
    let mut controller = AnimationController::new(
        pipeline.reader(),
        GridRasterizer::new(config.raster.clone()),
        presenter,
        config.playback.clone(),
        config.view.variable.clone(),
    );

    load_first_batch(&mut pipeline, args.init_attempts, args.retry_delay).await?;

    let variables = pipeline.reader().variables();
    if !variables.contains(&config.view.variable) {
        warn!(
            variable = %config.view.variable,
            available = ?variables,
            "Selected variable is not in the dataset"
        );
    }

    controller.set_viewport(viewport, Instant::now());
    controller.play(Instant::now());

    let mut ticker = tokio::time::interval(Duration::from_millis(config.output.tick_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Received shutdown signal");
                break;
            }
            Some(response) = pipeline.next_response(), if pipeline.is_fetching() => {
                pipeline.handle_response(response).await;
                if !pipeline.is_fetching() {
                    let failed = pipeline.failed_batches();
                    if failed.is_empty() {
                        info!(timesteps = pipeline.reader().len(), "All batches loaded");
                    } else {
                        warn!(
                            timesteps = pipeline.reader().len(),
                            failed = ?failed,
                            "Batch loading finished with gaps"
                        );
                    }
                }
            }
            _ = ticker.tick() => {
                controller.tick(Instant::now(), pipeline.is_fetching());
                let written = controller.presenter().frames_written();
                if args.frames.is_some_and(|limit| written >= limit) {
                    info!(frames = written, "Frame limit reached");
                    break;
                }
            }
        }
    }

    controller.pause();
    let state = controller.state();
    info!(
        frames = controller.presenter().frames_written(),
        timesteps = state.loaded_timesteps,
        output_dir = %config.output.dir.display(),
        "Player session complete"
    );

    Ok(())
}

/// Load batch 1 and schedule the rest, retrying a failed first batch.
async fn load_first_batch(
    pipeline: &mut BatchIngestionPipeline,
    attempts: u32,
    retry_delay: u64,
) -> Result<()> {
    let attempts = attempts.max(1);
    for attempt in 1..=attempts {
        let result = if attempt == 1 {
            pipeline.start().await
        } else {
            pipeline.retry().await
        };

        match result {
            Ok(outcome) => {
                let descriptor = pipeline.descriptor();
                info!(
                    ?outcome,
                    total_batches = descriptor.map(|d| d.total_batches),
                    timesteps = pipeline.reader().len(),
                    "Dataset ready"
                );
                return Ok(());
            }
            Err(e) => {
                error!(attempt, attempts, error = %e, "Failed to load first batch");
                if attempt < attempts {
                    tokio::time::sleep(Duration::from_secs(retry_delay)).await;
                }
            }
        }
    }

    match pipeline.load_state() {
        LoadState::Failed(message) => bail!("Dataset unavailable: {message}"),
        state => bail!("Dataset unavailable (state {state:?})"),
    }
}
