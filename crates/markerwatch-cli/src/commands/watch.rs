//! Track replay through the full engine.
//!
//! Notification shows and dismisses are printed to stdout as JSON lines by
//! the console delivery adapter; engine logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use markerwatch_core::{Config, ConsoleDelivery, Engine, ReplayFeed, SqliteMarkerStore, Threshold};
use tracing::info;

#[derive(Args)]
pub struct WatchArgs {
    /// Track file: one `lat,lon` or JSON point per line
    pub track: PathBuf,
    /// Delay between track points
    #[arg(long, default_value_t = 1000)]
    pub interval_ms: u64,
    /// Radius in meters (defaults to proximity.threshold_m)
    #[arg(long)]
    pub threshold: Option<f64>,
}

pub fn run(args: WatchArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load()?.engine_config()?;
    if let Some(m) = args.threshold {
        config.threshold = Threshold::meters(m)?;
    }
    // The first track point arrives through the subscription anyway.
    config.use_initial_fix = false;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let feed = Arc::new(ReplayFeed::from_file(&args.track, Duration::from_millis(args.interval_ms))?);
        let markers = Arc::new(SqliteMarkerStore::open_default()?);
        let delivery = Arc::new(ConsoleDelivery::new());

        info!(points = feed.len(), track = %args.track.display(), "replaying track");
        let engine = Engine::start(feed.clone(), delivery, markers, config).await?;
        engine.ensure_permitted()?;

        feed.finished().await;
        engine.wait_idle().await;
        let report = engine.stop().await;

        info!(
            emitted = feed.emitted(),
            processed = engine.processed_fixes(),
            dropped = engine.dropped_fixes(),
            cleared = report.dismissed.len(),
            "replay finished"
        );
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
