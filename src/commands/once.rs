use anyhow::{Context, Result};
use chrono::Utc;
use std::path::Path;
use tracing::info;

use apronview::config::AppConfig;
use apronview::dashboard::Dashboard;
use apronview::stands::StandStore;
use apronview::surface::{RenderSurface, TextSurface};
use apronview::viewport::MercatorViewport;

use super::{data_source, open_backend};

/// Fetch once, correlate against the stored stands and print one frame
pub async fn handle_once(config: AppConfig, feed_file: Option<&Path>) -> Result<()> {
    let store = StandStore::open(open_backend(&config, false)).await;
    let viewport = MercatorViewport::new(
        config.airport_center(),
        config.initial_zoom,
        config.viewport.width,
        config.viewport.height,
    );
    let mut dashboard = Dashboard::new(store, Box::new(viewport), config.dashboard());
    let source = data_source(&config, feed_file)?;

    let payload = source.fetch().await.context("Feed fetch failed")?;
    info!(
        "Fetched {} arrivals and {} departures",
        payload.arrivals.len(),
        payload.departures.len()
    );
    dashboard.ingest(payload, Utc::now());

    let frame = dashboard.frame();
    TextSurface::new(std::io::stdout()).present(&frame)?;
    for line in &frame.flights {
        println!("{}", line);
    }
    Ok(())
}
