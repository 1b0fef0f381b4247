pub mod once;
pub mod run;
pub mod stands;

pub use once::handle_once;
pub use run::handle_run;
pub use stands::handle_stands;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use apronview::config::{AppConfig, FEED_URL_ENV};
use apronview::feed::{DataSource, FileDataSource, HttpDataSource, is_placeholder_url};
use apronview::stands::{JsonFileStore, KeyValueStore, MemoryStore};

/// Stand persistence: the configured JSON file, or memory only
pub(crate) fn open_backend(config: &AppConfig, ephemeral: bool) -> Arc<dyn KeyValueStore> {
    if ephemeral {
        info!("Using in-memory stand store; edits will not be saved");
        Arc::new(MemoryStore::new())
    } else {
        info!("Using stand store {:?}", config.store_path);
        Arc::new(JsonFileStore::new(&config.store_path))
    }
}

/// Feed source: a local replay file if given, otherwise the configured URL
pub(crate) fn data_source(
    config: &AppConfig,
    feed_file: Option<&Path>,
) -> Result<Arc<dyn DataSource>> {
    if let Some(path) = feed_file {
        info!("Replaying feed from {:?}", path);
        return Ok(Arc::new(FileDataSource::new(path)));
    }

    if config.feed_url.as_deref().is_none_or(is_placeholder_url) {
        warn!(
            "No feed URL configured; polls will fail until feed_url or {} is set",
            FEED_URL_ENV
        );
    }

    let client = reqwest::Client::builder()
        .user_agent(concat!("apronview/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;

    Ok(Arc::new(HttpDataSource::new(
        client,
        config.feed_url.clone(),
        config.fetch_timeout(),
    )))
}
