use anyhow::Result;
use std::path::PathBuf;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use apronview::config::AppConfig;
use apronview::console::{ConsolePrompts, run_console};
use apronview::dashboard::Dashboard;
use apronview::editor::Editor;
use apronview::polling::{PollingLoop, initialize_poll_metrics};
use apronview::stands::StandStore;
use apronview::surface::TextSurface;
use apronview::viewport::MercatorViewport;

use super::{data_source, open_backend};

const COMMAND_QUEUE_SIZE: usize = 64;

pub struct RunOptions {
    pub ephemeral: bool,
    pub feed_file: Option<PathBuf>,
}

/// Cancel `shutdown` on Ctrl+C
fn spawn_shutdown_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received shutdown signal (Ctrl+C), stopping board...");
                shutdown.cancel();
            }
            Err(err) => {
                warn!("Unable to listen for shutdown signal: {}", err);
            }
        }
    });
}

pub async fn handle_run(config: AppConfig, options: RunOptions) -> Result<()> {
    let store = StandStore::open(open_backend(&config, options.ephemeral)).await;
    let viewport = MercatorViewport::new(
        config.airport_center(),
        config.initial_zoom,
        config.viewport.width,
        config.viewport.height,
    );
    let mut dashboard = Dashboard::new(store, Box::new(viewport), config.dashboard());
    let source = data_source(&config, options.feed_file.as_deref())?;

    initialize_poll_metrics();

    let shutdown = CancellationToken::new();
    spawn_shutdown_handler(shutdown.clone());

    let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_SIZE);

    // Prompts go to stderr so they do not interleave with frames on stdout
    let prompts = ConsolePrompts::new(BufReader::new(tokio::io::stdin()), tokio::io::stderr());
    let editor = Editor::new(config.editor_password.clone());
    let stands = dashboard.subscribe_stands();
    let console_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = run_console(prompts, editor, stands, command_tx, console_shutdown).await {
            warn!("Console stopped: {:#}", e);
        }
    });

    let mut surface = TextSurface::new(std::io::stdout());
    let mut polling = PollingLoop::new(source, config.polling());
    polling
        .run(&mut dashboard, command_rx, &mut surface, shutdown.clone())
        .await?;

    shutdown.cancel();
    info!(
        "Board stopped with {} snapshots in history",
        dashboard.buffer().len()
    );
    Ok(())
}
