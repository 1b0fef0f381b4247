mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use apronview::config::{AppConfig, config_path};
use apronview::log_format::CompactFormat;

use commands::run::RunOptions;
use commands::stands::StandsAction;

#[derive(Parser, Debug)]
#[command(
    name = "apronview",
    about = "Live apron stand board: arrivals and departures on their stands, with timelapse."
)]
struct Cli {
    /// Config file (default: $APRONVIEW_CONFIG or ./apronview.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Poll the feed and drive the board from stdin commands
    Run {
        /// Keep stands in memory only
        #[arg(long, default_value_t = false)]
        ephemeral: bool,
        /// Replay the feed from a JSON file instead of the configured URL
        #[arg(long)]
        feed_file: Option<PathBuf>,
    },
    /// Fetch once and print the board
    Once {
        #[arg(long)]
        feed_file: Option<PathBuf>,
    },
    /// Manage stored stands
    Stands {
        #[command(subcommand)]
        action: StandsAction,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let ansi = std::io::IsTerminal::is_terminal(&std::io::stderr());

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .event_format(CompactFormat::new(ansi)),
        )
        .init();
}

async fn dispatch(cli: Cli) -> Result<()> {
    let path = cli.config.unwrap_or_else(config_path);
    let config = AppConfig::load_or_default(&path)?.with_env_overrides();

    match cli.command {
        Commands::Run {
            ephemeral,
            feed_file,
        } => {
            commands::handle_run(
                config,
                RunOptions {
                    ephemeral,
                    feed_file,
                },
            )
            .await?;
            // The stdin reader thread cannot be cancelled; exit instead of
            // waiting for it on runtime shutdown.
            std::process::exit(0);
        }
        Commands::Once { feed_file } => commands::handle_once(config, feed_file.as_deref()).await,
        Commands::Stands { action } => commands::handle_stands(config, action).await,
    }
}

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    if let Err(e) = dispatch(cli).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
