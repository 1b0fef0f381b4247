use anyhow::{Context, Result, bail};
use clap::Subcommand;
use std::path::PathBuf;
use tracing::info;

use apronview::config::AppConfig;
use apronview::correlation::natural_cmp;
use apronview::stands::{StandRecord, StandStore, decode_stands, encode_stands};

use super::open_backend;

#[derive(Subcommand, Debug)]
pub enum StandsAction {
    /// List stored stands in natural order
    List,
    /// Create or overwrite a stand
    Add {
        name: String,
        #[arg(allow_hyphen_values = true)]
        lat: f64,
        #[arg(allow_hyphen_values = true)]
        lng: f64,
        /// Nose heading in degrees (any integer, normalised into 0..360)
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        heading: i32,
    },
    /// Delete a stand
    Rm { name: String },
    /// Print the stand map as JSON
    Export,
    /// Replace every stand with the contents of a JSON export
    Import { file: PathBuf },
}

pub async fn handle_stands(config: AppConfig, action: StandsAction) -> Result<()> {
    let mut store = StandStore::open(open_backend(&config, false)).await;

    match action {
        StandsAction::List => {
            let mut stands: Vec<&StandRecord> = store.stands().values().collect();
            stands.sort_by(|a, b| natural_cmp(&a.name, &b.name));
            for stand in stands {
                println!(
                    "{:<6} {:>11.6} {:>11.6} {:>3}°",
                    stand.name, stand.lat, stand.lng, stand.heading_deg
                );
            }
        }
        StandsAction::Add {
            name,
            lat,
            lng,
            heading,
        } => {
            store.upsert(StandRecord::new(name, lat, lng, heading)).await?;
        }
        StandsAction::Rm { name } => {
            if store.remove(&name).await?.is_none() {
                bail!("Unknown stand {}", name);
            }
        }
        StandsAction::Export => {
            println!("{}", encode_stands(store.stands())?);
        }
        StandsAction::Import { file } => {
            let raw = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {:?}", file))?;
            let Some(stands) = decode_stands(&raw) else {
                bail!("{:?} is not a stand map", file);
            };
            let count = stands.len();
            store.replace_all(stands).await?;
            info!("Imported {} stands from {:?}", count, file);
        }
    }
    Ok(())
}
