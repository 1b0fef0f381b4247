use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::dashboard::DashboardOptions;
use crate::geometry::GeoPoint;
use crate::layout::LayoutParams;
use crate::polling::PollingConfig;

pub const CONFIG_ENV: &str = "APRONVIEW_CONFIG";
pub const FEED_URL_ENV: &str = "APRONVIEW_FEED_URL";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CenterConfig {
    pub lat: f64,
    pub lng: f64,
}

impl Default for CenterConfig {
    fn default() -> Self {
        Self {
            lat: -34.8222,
            lng: -58.5358,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportConfig {
    pub width: f64,
    pub height: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 800.0,
        }
    }
}

/// Board configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Movement feed endpoint; unset or placeholder means "not configured"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed_url: Option<String>,
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_history_max")]
    pub history_max: usize,
    #[serde(default = "default_true")]
    pub card_auto_layout: bool,
    #[serde(default)]
    pub airport_center: CenterConfig,
    #[serde(default = "default_initial_zoom")]
    pub initial_zoom: f64,
    #[serde(default)]
    pub viewport: ViewportConfig,
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
    #[serde(default = "default_editor_password")]
    pub editor_password: String,
    #[serde(default = "default_playback_step_ms")]
    pub playback_step_ms: u64,
    #[serde(default = "default_relayout_debounce_ms")]
    pub relayout_debounce_ms: u64,
    #[serde(default)]
    pub layout: LayoutParams,
}

fn default_refresh_secs() -> u64 {
    15
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_history_max() -> usize {
    60
}

fn default_true() -> bool {
    true
}

fn default_initial_zoom() -> f64 {
    14.0
}

fn default_store_path() -> PathBuf {
    PathBuf::from("./apronview-stands.json")
}

fn default_editor_password() -> String {
    "12345678".to_string()
}

fn default_playback_step_ms() -> u64 {
    800
}

fn default_relayout_debounce_ms() -> u64 {
    60
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            feed_url: None,
            refresh_secs: default_refresh_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            history_max: default_history_max(),
            card_auto_layout: true,
            airport_center: CenterConfig::default(),
            initial_zoom: default_initial_zoom(),
            viewport: ViewportConfig::default(),
            store_path: default_store_path(),
            editor_password: default_editor_password(),
            playback_step_ms: default_playback_step_ms(),
            relayout_debounce_ms: default_relayout_debounce_ms(),
            layout: LayoutParams::default(),
        }
    }
}

impl AppConfig {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
        let config: AppConfig =
            toml::from_str(&contents).with_context(|| format!("Failed to parse {:?}", path))?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise start from defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading config from {:?}", path);
            Self::load(path)
        } else {
            info!("No config at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save config to a TOML file (atomic: write to .tmp then rename)
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;
        let tmp_path = path.with_extension("toml.tmp");
        std::fs::write(&tmp_path, &contents)
            .with_context(|| format!("Failed to write {:?}", tmp_path))?;
        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("Failed to rename {:?} to {:?}", tmp_path, path))?;
        Ok(())
    }

    /// Apply `APRONVIEW_FEED_URL` on top of the file
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(FEED_URL_ENV) {
            if !url.trim().is_empty() {
                self.feed_url = Some(url.trim().to_string());
            }
        }
        self
    }

    pub fn airport_center(&self) -> GeoPoint {
        GeoPoint::new(self.airport_center.lat, self.airport_center.lng)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }

    pub fn polling(&self) -> PollingConfig {
        PollingConfig {
            interval: Duration::from_secs(self.refresh_secs.max(1)),
            playback_step: Duration::from_millis(self.playback_step_ms.max(1)),
            relayout_debounce: Duration::from_millis(self.relayout_debounce_ms),
        }
    }

    pub fn dashboard(&self) -> DashboardOptions {
        DashboardOptions {
            history_max: self.history_max,
            auto_layout: self.card_auto_layout,
            layout: self.layout,
        }
    }
}

/// Resolve the config file path.
///
/// Priority:
/// 1. `APRONVIEW_CONFIG` env var
/// 2. `./apronview.toml`
pub fn config_path() -> PathBuf {
    match std::env::var(CONFIG_ENV) {
        Ok(path) => PathBuf::from(path),
        Err(_) => PathBuf::from("./apronview.toml"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_all_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.refresh_secs, 15);
        assert_eq!(config.history_max, 60);
        assert_eq!(config.layout.max_passes, 40);
    }

    #[test]
    fn test_partial_layout_table() {
        let config: AppConfig = toml::from_str(
            r#"
            feed_url = "https://example.test/feed"
            history_max = 20

            [layout]
            edge_padding = 6.0
            "#,
        )
        .unwrap();

        assert_eq!(config.feed_url.as_deref(), Some("https://example.test/feed"));
        assert_eq!(config.history_max, 20);
        assert_eq!(config.layout.edge_padding, 6.0);
        assert_eq!(config.layout.step, 6.0);
        assert_eq!(config.polling().interval, Duration::from_secs(15));
    }

    #[test]
    fn test_config_load_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("apronview.toml");

        let config = AppConfig {
            feed_url: Some("https://example.test/feed".to_string()),
            card_auto_layout: false,
            initial_zoom: 15.0,
            ..Default::default()
        };
        config.save(&path).unwrap();

        assert!(!dir.path().join("apronview.toml.tmp").exists());
        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_or_default(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_bad_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "refresh_secs = \"soon\"").unwrap();

        let err = AppConfig::load_or_default(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse"));
    }
}
