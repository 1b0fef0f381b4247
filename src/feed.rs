//! Movement feed: wire types and data sources
//!
//! The feed is polled, read-only and untrusted. Every string field is coerced
//! to a trimmed string (numbers and booleans are stringified, anything else
//! becomes empty) and missing `arrivals`/`departures` lists default to empty.
//!
//! Expected response:
//! ```json
//! {
//!   "serverTime": "2026-02-06T00:00:00.000Z",
//!   "arrivals":   [{ "flight", "reg", "pos", "time", "origin", "status" }],
//!   "departures": [{ "flight", "reg", "pos", "time", "dest", "gate", "status", "atd" }]
//! }
//! ```

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CACHE_CONTROL;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// One side (arrival or departure) of a feed entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMovement {
    #[serde(default, deserialize_with = "coerce_string")]
    pub flight: String,
    #[serde(
        default,
        rename = "reg",
        alias = "registration",
        deserialize_with = "coerce_string"
    )]
    pub registration: String,
    /// Stand code, possibly encoding a transition such as `72>50B`
    #[serde(default, rename = "pos", alias = "stand", deserialize_with = "coerce_string")]
    pub stand: String,
    #[serde(default, deserialize_with = "coerce_string")]
    pub time: String,
    #[serde(default, deserialize_with = "coerce_string")]
    pub origin: String,
    #[serde(default, deserialize_with = "coerce_string")]
    pub dest: String,
    #[serde(default, deserialize_with = "coerce_string")]
    pub gate: String,
    #[serde(default, deserialize_with = "coerce_string")]
    pub status: String,
    #[serde(default, deserialize_with = "coerce_string")]
    pub atd: String,
}

impl RawMovement {
    /// Origin for arrivals, destination for departures
    pub fn counterpart_airport(&self) -> &str {
        if self.origin.is_empty() {
            &self.dest
        } else {
            &self.origin
        }
    }
}

/// A complete poll response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPayload {
    #[serde(default, deserialize_with = "coerce_optional_string")]
    pub server_time: Option<String>,
    #[serde(default, deserialize_with = "coerce_movements")]
    pub arrivals: Vec<RawMovement>,
    #[serde(default, deserialize_with = "coerce_movements")]
    pub departures: Vec<RawMovement>,
}

impl FeedPayload {
    /// Decode a payload, tolerating loose field types
    pub fn from_json(raw: &str) -> Result<Self, FeedError> {
        serde_json::from_str(raw).map_err(|e| FeedError::Decode(e.to_string()))
    }
}

/// Trim-and-stringify any JSON scalar
pub fn coerce_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
    }
}

fn coerce_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_value(&value))
}

fn coerce_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let s = coerce_value(&value);
    Ok(if s.is_empty() { None } else { Some(s) })
}

/// Non-array values become an empty list and non-object items are skipped
fn coerce_movements<'de, D>(deserializer: D) -> Result<Vec<RawMovement>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let Value::Array(items) = value else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter(Value::is_object)
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

/// Why a poll produced no payload
#[derive(Debug, Clone, PartialEq)]
pub enum FeedError {
    /// Feed URL unset or still the placeholder
    NotConfigured,
    /// No response within the configured timeout
    Timeout(Duration),
    /// Connection-level failure
    Transport(String),
    /// Non-success HTTP status
    Status(u16),
    /// Body was not the expected JSON shape
    Decode(String),
}

impl std::fmt::Display for FeedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedError::NotConfigured => {
                write!(f, "Feed URL not configured (set feed_url or APRONVIEW_FEED_URL)")
            }
            FeedError::Timeout(after) => write!(f, "Feed timed out after {:?}", after),
            FeedError::Transport(msg) => write!(f, "Feed transport error: {}", msg),
            FeedError::Status(code) => write!(f, "HTTP {}", code),
            FeedError::Decode(msg) => write!(f, "Invalid feed payload: {}", msg),
        }
    }
}

impl std::error::Error for FeedError {}

/// A polled movement feed
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn fetch(&self) -> Result<FeedPayload, FeedError>;
}

/// True for URLs that are blank or still carry the template placeholder
pub fn is_placeholder_url(url: &str) -> bool {
    let url = url.trim();
    url.is_empty() || url.contains("PASTE_")
}

/// Fetches the feed over HTTP(S)
#[derive(Clone)]
pub struct HttpDataSource {
    client: Client,
    url: Option<String>,
    timeout: Duration,
}

impl HttpDataSource {
    pub fn new(client: Client, url: Option<String>, timeout: Duration) -> Self {
        Self {
            client,
            url,
            timeout,
        }
    }
}

#[async_trait]
impl DataSource for HttpDataSource {
    async fn fetch(&self) -> Result<FeedPayload, FeedError> {
        let url = match self.url.as_deref() {
            Some(url) if !is_placeholder_url(url) => url,
            _ => return Err(FeedError::NotConfigured),
        };

        debug!("Fetching movement feed from {}", url);

        let response = self
            .client
            .get(url)
            .header(CACHE_CONTROL, "no-cache")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FeedError::Timeout(self.timeout)
                } else {
                    FeedError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status(status.as_u16()));
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                FeedError::Timeout(self.timeout)
            } else {
                FeedError::Transport(e.to_string())
            }
        })?;

        FeedPayload::from_json(&body)
    }
}

/// Reads the feed from a JSON file on every poll, for offline replays
#[derive(Debug, Clone)]
pub struct FileDataSource {
    path: PathBuf,
}

impl FileDataSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DataSource for FileDataSource {
    async fn fetch(&self) -> Result<FeedPayload, FeedError> {
        let body = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| FeedError::Transport(format!("{:?}: {}", self.path, e)))?;
        FeedPayload::from_json(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerces_loose_types() {
        let payload = FeedPayload::from_json(
            r#"{
                "serverTime": " 2026-02-06T12:00:00Z ",
                "arrivals": [
                    {"flight": 1234, "reg": " lv-abc ", "pos": " 72 ", "status": null, "time": true}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(payload.server_time.as_deref(), Some("2026-02-06T12:00:00Z"));
        assert!(payload.departures.is_empty());
        let arr = &payload.arrivals[0];
        assert_eq!(arr.flight, "1234");
        assert_eq!(arr.registration, "lv-abc");
        assert_eq!(arr.stand, "72");
        assert_eq!(arr.status, "");
        assert_eq!(arr.time, "true");
    }

    #[test]
    fn test_non_list_sections_default_to_empty() {
        let payload =
            FeedPayload::from_json(r#"{"arrivals": null, "departures": {"x": 1}}"#).unwrap();
        assert!(payload.arrivals.is_empty());
        assert!(payload.departures.is_empty());
        assert!(payload.server_time.is_none());
    }

    #[test]
    fn test_skips_non_object_items() {
        let payload =
            FeedPayload::from_json(r#"{"departures": ["junk", 3, {"reg": "LV-XYZ", "pos": "5"}]}"#)
                .unwrap();
        assert_eq!(payload.departures.len(), 1);
        assert_eq!(payload.departures[0].registration, "LV-XYZ");
    }

    #[test]
    fn test_rejects_non_json() {
        assert!(matches!(
            FeedPayload::from_json("<html>"),
            Err(FeedError::Decode(_))
        ));
    }

    #[test]
    fn test_placeholder_url() {
        assert!(is_placeholder_url(""));
        assert!(is_placeholder_url("https://script.google.com/PASTE_YOUR_URL"));
        assert!(!is_placeholder_url("https://example.org/feed.json"));
    }

    #[tokio::test]
    async fn test_http_source_without_url_is_not_configured() {
        let source = HttpDataSource::new(Client::new(), None, Duration::from_secs(1));
        assert_eq!(source.fetch().await, Err(FeedError::NotConfigured));
    }

    #[tokio::test]
    async fn test_file_source_reads_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.json");
        std::fs::write(&path, r#"{"arrivals":[{"reg":"LV-ABC","pos":"3"}]}"#).unwrap();

        let payload = FileDataSource::new(&path).fetch().await.unwrap();
        assert_eq!(payload.arrivals[0].stand, "3");
    }
}
