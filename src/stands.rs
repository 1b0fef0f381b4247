//! Stand (parking position) records and their persistence.
//!
//! The whole stand map lives under a single namespaced key of a key-value
//! store, serialized as `name -> {lat, lng, hdg}`. A missing or unreadable
//! value yields an empty map; the editor is how users repopulate it.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::geometry::{GeoPoint, normalize_heading};

/// Key under which the stand map is persisted
pub const STANDS_KEY: &str = "apronview.stands.v1";

/// A named apron position with a geographic anchor and a default heading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandRecord {
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub heading_deg: u16,
}

impl StandRecord {
    pub fn new(name: impl Into<String>, lat: f64, lng: f64, heading_deg: i32) -> Self {
        Self {
            name: name.into(),
            lat,
            lng,
            heading_deg: normalize_heading(heading_deg),
        }
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lng)
    }
}

/// Active stand set keyed by name
pub type StandMap = BTreeMap<String, StandRecord>;

/// Persisted shape of one stand, keyed by name in the outer object
#[derive(Debug, Serialize, Deserialize)]
struct StoredStand {
    lat: f64,
    lng: f64,
    #[serde(default)]
    hdg: f64,
}

/// Parse the persisted stand map. A document that is not a JSON object
/// yields `None`; single malformed entries are skipped with a warning.
pub fn decode_stands(raw: &str) -> Option<StandMap> {
    let stored: BTreeMap<String, serde_json::Value> = serde_json::from_str(raw).ok()?;
    Some(
        stored
            .into_iter()
            .filter(|(name, _)| !name.trim().is_empty())
            .filter_map(|(name, value)| match serde_json::from_value::<StoredStand>(value) {
                Ok(s) if s.lat.is_finite() && s.lng.is_finite() => {
                    let record =
                        StandRecord::new(name.clone(), s.lat, s.lng, s.hdg.round() as i32);
                    Some((name, record))
                }
                Ok(_) => {
                    warn!("Skipping stored stand {} with invalid coordinates", name);
                    None
                }
                Err(e) => {
                    warn!("Skipping malformed stored stand {}: {}", name, e);
                    None
                }
            })
            .collect(),
    )
}

pub fn encode_stands(stands: &StandMap) -> Result<String> {
    let stored: BTreeMap<&str, StoredStand> = stands
        .iter()
        .map(|(name, s)| {
            (
                name.as_str(),
                StoredStand {
                    lat: s.lat,
                    lng: s.lng,
                    hdg: f64::from(s.heading_deg),
                },
            )
        })
        .collect();
    serde_json::to_string(&stored).context("Failed to serialize stand map")
}

/// Minimal string key-value persistence
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: String) -> Result<()>;
}

/// In-process store, used by tests and the `--ephemeral` CLI flag
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(key: &str, value: impl Into<String>) -> Self {
        let mut values = HashMap::new();
        values.insert(key.to_string(), value.into());
        Self {
            values: Mutex::new(values),
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.values.lock().await.insert(key.to_string(), value);
        Ok(())
    }
}

/// Store backed by a single JSON object file (`{"key": "value", ...}`).
///
/// Writes go to a `.tmp` sibling and are renamed into place.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<HashMap<String, String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(HashMap::new()),
            Ok(contents) => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {:?}", self.path)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(anyhow!(e).context(format!("Failed to read {:?}", self.path))),
        }
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all().await?.remove(key))
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        // A corrupt file is replaced rather than blocking every future write
        let mut values = self.read_all().await.unwrap_or_else(|e| {
            warn!("Replacing unreadable store file: {:#}", e);
            HashMap::new()
        });
        values.insert(key.to_string(), value);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create {:?}", parent))?;
            }
        }

        let contents = serde_json::to_string_pretty(&values).context("Failed to serialize store")?;
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, contents)
            .await
            .with_context(|| format!("Failed to write {:?}", tmp_path))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .with_context(|| format!("Failed to rename {:?} to {:?}", tmp_path, self.path))?;
        Ok(())
    }
}

/// CRUD over the stand map, cached in memory and written through on change
pub struct StandStore {
    backend: Arc<dyn KeyValueStore>,
    stands: StandMap,
}

impl StandStore {
    /// Load the stand map from `backend`. Unreadable data yields an empty set.
    pub async fn open(backend: Arc<dyn KeyValueStore>) -> Self {
        let stands = match backend.get(STANDS_KEY).await {
            Ok(Some(raw)) => decode_stands(&raw).unwrap_or_else(|| {
                warn!("Stored stand map is corrupt, starting with no stands");
                StandMap::new()
            }),
            Ok(None) => StandMap::new(),
            Err(e) => {
                warn!("Failed to read stand map, starting with no stands: {:#}", e);
                StandMap::new()
            }
        };
        info!("Loaded {} stands", stands.len());
        Self { backend, stands }
    }

    pub fn stands(&self) -> &StandMap {
        &self.stands
    }

    pub fn get(&self, name: &str) -> Option<&StandRecord> {
        self.stands.get(name)
    }

    pub fn len(&self) -> usize {
        self.stands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stands.is_empty()
    }

    /// Insert or replace the stand called `record.name`
    pub async fn upsert(&mut self, record: StandRecord) -> Result<()> {
        let name = record.name.trim().to_string();
        if name.is_empty() {
            return Err(anyhow!("Stand name must not be empty"));
        }
        if !record.lat.is_finite() || !record.lng.is_finite() {
            return Err(anyhow!(
                "Stand {} has invalid coordinates ({}, {})",
                name,
                record.lat,
                record.lng
            ));
        }
        debug!("Saving stand {} at ({}, {})", name, record.lat, record.lng);
        self.stands.insert(
            name.clone(),
            StandRecord {
                name,
                ..record
            },
        );
        self.persist().await
    }

    /// Rename `old_name` to `record.name` (if different) and apply the new values
    pub async fn replace(&mut self, old_name: &str, record: StandRecord) -> Result<()> {
        if !self.stands.contains_key(old_name) {
            return Err(anyhow!("Unknown stand {}", old_name));
        }
        let new_name = record.name.trim();
        if new_name.is_empty() {
            return Err(anyhow!("Stand name must not be empty"));
        }
        if !record.lat.is_finite() || !record.lng.is_finite() {
            return Err(anyhow!("Stand {} has invalid coordinates", new_name));
        }
        if new_name != old_name {
            info!("Renaming stand {} to {}", old_name, new_name);
            self.stands.remove(old_name);
        }
        self.upsert(record).await
    }

    /// Remove a stand; returns the removed record if it existed
    pub async fn remove(&mut self, name: &str) -> Result<Option<StandRecord>> {
        let removed = self.stands.remove(name);
        if removed.is_some() {
            info!("Deleted stand {}", name);
            self.persist().await?;
        }
        Ok(removed)
    }

    /// Replace the whole set (used by imports)
    pub async fn replace_all(&mut self, stands: StandMap) -> Result<()> {
        self.stands = stands;
        self.persist().await
    }

    async fn persist(&self) -> Result<()> {
        let raw = encode_stands(&self.stands)?;
        self.backend.set(STANDS_KEY, raw).await
    }
}
