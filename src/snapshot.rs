//! Bounded history of correlated states for timelapse playback
//!
//! Index 0 is always the oldest retained snapshot. Every eviction shifts the
//! remaining indices down by one, so a caller holding an index must adjust it
//! (see [`crate::playback::Playback::on_append`]) after each append.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Arc;

use crate::correlation::MovementRecord;
use crate::feed::FeedPayload;

/// One fully-correlated state of the world
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub captured_at: DateTime<Utc>,
    pub payload: FeedPayload,
    pub movements: Vec<MovementRecord>,
}

impl Snapshot {
    pub fn new(
        captured_at: DateTime<Utc>,
        payload: FeedPayload,
        movements: Vec<MovementRecord>,
    ) -> Self {
        Self {
            captured_at,
            payload,
            movements,
        }
    }

    /// Feed-reported time of the snapshot, falling back to when it was captured
    pub fn display_time(&self) -> DateTime<Utc> {
        self.payload
            .server_time
            .as_deref()
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or(self.captured_at)
    }
}

/// FIFO ring of snapshots with a fixed capacity
#[derive(Debug, Clone)]
pub struct SnapshotBuffer {
    capacity: usize,
    entries: VecDeque<Arc<Snapshot>>,
}

impl SnapshotBuffer {
    /// Create a buffer retaining at most `capacity` snapshots (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a snapshot, evicting and returning the oldest one when full
    pub fn append(&mut self, snapshot: Snapshot) -> Option<Arc<Snapshot>> {
        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(Arc::new(snapshot));
        evicted
    }

    pub fn get(&self, index: usize) -> Option<Arc<Snapshot>> {
        self.entries.get(index).cloned()
    }

    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.entries.back().cloned()
    }

    /// Index of the newest snapshot, `None` while empty
    pub fn latest_index(&self) -> Option<usize> {
        self.entries.len().checked_sub(1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Snapshot>> {
        self.entries.iter()
    }
}
