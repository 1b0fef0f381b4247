//! Timelapse cursor over a [`SnapshotBuffer`]
//!
//! The buffer does not know which snapshot is on screen; this cursor does,
//! and it is re-clamped after every append because eviction renumbers.

use crate::snapshot::SnapshotBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Live,
    Timelapse,
}

#[derive(Debug, Clone)]
pub struct Playback {
    mode: ViewMode,
    cursor: usize,
    playing: bool,
}

impl Default for Playback {
    fn default() -> Self {
        Self::new()
    }
}

impl Playback {
    pub fn new() -> Self {
        Self {
            mode: ViewMode::Live,
            cursor: 0,
            playing: false,
        }
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn is_live(&self) -> bool {
        self.mode == ViewMode::Live
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Snapshot index that should be on screen
    pub fn current_index(&self, buffer: &SnapshotBuffer) -> Option<usize> {
        let latest = buffer.latest_index()?;
        match self.mode {
            ViewMode::Live => Some(latest),
            ViewMode::Timelapse => Some(self.cursor.min(latest)),
        }
    }

    /// Freeze the view on the newest snapshot
    pub fn enter_timelapse(&mut self, buffer: &SnapshotBuffer) -> Option<usize> {
        self.mode = ViewMode::Timelapse;
        self.playing = false;
        self.cursor = buffer.latest_index().unwrap_or(0);
        buffer.latest_index()
    }

    /// Back to live; the caller shows the newest snapshot
    pub fn exit_timelapse(&mut self) {
        self.mode = ViewMode::Live;
        self.playing = false;
    }

    /// Move the cursor, clamped into `[0, latest]`. Ignored while live.
    pub fn seek(&mut self, index: usize, buffer: &SnapshotBuffer) -> Option<usize> {
        if self.is_live() {
            return None;
        }
        let latest = buffer.latest_index()?;
        self.cursor = index.min(latest);
        Some(self.cursor)
    }

    /// Keep the cursor on the same snapshot after an append that evicted
    /// `evicted` entries; a cursor whose snapshot was evicted lands on 0.
    pub fn on_append(&mut self, evicted: usize, buffer: &SnapshotBuffer) {
        if self.is_live() {
            return;
        }
        self.cursor = self.cursor.saturating_sub(evicted);
        if let Some(latest) = buffer.latest_index() {
            self.cursor = self.cursor.min(latest);
        }
    }

    /// Start or pause automatic stepping. Returns the new playing state.
    pub fn toggle_play(&mut self) -> bool {
        if self.is_live() {
            self.playing = false;
        } else {
            self.playing = !self.playing;
        }
        self.playing
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    /// Advance one snapshot while playing; stops at the newest one
    pub fn step(&mut self, buffer: &SnapshotBuffer) -> Option<usize> {
        if !self.playing || self.is_live() {
            return None;
        }
        let latest = buffer.latest_index()?;
        if self.cursor >= latest {
            self.playing = false;
            return None;
        }
        self.cursor += 1;
        Some(self.cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FeedPayload;
    use crate::snapshot::Snapshot;
    use chrono::Utc;

    fn buffer_with(capacity: usize, count: usize) -> SnapshotBuffer {
        let mut buffer = SnapshotBuffer::new(capacity);
        for _ in 0..count {
            buffer.append(Snapshot::new(Utc::now(), FeedPayload::default(), Vec::new()));
        }
        buffer
    }

    #[test]
    fn test_live_follows_latest() {
        let buffer = buffer_with(5, 3);
        let playback = Playback::new();
        assert_eq!(playback.current_index(&buffer), Some(2));
    }

    #[test]
    fn test_seek_clamps() {
        let buffer = buffer_with(5, 3);
        let mut playback = Playback::new();
        assert_eq!(playback.seek(1, &buffer), None, "seek ignored while live");

        playback.enter_timelapse(&buffer);
        assert_eq!(playback.seek(99, &buffer), Some(2));
        assert_eq!(playback.seek(0, &buffer), Some(0));
    }

    #[test]
    fn test_cursor_tracks_eviction() {
        let mut buffer = buffer_with(3, 3);
        let mut playback = Playback::new();
        playback.enter_timelapse(&buffer);
        playback.seek(1, &buffer);

        let evicted = buffer
            .append(Snapshot::new(Utc::now(), FeedPayload::default(), Vec::new()))
            .map_or(0, |_| 1);
        playback.on_append(evicted, &buffer);
        assert_eq!(playback.current_index(&buffer), Some(0));

        let evicted = buffer
            .append(Snapshot::new(Utc::now(), FeedPayload::default(), Vec::new()))
            .map_or(0, |_| 1);
        playback.on_append(evicted, &buffer);
        assert_eq!(playback.current_index(&buffer), Some(0));
    }

    #[test]
    fn test_play_stops_at_end() {
        let buffer = buffer_with(5, 3);
        let mut playback = Playback::new();
        playback.enter_timelapse(&buffer);
        playback.seek(0, &buffer);
        assert!(playback.toggle_play());

        assert_eq!(playback.step(&buffer), Some(1));
        assert_eq!(playback.step(&buffer), Some(2));
        assert_eq!(playback.step(&buffer), None);
        assert!(!playback.is_playing());
    }

    #[test]
    fn test_toggle_play_ignored_while_live() {
        let mut playback = Playback::new();
        assert!(!playback.toggle_play());
    }
}
