//! Board state: stands, history, playback and what is on screen
//!
//! One `Dashboard` is owned by the polling loop and mutated only from there,
//! so a poll result, a user command and a relayout never interleave.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::correlation::{MovementRecord, correlate};
use crate::editor::StandEdit;
use crate::feed::{FeedError, FeedPayload};
use crate::layout::{LayoutOutcome, LayoutParams, OverlapResolver};
use crate::playback::{Playback, ViewMode};
use crate::render::{Frame, FrameHeader, RenderEvent, RenderState, StatusLevel, StatusLine};
use crate::snapshot::{Snapshot, SnapshotBuffer};
use crate::stands::{StandMap, StandStore};
use crate::viewport::Viewport;

#[derive(Debug, Clone)]
pub struct DashboardOptions {
    pub history_max: usize,
    pub auto_layout: bool,
    pub layout: LayoutParams,
}

impl Default for DashboardOptions {
    fn default() -> Self {
        Self {
            history_max: 60,
            auto_layout: true,
            layout: LayoutParams::default(),
        }
    }
}

pub struct Dashboard {
    store: StandStore,
    buffer: SnapshotBuffer,
    playback: Playback,
    render: RenderState,
    resolver: OverlapResolver,
    auto_layout: bool,
    viewport: Box<dyn Viewport>,
    status: StatusLine,
    editing: bool,
    /// Snapshot currently on screen (live or timelapse)
    displayed: Option<Arc<Snapshot>>,
    /// Movements on screen; re-derived from `displayed` after stand edits
    movements: Vec<MovementRecord>,
    stands_tx: watch::Sender<StandMap>,
}

impl Dashboard {
    pub fn new(store: StandStore, viewport: Box<dyn Viewport>, options: DashboardOptions) -> Self {
        let (stands_tx, _) = watch::channel(store.stands().clone());
        let mut render = RenderState::new();
        render.rebuild_stands(store.stands());

        Self {
            store,
            buffer: SnapshotBuffer::new(options.history_max),
            playback: Playback::new(),
            render,
            resolver: OverlapResolver::new(options.layout),
            auto_layout: options.auto_layout,
            viewport,
            status: StatusLine::ready(),
            editing: false,
            displayed: None,
            movements: Vec::new(),
            stands_tx,
        }
    }

    /// Current stand set, updated after every edit
    pub fn subscribe_stands(&self) -> watch::Receiver<StandMap> {
        self.stands_tx.subscribe()
    }

    pub fn stands(&self) -> &StandMap {
        self.store.stands()
    }

    pub fn buffer(&self) -> &SnapshotBuffer {
        &self.buffer
    }

    pub fn playback(&self) -> &Playback {
        &self.playback
    }

    pub fn render_state(&self) -> &RenderState {
        &self.render
    }

    pub fn viewport(&self) -> &dyn Viewport {
        self.viewport.as_ref()
    }

    pub fn status(&self) -> &StatusLine {
        &self.status
    }

    /// Movements currently on screen
    pub fn movements(&self) -> &[MovementRecord] {
        &self.movements
    }

    pub fn displayed(&self) -> Option<&Arc<Snapshot>> {
        self.displayed.as_ref()
    }

    pub fn is_playing(&self) -> bool {
        self.playback.is_playing()
    }

    pub fn set_status(&mut self, level: StatusLevel, message: impl Into<String>) {
        self.status = StatusLine::new(level, message);
    }

    /// Correlate a fresh payload, keep it in history and show it when live.
    /// Returns the index of the new snapshot.
    pub fn ingest(&mut self, payload: FeedPayload, captured_at: DateTime<Utc>) -> usize {
        let movements = correlate(&payload.arrivals, &payload.departures, self.store.stands());
        let visible = movements.len();
        let evicted = self
            .buffer
            .append(Snapshot::new(captured_at, payload, movements))
            .map_or(0, |_| 1);
        self.playback.on_append(evicted, &self.buffer);

        let latest = self.buffer.latest_index().unwrap_or(0);
        if self.playback.is_live() {
            self.show_index(latest);
            self.set_status(StatusLevel::Ok, "Feed updated");
        } else if evicted > 0 {
            self.follow_cursor_after_eviction();
        }
        debug!(
            "Stored snapshot {} ({} visible movements, {} evicted)",
            latest, visible, evicted
        );
        latest
    }

    /// The snapshot on screen may have been evicted, which moves the cursor
    /// onto a different one. Keep the screen and the cursor in agreement.
    fn follow_cursor_after_eviction(&mut self) {
        let Some(index) = self.playback.current_index(&self.buffer) else {
            return;
        };
        let still_shown = match (self.buffer.get(index), &self.displayed) {
            (Some(at_cursor), Some(shown)) => Arc::ptr_eq(&at_cursor, shown),
            _ => false,
        };
        if !still_shown {
            debug!("Displayed snapshot evicted, showing {}", index);
            self.show_index(index);
        }
    }

    /// A poll failed: surface it and keep everything else as is
    pub fn record_failure(&mut self, error: &FeedError) {
        warn!("Feed poll failed: {}", error);
        self.set_status(StatusLevel::Danger, format!("Feed error: {}", error));
    }

    pub fn set_timelapse(&mut self, on: bool) {
        if on == !self.playback.is_live() {
            return;
        }
        if on {
            if let Some(index) = self.playback.enter_timelapse(&self.buffer) {
                self.show_index(index);
            }
            self.set_status(StatusLevel::Accent, "Timelapse on");
        } else {
            self.playback.exit_timelapse();
            if let Some(latest) = self.buffer.latest_index() {
                self.show_index(latest);
            }
            self.set_status(StatusLevel::Info, "Timelapse off");
        }
        info!("View mode: {:?}", self.playback.mode());
    }

    /// Jump the timelapse view to `index` (clamped). Ignored while live.
    pub fn seek(&mut self, index: usize) -> Option<usize> {
        let index = self.playback.seek(index, &self.buffer)?;
        self.show_index(index);
        Some(index)
    }

    pub fn toggle_play(&mut self) -> bool {
        self.playback.toggle_play()
    }

    /// One playback tick; returns whether the view moved
    pub fn step_playback(&mut self) -> bool {
        match self.playback.step(&self.buffer) {
            Some(index) => {
                self.show_index(index);
                true
            }
            None => false,
        }
    }

    fn show_index(&mut self, index: usize) {
        let Some(snapshot) = self.buffer.get(index) else {
            return;
        };
        self.movements = snapshot.movements.clone();
        self.displayed = Some(snapshot);
        self.render
            .show(&self.movements, self.store.stands(), self.viewport.as_ref());
        self.relayout();
    }

    /// Re-project cards for the current viewport and declutter them
    pub fn relayout(&mut self) -> Option<LayoutOutcome> {
        let resolver = self.auto_layout.then_some(&self.resolver);
        self.render.relayout(self.viewport.as_ref(), resolver)
    }

    /// Apply a stand change, then rebuild markers and re-correlate the
    /// payload on screen against the new stand set
    pub async fn apply_edit(&mut self, edit: StandEdit) -> Result<()> {
        match edit {
            StandEdit::Upsert(record) => self.store.upsert(record).await?,
            StandEdit::Replace { old_name, record } => {
                self.store.replace(&old_name, record).await?
            }
            StandEdit::Delete(name) => {
                self.store.remove(&name).await?;
            }
        }
        self.rebuild_after_stand_change();
        Ok(())
    }

    fn rebuild_after_stand_change(&mut self) {
        self.render.rebuild_stands(self.store.stands());
        self.stands_tx.send_replace(self.store.stands().clone());

        if let Some(snapshot) = &self.displayed {
            self.movements = correlate(
                &snapshot.payload.arrivals,
                &snapshot.payload.departures,
                self.store.stands(),
            );
        }
        self.render
            .show(&self.movements, self.store.stands(), self.viewport.as_ref());
        self.relayout();
    }

    pub fn set_editing(&mut self, editing: bool) {
        self.editing = editing;
    }

    pub fn handle_render_event(&mut self, event: RenderEvent) -> bool {
        self.render.apply(event, self.viewport.as_mut())
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.viewport.pan_by(dx, dy);
    }

    pub fn zoom_to(&mut self, zoom: f64) {
        self.viewport.set_zoom(zoom);
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        self.viewport.resize(width, height);
    }

    pub fn frame(&self) -> Frame {
        let position = self.playback.current_index(&self.buffer).zip(self.buffer.latest_index());
        self.render.frame(FrameHeader {
            clock: self.displayed.as_ref().map(|s| s.display_time()),
            status: self.status.clone(),
            mode: self.playback.mode(),
            playing: self.playback.is_playing(),
            position,
            editing: self.editing,
        })
    }

    pub fn view_mode(&self) -> ViewMode {
        self.playback.mode()
    }
}
