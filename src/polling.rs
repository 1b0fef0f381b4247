//! Poll loop: periodic fetch, user commands, playback and relayout
//!
//! The loop task owns the [`Dashboard`]. Fetches run on spawned tasks and
//! hand their outcome back over a channel, so a slow feed never blocks
//! commands. At most one fetch is outstanding at any time; ticks that land
//! while one is in flight are skipped.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::dashboard::Dashboard;
use crate::editor::StandEdit;
use crate::feed::{DataSource, FeedError, FeedPayload};
use crate::render::{RenderEvent, StatusLevel};
use crate::surface::RenderSurface;

/// Commands the loop accepts from the user side
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Fetch now (still single-flight)
    Refresh,
    SetTimelapse(bool),
    ToggleTimelapse,
    TogglePlay,
    Seek(usize),
    Render(RenderEvent),
    Pan { dx: f64, dy: f64 },
    Zoom(f64),
    Resize { width: f64, height: f64 },
    ApplyEdit(StandEdit),
    SetEditing(bool),
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    Idle,
    Fetching,
    /// Last fetch was applied; idle until the next tick
    Succeeded,
    /// Last fetch failed; idle until the next tick
    Failed,
}

/// Guards the single outstanding fetch
#[derive(Debug, Clone, Default)]
pub struct FetchGate {
    in_flight: Arc<AtomicBool>,
}

impl FetchGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the gate; `None` while another fetch holds it
    pub fn try_acquire(&self) -> Option<FetchPermit> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FetchPermit {
                in_flight: Arc::clone(&self.in_flight),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// Releases the gate when dropped
#[derive(Debug)]
pub struct FetchPermit {
    in_flight: Arc<AtomicBool>,
}

impl Drop for FetchPermit {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::Release);
    }
}

/// Result of one fetch. Holds the permit, so the gate stays closed until the
/// loop has applied the outcome.
#[derive(Debug)]
pub struct FetchOutcome {
    pub result: Result<FeedPayload, FeedError>,
    pub captured_at: DateTime<Utc>,
    pub elapsed: Duration,
    _permit: FetchPermit,
}

#[derive(Debug, Clone)]
pub struct PollingConfig {
    pub interval: Duration,
    pub playback_step: Duration,
    pub relayout_debounce: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
            playback_step: Duration::from_millis(800),
            relayout_debounce: Duration::from_millis(60),
        }
    }
}

/// Register poll metrics with zero values so they show up before the first poll
pub fn initialize_poll_metrics() {
    metrics::counter!("apronview.poll.success").absolute(0);
    metrics::counter!("apronview.poll.failure").absolute(0);
    metrics::counter!("apronview.poll.skipped").absolute(0);
    metrics::histogram!("apronview.poll.fetch_ms").record(0.0);
}

/// What a command needs on screen afterwards
enum Redraw {
    None,
    Now,
    /// The viewport moved; relayout once the burst settles
    Debounced,
}

pub struct PollingLoop {
    source: Arc<dyn DataSource>,
    gate: FetchGate,
    config: PollingConfig,
    phase: PollPhase,
}

impl PollingLoop {
    pub fn new(source: Arc<dyn DataSource>, config: PollingConfig) -> Self {
        Self {
            source,
            gate: FetchGate::new(),
            config,
            phase: PollPhase::Idle,
        }
    }

    pub fn phase(&self) -> PollPhase {
        self.phase
    }

    /// Spawn a fetch unless one is already running. Returns whether one started.
    pub fn try_start_fetch(&mut self, done: &mpsc::Sender<FetchOutcome>) -> bool {
        let Some(permit) = self.gate.try_acquire() else {
            metrics::counter!("apronview.poll.skipped").increment(1);
            debug!("Fetch already in flight, skipping");
            return false;
        };

        self.phase = PollPhase::Fetching;
        let source = Arc::clone(&self.source);
        let done = done.clone();
        tokio::spawn(
            async move {
                let started = Instant::now();
                let result = source.fetch().await;
                let outcome = FetchOutcome {
                    result,
                    captured_at: Utc::now(),
                    elapsed: started.elapsed(),
                    _permit: permit,
                };
                if done.send(outcome).await.is_err() {
                    debug!("Poll loop gone, dropping fetch outcome");
                }
            }
            .instrument(info_span!("poll")),
        );
        true
    }

    fn apply_outcome(&mut self, dashboard: &mut Dashboard, outcome: FetchOutcome) {
        let _span = info_span!("poll").entered();
        metrics::histogram!("apronview.poll.fetch_ms").record(outcome.elapsed.as_millis() as f64);

        match outcome.result {
            Ok(payload) => {
                let arrivals = payload.arrivals.len();
                let departures = payload.departures.len();
                let index = dashboard.ingest(payload, outcome.captured_at);
                metrics::counter!("apronview.poll.success").increment(1);
                info!(
                    "Poll ok in {:?}: {} arrivals, {} departures, {} on stands (snapshot {})",
                    outcome.elapsed,
                    arrivals,
                    departures,
                    dashboard.buffer().get(index).map_or(0, |s| s.movements.len()),
                    index
                );
                self.phase = PollPhase::Succeeded;
            }
            Err(e) => {
                metrics::counter!("apronview.poll.failure").increment(1);
                dashboard.record_failure(&e);
                self.phase = PollPhase::Failed;
            }
        }
    }

    async fn handle_command(
        &mut self,
        dashboard: &mut Dashboard,
        command: Command,
        done: &mpsc::Sender<FetchOutcome>,
    ) -> Redraw {
        match command {
            Command::Refresh => {
                if !self.try_start_fetch(done) {
                    dashboard.set_status(StatusLevel::Warn, "Refresh already in progress");
                    return Redraw::Now;
                }
                Redraw::None
            }
            Command::SetTimelapse(on) => {
                dashboard.set_timelapse(on);
                Redraw::Now
            }
            Command::ToggleTimelapse => {
                let on = dashboard.playback().is_live();
                dashboard.set_timelapse(on);
                Redraw::Now
            }
            Command::TogglePlay => {
                dashboard.toggle_play();
                Redraw::Now
            }
            Command::Seek(index) => match dashboard.seek(index) {
                Some(_) => Redraw::Now,
                None => Redraw::None,
            },
            Command::Render(event) => {
                let moves_viewport = matches!(
                    event,
                    RenderEvent::Select { focus: true, .. } | RenderEvent::FocusStand { .. }
                );
                if !dashboard.handle_render_event(event) {
                    Redraw::None
                } else if moves_viewport {
                    Redraw::Debounced
                } else {
                    Redraw::Now
                }
            }
            Command::Pan { dx, dy } => {
                dashboard.pan_by(dx, dy);
                Redraw::Debounced
            }
            Command::Zoom(zoom) => {
                dashboard.zoom_to(zoom);
                Redraw::Debounced
            }
            Command::Resize { width, height } => {
                dashboard.resize(width, height);
                Redraw::Debounced
            }
            Command::ApplyEdit(edit) => {
                match dashboard.apply_edit(edit).await {
                    Ok(()) => dashboard.set_status(StatusLevel::Ok, "Stands saved"),
                    Err(e) => {
                        warn!("Failed to apply stand edit: {:#}", e);
                        dashboard.set_status(StatusLevel::Danger, format!("Stand edit failed: {}", e));
                    }
                }
                Redraw::Now
            }
            Command::SetEditing(editing) => {
                dashboard.set_editing(editing);
                Redraw::Now
            }
            // handled by the loop
            Command::Quit => Redraw::None,
        }
    }

    fn present(dashboard: &Dashboard, surface: &mut dyn RenderSurface) {
        if let Err(e) = surface.present(&dashboard.frame()) {
            warn!("Failed to present frame: {:#}", e);
        }
    }

    /// Run until `shutdown` fires or a [`Command::Quit`] arrives
    pub async fn run(
        &mut self,
        dashboard: &mut Dashboard,
        mut commands: mpsc::Receiver<Command>,
        surface: &mut dyn RenderSurface,
        shutdown: CancellationToken,
    ) -> Result<()> {
        let (done_tx, mut done_rx) = mpsc::channel::<FetchOutcome>(1);

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut playback_timer = interval(self.config.playback_step);
        playback_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let relayout = tokio::time::sleep(Duration::ZERO);
        tokio::pin!(relayout);
        let mut relayout_pending = false;
        let mut commands_open = true;

        info!(
            "Polling every {:?} (playback step {:?})",
            self.config.interval, self.config.playback_step
        );
        Self::present(dashboard, surface);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, stopping poll loop");
                    break;
                }
                _ = ticker.tick() => {
                    self.try_start_fetch(&done_tx);
                }
                Some(outcome) = done_rx.recv() => {
                    self.apply_outcome(dashboard, outcome);
                    Self::present(dashboard, surface);
                }
                command = commands.recv(), if commands_open => {
                    let Some(command) = command else {
                        debug!("Command channel closed");
                        commands_open = false;
                        continue;
                    };
                    if command == Command::Quit {
                        info!("Quit requested, stopping poll loop");
                        break;
                    }

                    let was_playing = dashboard.is_playing();
                    match self.handle_command(dashboard, command, &done_tx).await {
                        Redraw::None => {}
                        Redraw::Now => Self::present(dashboard, surface),
                        Redraw::Debounced => {
                            relayout
                                .as_mut()
                                .reset(tokio::time::Instant::now() + self.config.relayout_debounce);
                            relayout_pending = true;
                        }
                    }
                    if dashboard.is_playing() && !was_playing {
                        playback_timer.reset();
                    }
                }
                _ = playback_timer.tick(), if dashboard.is_playing() => {
                    if dashboard.step_playback() {
                        Self::present(dashboard, surface);
                    } else if !dashboard.is_playing() {
                        debug!("Playback reached the newest snapshot");
                        Self::present(dashboard, surface);
                    }
                }
                _ = &mut relayout, if relayout_pending => {
                    relayout_pending = false;
                    dashboard.relayout();
                    Self::present(dashboard, surface);
                }
            }
        }

        Ok(())
    }
}
