//! apronview - live apron stand board
//!
//! Polls a movement feed, pairs arrivals with departures by registration,
//! places them on user-defined stands and keeps a bounded history for
//! timelapse playback. Cards are decluttered by a small repulsion layout.

pub mod config;
pub mod console;
pub mod correlation;
pub mod dashboard;
pub mod editor;
pub mod feed;
pub mod geometry;
pub mod layout;
pub mod log_format;
pub mod playback;
pub mod polling;
pub mod render;
pub mod snapshot;
pub mod stands;
pub mod surface;
pub mod viewport;

pub use correlation::{MovementMode, MovementRecord, Transition, correlate};
pub use dashboard::{Dashboard, DashboardOptions};
pub use feed::{DataSource, FeedError, FeedPayload, RawMovement};
pub use layout::{CardFootprint, LayoutOutcome, LayoutParams, OverlapResolver};
pub use polling::{Command, PollingConfig, PollingLoop};
pub use snapshot::{Snapshot, SnapshotBuffer};
pub use stands::{KeyValueStore, StandMap, StandRecord, StandStore};
