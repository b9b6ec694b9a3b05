//! Work session timer: start/stop/break tracking with daily, yesterday and
//! ISO-weekly totals, persisted as a JSON snapshot of the live state plus an
//! append-only CSV log of closed sessions.
//!
//! A UI shell owns one [`TimerController`], forwards button presses to its
//! mutators, and renders the [`TimerMetrics`] the poller publishes:
//!
//! ```no_run
//! # async fn run() -> anyhow::Result<()> {
//! use timetracker_lib::{init_logging, TimerController, TrackerConfig};
//!
//! init_logging();
//! let config = TrackerConfig::from_env();
//! let timer = TimerController::open_or_fresh(&config);
//! timer.spawn_poller(|metrics| println!("{:?}", metrics)).await?;
//! timer.start().await?;
//! timer.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod config;
pub mod format;
pub mod models;
pub mod storage;
pub mod timer;
mod utils;

pub use config::TrackerConfig;
pub use models::Session;
pub use storage::{HistoryStore, SnapshotRecord, SnapshotStore, Storage};
pub use timer::{TimerController, TimerMetrics, TimerState, TimerStatus};
pub use utils::logging::init_logging;
