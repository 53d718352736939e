//! # SitePulse Scheduler
//!
//! Recurring scan definitions, the periodic due-check and the executor that
//! runs due scans. State is in memory only and is lost on restart.
//!
//! ## Architecture
//! ```text
//! ScanScheduler (DashMap<"user::url", ScanDefinition>)
//!   └── due_check(now) ── every check_interval_secs (spawn_scheduler)
//!         └── ScanJob ──mpsc──→ spawn_executor
//!                                 ├── execute(job)   one task per job
//!                                 └── on error/panic → Notifier (scan_error)
//! ```

pub mod definition;
pub mod engine;
pub mod interval;
pub mod runner;

pub use definition::{Interval, IntervalUnit, ScanDefinition};
pub use engine::{ScanJob, ScanScheduler, spawn_scheduler};
pub use interval::parse_recurrence;
pub use runner::spawn_executor;
