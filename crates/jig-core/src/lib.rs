//! jig-core - test orchestration engine for the JIG self-test harness
//!
//! The moving parts of a run:
//! - A fixed, ordered registry of check items (single source of truth)
//! - Concurrent check workers, one per hardware domain
//! - A single-slot IR remote event bus, drained once per loop
//! - The header pattern engine
//! - A watchdog bounding the whole run with a global countdown
//! - The sequencer tying bootstrap and the steady-state loop together
//!
//! Concurrency discipline: every item has exactly one writer task, so
//! the registry needs per-item atomics for visibility and nothing else.
//!
//! # Example
//!
//! ```rust,ignore
//! use jig_core::{HarnessConfig, RunOutcome, Sequencer};
//!
//! # async fn example(fixture: jig_core::Fixture) -> Result<(), jig_core::HarnessError> {
//! let sequencer = Sequencer::new(HarnessConfig::new(), fixture);
//! match sequencer.run().await? {
//!     RunOutcome::Finished(summary) => println!("verdict: {:?}", summary.verdict),
//!     RunOutcome::Restart => println!("operator requested restart"),
//! }
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod config;
pub mod error;
pub mod event;
pub mod fixture;
pub mod item;
pub mod pattern;
pub mod report;
pub mod scoreboard;
pub mod state;
pub mod watchdog;
pub mod workers;

mod sequencer;

pub use config::{ConfigError, HarnessConfig};
pub use error::HarnessError;
pub use event::{event_bus, map_key, EventBus, EventTap, RemoteEvent};
pub use fixture::Fixture;
pub use item::{CheckId, CheckItem, Outcome, Registry, Status};
pub use pattern::{classify, PatternEngine, DRIVEN, PATTERN_COUNT};
pub use report::{wrap_names, RunSummary, Verdict};
pub use scoreboard::Scoreboard;
pub use state::RunState;
pub use sequencer::{format_identity, RunOutcome, Sequencer};
pub use watchdog::Watchdog;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
