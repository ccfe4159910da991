//! Comet liquidator core logic.
//!
//! This crate provides the absorb bot's pipeline:
//! - Borrower registry seeded from Withdraw history
//! - Staleness-based candidate selection
//! - Sequential margin refresh
//! - Batched absorb submission with registry reconciliation
//! - Poll loop orchestration with cooperative shutdown

mod borrower;
pub mod config;
mod refresher;
mod registry;
mod scanner;
mod selector;
mod submitter;

#[cfg(test)]
mod testing;

pub use borrower::BorrowerRecord;
pub use config::{BotConfig, ConfigError};
pub use refresher::refresh;
pub use registry::BorrowerRegistry;
pub use scanner::{CycleReport, Scanner, ScannerConfig, Tick};
pub use selector::{is_stale, select_candidates, STALENESS_THRESHOLD_BLOCKS};
pub use submitter::{apply_outcome, attempt_absorb, AbsorbOutcome};
