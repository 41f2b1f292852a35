#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Warden Engine
//!
//! The batch run orchestrator for the Warden identity governance toolkit.
//!
//! This crate contains:
//! - [`BatchExecutor`] -- drives one run: streaming, cadenced commits,
//!   cache eviction, throttled progress, continue-on-error
//! - [`BatchConfig`] -- cadence and budget knobs, overridable per launch
//! - [`TaskHost`] -- adapter registry, launch surface, and cooperative
//!   termination of live runs
//! - [`EngineError`] -- registration and launch plumbing errors
//!
//! Runs never fail through panics or escaped errors: whatever happens,
//! the executor hands back a [`TaskReport`](warden_task::TaskReport).

pub mod error;
pub mod executor;
pub mod host;

pub use error::EngineError;
pub use executor::{
    ARG_COMMIT_EVERY, ARG_EVICTION_THRESHOLD, ARG_MAX_RECORD_FAILURES, BatchConfig, BatchExecutor,
};
pub use host::{ActiveRun, TaskHost};
