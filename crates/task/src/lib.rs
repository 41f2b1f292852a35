#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Warden Task
//!
//! Batch task execution primitives for the Warden identity governance
//! toolkit.
//!
//! This crate models everything a batch run is made of — it does NOT contain
//! the orchestrator. It defines:
//!
//! - [`RunStatus`] — run-level state machine validated by [`status`]
//! - [`TaskContext`] — per-run context with arguments and cancellation
//! - [`TaskArgs`] — loosely-typed launch arguments with coercing accessors
//! - [`Record`] and [`RecordQuery`] — governed objects and how to select them
//! - [`RecordSource`], [`RecordStore`], [`StoreSession`] — streaming store seams
//! - [`RecordOperation`] — per-record work contributed by task adapters
//! - [`ProgressMonitor`] — throttled, bounded progress reporting
//! - [`CacheEvictor`] — periodic session cache eviction for flat memory
//! - [`TaskOutcome`] and [`TaskReport`] — accumulated results of a run
//! - [`TaskAdapter`] — the contract a runnable task implements

pub mod adapter;
pub mod args;
pub mod context;
pub mod error;
pub mod evictor;
pub mod operation;
pub mod outcome;
pub mod progress;
pub mod record;
pub mod report;
pub mod source;
pub mod status;
pub mod store;

pub use adapter::{TaskAdapter, TaskMetadata};
pub use args::TaskArgs;
pub use context::TaskContext;
pub use error::{RecordError, StoreError, TaskError};
pub use evictor::{CacheEvictor, DEFAULT_EVICTION_THRESHOLD};
pub use operation::{RecordDisposition, RecordOperation};
pub use outcome::{
    ATTR_RECORDS_FAILED, ATTR_RECORDS_PROCESSED, ATTR_RECORDS_SKIPPED, MessageKind, TaskMessage,
    TaskOutcome,
};
pub use progress::{
    DEFAULT_PERSIST_INTERVAL, DEFAULT_STATUS_CAP, ProgressMonitor, ProgressSink, ProgressSnapshot,
    TRUNCATION_MARKER, truncate_status,
};
pub use record::{Record, RecordQuery};
pub use report::TaskReport;
pub use source::{RecordSource, VecSource};
pub use status::{RunStatus, can_transition, validate_transition};
pub use store::{RecordStore, StoreSession};
