#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Warden Telemetry
//!
//! Event bus, metrics, and logging for the Warden task toolkit.
//!
//! This crate provides:
//! - [`EventBus`] -- broadcast-based event distribution
//! - [`TaskEvent`] -- task run lifecycle events
//! - [`MetricsRegistry`] -- in-memory counters, gauges, and histograms
//! - [`logging`] -- global `tracing` subscriber setup
//!
//! Events and metrics are **projections**, not the source of truth.
//! The persisted task report is the single source of truth.

pub mod event;
pub mod logging;
pub mod metrics;

pub use event::{EventBus, TaskEvent, TaskEventSubscriber};
pub use logging::{LogConfig, LoggingError};
pub use metrics::{Counter, Gauge, Histogram, MetricsRegistry};
