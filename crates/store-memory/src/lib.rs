#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Warden Store Memory
//!
//! In-memory [`RecordStore`](warden_task::RecordStore) backend.
//!
//! Holds records, progress snapshots, and reports in process memory, with
//! seed-order streaming and per-session operation journals. This is the
//! reference backend for tests and demos; it also carries fault injection
//! knobs so failure paths can be exercised deterministically.

pub mod session;
pub mod store;

pub use session::{MemorySession, SessionOp};
pub use store::MemoryStore;
