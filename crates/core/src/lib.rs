#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Warden Core
//!
//! Core identifiers and keys for the Warden task toolkit.
//! This crate provides the fundamental vocabulary used by all other Warden crates.
//!
//! ## Key Components
//!
//! - **Identifiers**: [`TaskId`], [`RunId`], [`RecordId`] — strongly-typed UUIDs
//! - **Keys**: [`TaskKey`] — normalized, validated registry keys for task types
//!
//! ## Usage
//!
//! ```rust
//! use warden_core::{RunId, TaskKey};
//!
//! let run_id = RunId::v4();
//! let key: TaskKey = "Certification Activation".parse().unwrap();
//! assert_eq!(key.as_str(), "certification_activation");
//! ```

pub mod id;
pub mod keys;

pub use id::*;
pub use keys::*;

/// Common prelude for Warden crates.
pub mod prelude {
    pub use super::{RecordId, RunId, TaskId, TaskKey, TaskKeyError, UuidParseError};
}
