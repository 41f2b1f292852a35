//! Unique identifiers for Warden entities.
//!
//! This module provides strongly-typed UUID identifiers using
//! [`domain-key`](https://crates.io/crates/domain-key) `Uuid<D>` wrappers.
//! Each identifier type is parameterized by a unique domain marker,
//! providing compile-time type safety that prevents mixing different ID types.
//!
//! All ID types are `Copy` (16 bytes, stack-allocated) and support:
//! - `v4()` for random UUID generation
//! - `nil()` for zero-valued default
//! - `parse(&str)` for string parsing
//! - Full serde support (serializes as UUID string)
//! - `Display`, `FromStr`, `Eq`, `Ord`, `Hash`

use domain_key::define_uuid;

// Re-export for downstream parse error handling
pub use domain_key::UuidParseError;

// Entity identifiers — UUID-based, Copy, 16 bytes each
define_uuid!(pub TaskIdDomain => TaskId);
define_uuid!(pub RunIdDomain => RunId);
define_uuid!(pub RecordIdDomain => RecordId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_id_v4_creates_non_nil_uuid() {
        let id = TaskId::v4();
        assert!(!id.is_nil());
    }

    #[test]
    fn run_id_v4_creates_non_nil_uuid() {
        let id = RunId::v4();
        assert!(!id.is_nil());
    }

    #[test]
    fn record_id_v4_creates_non_nil_uuid() {
        let id = RecordId::v4();
        assert!(!id.is_nil());
    }

    #[test]
    fn id_nil_creates_zero_valued_uuid() {
        let id = RunId::nil();
        assert!(id.is_nil());
        assert_eq!(id.to_string(), "00000000-0000-0000-0000-000000000000");
    }

    #[test]
    fn id_parse_valid_uuid_string_succeeds() {
        let id = RunId::parse("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert!(!id.is_nil());
        assert_eq!(id.to_string(), "550e8400-e29b-41d4-a716-446655440000");
    }

    #[test]
    fn id_parse_invalid_string_returns_error() {
        let result = RunId::parse("not-a-uuid");
        assert!(result.is_err());
    }

    #[test]
    fn id_serde_roundtrip_as_string() {
        let id = RecordId::v4();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));

        let back: RecordId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn ids_with_same_uuid_are_distinct_types() {
        // Compile-time property: a RunId cannot be passed where a TaskId is
        // expected. At runtime we can only check value independence.
        let a = RunId::v4();
        let b = RunId::v4();
        assert_ne!(a, b);
    }
}
