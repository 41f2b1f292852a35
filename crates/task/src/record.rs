//! Domain records and the queries that select them.

use serde::{Deserialize, Serialize};
use warden_core::RecordId;

/// One domain entity drawn from a record source.
///
/// The batch core treats records as opaque: `payload` carries whatever the
/// store materialized (an identity, a certification, a mitigation, an
/// account) and only the per-record operation interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Stable identifier within the store.
    pub id: RecordId,
    /// Human-readable name used in progress text and error messages.
    pub name: String,
    /// The materialized entity.
    pub payload: serde_json::Value,
}

impl Record {
    /// Create a record with a fresh identifier.
    #[must_use]
    pub fn new(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: RecordId::v4(),
            name: name.into(),
            payload,
        }
    }

    /// Replace the identifier (used when rehydrating from a store).
    #[must_use]
    pub fn with_id(mut self, id: RecordId) -> Self {
        self.id = id;
        self
    }
}

/// Selects the records a batch run iterates over.
///
/// `category` names the entity kind; `constraints` narrow the result set.
/// How constraints are compiled into an actual query is the store's
/// concern — the core only carries them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordQuery {
    /// Entity kind, e.g. `"identities"` or `"certifications"`.
    pub category: String,
    /// Named filter values, interpreted by the store.
    pub constraints: serde_json::Map<String, serde_json::Value>,
}

impl RecordQuery {
    /// Create a query over every record in a category.
    #[must_use]
    pub fn category(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            constraints: serde_json::Map::new(),
        }
    }

    /// Add a named constraint.
    #[must_use]
    pub fn with_constraint(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.constraints.insert(name.into(), value);
        self
    }

    /// Look up a constraint by name.
    #[must_use]
    pub fn constraint(&self, name: &str) -> Option<&serde_json::Value> {
        self.constraints.get(name)
    }
}
