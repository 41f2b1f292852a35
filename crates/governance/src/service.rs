//! Collaborator service boundaries.
//!
//! The adapters in this crate are deliberately thin: real governance logic
//! (certification state machines, correlation algorithms, scoring formulas)
//! lives behind these traits, provided by the deployment. The adapters only
//! decide how a service result maps onto batch semantics.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use warden_task::{Record, RecordError};

/// Maximum composite risk score.
pub const MAX_RISK_SCORE: u32 = 1000;

/// Failures surfaced by collaborator services.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// The backing system could not be reached right now.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// The record's data cannot be operated on.
    #[error("invalid record: {0}")]
    Invalid(String),

    /// The backing system's state is inconsistent with ours.
    #[error("integrity failure: {0}")]
    Integrity(String),
}

/// Integrity failures abort the batch; everything else affects only the
/// record at hand.
impl From<ServiceError> for RecordError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Integrity(_) => Self::fatal(err.to_string()),
            ServiceError::Unavailable(_) | ServiceError::Invalid(_) => {
                Self::recoverable(err.to_string())
            }
        }
    }
}

/// One entitlement held by an identity on an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entitlement {
    /// Application the entitlement lives on.
    pub application: String,
    /// Attribute carrying the entitlement, e.g. `memberOf`.
    pub attribute: String,
    /// Granted value.
    pub value: String,
}

impl Entitlement {
    /// Create an entitlement.
    pub fn new(
        application: impl Into<String>,
        attribute: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            application: application.into(),
            attribute: attribute.into(),
            value: value.into(),
        }
    }
}

/// Risk band a score falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskBand {
    /// Below 250.
    Low,
    /// 250 to 499.
    Medium,
    /// 500 to 749.
    High,
    /// 750 and above.
    Critical,
}

/// A composite identity risk score on a 0..=[`MAX_RISK_SCORE`] scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskScore {
    /// Composite score value.
    pub value: u32,
    /// Band the value falls into.
    pub band: RiskBand,
}

impl RiskScore {
    /// Create a score, clamping to the scale and deriving the band.
    #[must_use]
    pub fn new(value: u32) -> Self {
        let value = value.min(MAX_RISK_SCORE);
        let band = match value {
            0..=249 => RiskBand::Low,
            250..=499 => RiskBand::Medium,
            500..=749 => RiskBand::High,
            _ => RiskBand::Critical,
        };
        Self { value, band }
    }

    /// Returns `true` for scores that warrant operator attention.
    #[must_use]
    pub fn is_elevated(&self) -> bool {
        matches!(self.band, RiskBand::High | RiskBand::Critical)
    }
}

/// Moves staged certifications into their active phase.
#[async_trait]
pub trait CertificationService: Send + Sync {
    /// Activate one certification.
    ///
    /// Returns `false` when the certification is already active, which the
    /// adapter reports as a skip rather than a success.
    async fn activate(&self, certification: &Record) -> Result<bool, ServiceError>;
}

/// Correlates an identity's accounts into entitlements.
#[async_trait]
pub trait CorrelationService: Send + Sync {
    /// Compute the identity's current entitlements.
    async fn correlate(&self, identity: &Record) -> Result<Vec<Entitlement>, ServiceError>;
}

/// Computes composite identity risk scores.
#[async_trait]
pub trait ScoringService: Send + Sync {
    /// Score one identity.
    async fn score(&self, identity: &Record) -> Result<RiskScore, ServiceError>;
}

/// Expires lapsed risk mitigations.
#[async_trait]
pub trait MitigationService: Send + Sync {
    /// Expire one mitigation.
    ///
    /// Returns `false` when the mitigation is not yet due.
    async fn expire(&self, mitigation: &Record) -> Result<bool, ServiceError>;
}

/// Enumerates the accounts present on an application.
#[async_trait]
pub trait DiscoveryService: Send + Sync {
    /// List the application's accounts as records ready to persist.
    async fn scan(&self, application: &Record) -> Result<Vec<Record>, ServiceError>;
}
