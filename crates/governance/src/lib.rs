#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Warden Governance
//!
//! Governance task adapters for the Warden batch engine:
//!
//! - **Certification activation** — moves a group's staged certifications to
//!   their active phase ([`CertificationActivationTask`])
//! - **Entitlement correlation** — recomputes identity entitlements
//!   ([`EntitlementCorrelationTask`])
//! - **Identity score refresh** — recomputes composite risk scores
//!   ([`IdentityScoringTask`])
//! - **Mitigation expiration** — expires lapsed mitigations, declines
//!   termination ([`MitigationExpirationTask`])
//! - **Account discovery** — enumerates and persists application accounts
//!   ([`AccountDiscoveryTask`])
//!
//! The adapters are thin by design: each validates its invocation
//! arguments, shapes a [`RecordQuery`](warden_task::RecordQuery), delegates
//! per-record work to a collaborator service trait from [`service`], and
//! decorates the finished outcome with task-specific attributes. Iteration,
//! commit cadence, eviction, progress, and cancellation all belong to the
//! batch executor.

pub mod certification;
pub mod correlation;
pub mod discovery;
pub mod mitigation;
pub mod scoring;
pub mod service;

pub use certification::{
    ARG_CERTIFICATION_GROUP, ATTR_CERTIFICATIONS_ACTIVATED, CertificationActivationTask,
};
pub use correlation::{ARG_APPLICATIONS, ATTR_ENTITLEMENTS_CORRELATED, EntitlementCorrelationTask};
pub use discovery::{ATTR_ACCOUNTS_DISCOVERED, AccountDiscoveryTask};
pub use mitigation::{ATTR_MITIGATIONS_EXPIRED, MitigationExpirationTask};
pub use scoring::{ATTR_HIGH_RISK_IDENTITIES, IdentityScoringTask};
pub use service::{
    CertificationService, CorrelationService, DiscoveryService, Entitlement, MAX_RISK_SCORE,
    MitigationService, RiskBand, RiskScore, ScoringService, ServiceError,
};
