//! Certification activation task.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use warden_engine::BatchExecutor;
use warden_task::{
    Record, RecordDisposition, RecordError, RecordOperation, RecordQuery, StoreSession,
    TaskAdapter, TaskContext, TaskError, TaskMetadata, TaskReport,
};

use crate::service::CertificationService;

/// Name of the required certification group argument.
pub const ARG_CERTIFICATION_GROUP: &str = "certification_group";

/// Outcome attribute: certifications moved to active this run.
pub const ATTR_CERTIFICATIONS_ACTIVATED: &str = "certifications_activated";

const CATEGORY: &str = "certification";

/// Activates every staged certification in one certification group.
///
/// Requires [`ARG_CERTIFICATION_GROUP`]; launching without it fails the run
/// before any record is drawn. Certifications the service reports as already
/// active are counted as skips.
pub struct CertificationActivationTask {
    meta: TaskMetadata,
    executor: Arc<BatchExecutor>,
    service: Arc<dyn CertificationService>,
}

impl CertificationActivationTask {
    /// Create the task over a batch executor and an activation service.
    pub fn new(executor: Arc<BatchExecutor>, service: Arc<dyn CertificationService>) -> Self {
        Self {
            meta: TaskMetadata::new(
                "certification_activation",
                "Certification Activation",
                "Moves staged certifications in a group to their active phase",
            )
            .with_category("certifications"),
            executor,
            service,
        }
    }
}

#[async_trait]
impl TaskAdapter for CertificationActivationTask {
    fn metadata(&self) -> &TaskMetadata {
        &self.meta
    }

    async fn execute(&self, ctx: &TaskContext) -> Result<TaskReport, TaskError> {
        let group = ctx.args().require_str(ARG_CERTIFICATION_GROUP)?;
        tracing::debug!(group, "activating certification group");

        let query =
            RecordQuery::category(CATEGORY).with_constraint("group", serde_json::json!(group));
        let op = ActivateOp {
            service: Arc::clone(&self.service),
            activated: AtomicU64::new(0),
        };

        let mut report = self.executor.run(ctx, &query, &op).await;
        report.outcome.set_attribute(
            ATTR_CERTIFICATIONS_ACTIVATED,
            serde_json::json!(op.activated.load(Ordering::Relaxed)),
        );
        Ok(report)
    }
}

impl fmt::Debug for CertificationActivationTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificationActivationTask")
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}

struct ActivateOp {
    service: Arc<dyn CertificationService>,
    activated: AtomicU64,
}

#[async_trait]
impl RecordOperation for ActivateOp {
    async fn process(
        &self,
        record: &Record,
        session: &dyn StoreSession,
        _ctx: &TaskContext,
    ) -> Result<RecordDisposition, RecordError> {
        if !self.service.activate(record).await? {
            return Ok(RecordDisposition::Skipped);
        }
        let mut updated = record.clone();
        updated.payload["phase"] = serde_json::json!("active");
        session.save(updated)?;
        self.activated.fetch_add(1, Ordering::Relaxed);
        Ok(RecordDisposition::Processed)
    }

    fn describe(&self, record: &Record) -> String {
        format!("Activating certification {}", record.name)
    }
}
