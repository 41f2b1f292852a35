//! Mitigation expiry sweep.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use warden_engine::BatchExecutor;
use warden_task::{
    Record, RecordDisposition, RecordError, RecordOperation, RecordQuery, StoreSession,
    TaskAdapter, TaskContext, TaskError, TaskMetadata, TaskReport,
};

use crate::service::MitigationService;

/// Outcome attribute: mitigations expired this run.
pub const ATTR_MITIGATIONS_EXPIRED: &str = "mitigations_expired";

const CATEGORY: &str = "mitigation";

/// Expires lapsed risk mitigations.
///
/// A half-swept mitigation set leaves violations suppressed past their
/// grace period, so this task does not honor termination requests; the
/// sweep is short and runs to the end once started.
pub struct MitigationExpirationTask {
    meta: TaskMetadata,
    executor: Arc<BatchExecutor>,
    service: Arc<dyn MitigationService>,
}

impl MitigationExpirationTask {
    /// Create the task over a batch executor and a mitigation service.
    pub fn new(executor: Arc<BatchExecutor>, service: Arc<dyn MitigationService>) -> Self {
        Self {
            meta: TaskMetadata::new(
                "mitigation_expiration",
                "Mitigation Expiration",
                "Expires risk mitigations whose grace period has lapsed",
            )
            .with_category("housekeeping"),
            executor,
            service,
        }
    }
}

#[async_trait]
impl TaskAdapter for MitigationExpirationTask {
    fn metadata(&self) -> &TaskMetadata {
        &self.meta
    }

    async fn execute(&self, ctx: &TaskContext) -> Result<TaskReport, TaskError> {
        let op = ExpireOp {
            service: Arc::clone(&self.service),
            expired: AtomicU64::new(0),
        };

        let mut report = self
            .executor
            .run(ctx, &RecordQuery::category(CATEGORY), &op)
            .await;
        report.outcome.set_attribute(
            ATTR_MITIGATIONS_EXPIRED,
            serde_json::json!(op.expired.load(Ordering::Relaxed)),
        );
        Ok(report)
    }

    fn supports_terminate(&self) -> bool {
        false
    }
}

impl fmt::Debug for MitigationExpirationTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MitigationExpirationTask")
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}

struct ExpireOp {
    service: Arc<dyn MitigationService>,
    expired: AtomicU64,
}

#[async_trait]
impl RecordOperation for ExpireOp {
    async fn process(
        &self,
        record: &Record,
        session: &dyn StoreSession,
        _ctx: &TaskContext,
    ) -> Result<RecordDisposition, RecordError> {
        if !self.service.expire(record).await? {
            return Ok(RecordDisposition::Skipped);
        }
        let mut updated = record.clone();
        updated.payload["expired"] = serde_json::json!(true);
        session.save(updated)?;
        self.expired.fetch_add(1, Ordering::Relaxed);
        Ok(RecordDisposition::Processed)
    }

    fn describe(&self, record: &Record) -> String {
        format!("Expiring mitigation {}", record.name)
    }
}
