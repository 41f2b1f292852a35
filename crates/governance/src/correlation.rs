//! Entitlement correlation task.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use warden_engine::BatchExecutor;
use warden_task::{
    Record, RecordDisposition, RecordError, RecordOperation, RecordQuery, StoreSession,
    TaskAdapter, TaskContext, TaskError, TaskMetadata, TaskReport,
};

use crate::service::CorrelationService;

/// Optional argument: restrict correlation to identities on these
/// applications. Accepts a JSON array or a comma-separated string.
pub const ARG_APPLICATIONS: &str = "applications";

/// Outcome attribute: total entitlements written this run.
pub const ATTR_ENTITLEMENTS_CORRELATED: &str = "entitlements_correlated";

const CATEGORY: &str = "identity";

/// Recomputes entitlements for every identity in scope.
///
/// With [`ARG_APPLICATIONS`] set, only identities whose `application` field
/// matches one of the given names are drawn. Identities the service resolves
/// to an empty entitlement set are skipped without a write.
pub struct EntitlementCorrelationTask {
    meta: TaskMetadata,
    executor: Arc<BatchExecutor>,
    service: Arc<dyn CorrelationService>,
}

impl EntitlementCorrelationTask {
    /// Create the task over a batch executor and a correlation service.
    pub fn new(executor: Arc<BatchExecutor>, service: Arc<dyn CorrelationService>) -> Self {
        Self {
            meta: TaskMetadata::new(
                "entitlement_correlation",
                "Entitlement Correlation",
                "Recomputes identity entitlements from their correlated accounts",
            )
            .with_category("identities"),
            executor,
            service,
        }
    }
}

#[async_trait]
impl TaskAdapter for EntitlementCorrelationTask {
    fn metadata(&self) -> &TaskMetadata {
        &self.meta
    }

    async fn execute(&self, ctx: &TaskContext) -> Result<TaskReport, TaskError> {
        let mut query = RecordQuery::category(CATEGORY);
        if let Some(applications) = ctx.args().get_str_list(ARG_APPLICATIONS)
            && !applications.is_empty()
        {
            tracing::debug!(?applications, "correlation restricted to applications");
            query = query.with_constraint(
                "application",
                serde_json::Value::Array(
                    applications.into_iter().map(serde_json::Value::String).collect(),
                ),
            );
        }

        let op = CorrelateOp {
            service: Arc::clone(&self.service),
            entitlements: AtomicU64::new(0),
        };

        let mut report = self.executor.run(ctx, &query, &op).await;
        report.outcome.set_attribute(
            ATTR_ENTITLEMENTS_CORRELATED,
            serde_json::json!(op.entitlements.load(Ordering::Relaxed)),
        );
        Ok(report)
    }
}

impl fmt::Debug for EntitlementCorrelationTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntitlementCorrelationTask")
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}

struct CorrelateOp {
    service: Arc<dyn CorrelationService>,
    entitlements: AtomicU64,
}

#[async_trait]
impl RecordOperation for CorrelateOp {
    async fn process(
        &self,
        record: &Record,
        session: &dyn StoreSession,
        _ctx: &TaskContext,
    ) -> Result<RecordDisposition, RecordError> {
        let entitlements = self.service.correlate(record).await?;
        if entitlements.is_empty() {
            return Ok(RecordDisposition::Skipped);
        }

        let mut updated = record.clone();
        updated.payload["entitlements"] = serde_json::to_value(&entitlements)
            .map_err(|err| RecordError::fatal(err.to_string()))?;
        session.save(updated)?;

        self.entitlements
            .fetch_add(entitlements.len() as u64, Ordering::Relaxed);
        Ok(RecordDisposition::Processed)
    }

    fn describe(&self, record: &Record) -> String {
        format!("Correlating entitlements for {}", record.name)
    }
}
