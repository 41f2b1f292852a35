//! Identity risk score refresh task.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use warden_engine::BatchExecutor;
use warden_task::{
    Record, RecordDisposition, RecordError, RecordOperation, RecordQuery, StoreSession,
    TaskAdapter, TaskContext, TaskError, TaskMetadata, TaskReport,
};

use crate::service::ScoringService;

/// Outcome attribute: identities whose refreshed score is High or Critical.
pub const ATTR_HIGH_RISK_IDENTITIES: &str = "high_risk_identities";

const CATEGORY: &str = "identity";

/// Recomputes the composite risk score for every identity.
///
/// Every identity gets a fresh score written back; the outcome additionally
/// counts how many landed in an elevated band so operators can gauge drift
/// without opening individual records.
pub struct IdentityScoringTask {
    meta: TaskMetadata,
    executor: Arc<BatchExecutor>,
    service: Arc<dyn ScoringService>,
}

impl IdentityScoringTask {
    /// Create the task over a batch executor and a scoring service.
    pub fn new(executor: Arc<BatchExecutor>, service: Arc<dyn ScoringService>) -> Self {
        Self {
            meta: TaskMetadata::new(
                "identity_score_refresh",
                "Identity Score Refresh",
                "Recomputes composite risk scores for all identities",
            )
            .with_category("identities"),
            executor,
            service,
        }
    }
}

#[async_trait]
impl TaskAdapter for IdentityScoringTask {
    fn metadata(&self) -> &TaskMetadata {
        &self.meta
    }

    async fn execute(&self, ctx: &TaskContext) -> Result<TaskReport, TaskError> {
        let op = ScoreOp {
            service: Arc::clone(&self.service),
            elevated: AtomicU64::new(0),
        };

        let mut report = self
            .executor
            .run(ctx, &RecordQuery::category(CATEGORY), &op)
            .await;
        report.outcome.set_attribute(
            ATTR_HIGH_RISK_IDENTITIES,
            serde_json::json!(op.elevated.load(Ordering::Relaxed)),
        );
        Ok(report)
    }
}

impl fmt::Debug for IdentityScoringTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityScoringTask")
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}

struct ScoreOp {
    service: Arc<dyn ScoringService>,
    elevated: AtomicU64,
}

#[async_trait]
impl RecordOperation for ScoreOp {
    async fn process(
        &self,
        record: &Record,
        session: &dyn StoreSession,
        _ctx: &TaskContext,
    ) -> Result<RecordDisposition, RecordError> {
        let score = self.service.score(record).await?;

        let mut updated = record.clone();
        updated.payload["risk_score"] =
            serde_json::to_value(score).map_err(|err| RecordError::fatal(err.to_string()))?;
        session.save(updated)?;

        if score.is_elevated() {
            self.elevated.fetch_add(1, Ordering::Relaxed);
        }
        Ok(RecordDisposition::Processed)
    }

    fn describe(&self, record: &Record) -> String {
        format!("Scoring {}", record.name)
    }
}
