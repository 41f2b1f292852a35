//! Application account discovery task.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use warden_engine::BatchExecutor;
use warden_task::{
    Record, RecordDisposition, RecordError, RecordOperation, RecordQuery, StoreSession,
    TaskAdapter, TaskContext, TaskError, TaskMetadata, TaskReport,
};

use crate::service::DiscoveryService;

/// Outcome attribute: accounts discovered across all applications this run.
pub const ATTR_ACCOUNTS_DISCOVERED: &str = "accounts_discovered";

const CATEGORY: &str = "application";

/// Scans each application and persists the accounts found on it.
///
/// The record set here is applications, not accounts: one record per
/// application yields a batch of account records, all staged into the same
/// unit of work so a whole application's accounts commit together.
pub struct AccountDiscoveryTask {
    meta: TaskMetadata,
    executor: Arc<BatchExecutor>,
    service: Arc<dyn DiscoveryService>,
}

impl AccountDiscoveryTask {
    /// Create the task over a batch executor and a discovery service.
    pub fn new(executor: Arc<BatchExecutor>, service: Arc<dyn DiscoveryService>) -> Self {
        Self {
            meta: TaskMetadata::new(
                "account_discovery",
                "Account Discovery",
                "Enumerates and persists the accounts present on each application",
            )
            .with_category("applications"),
            executor,
            service,
        }
    }
}

#[async_trait]
impl TaskAdapter for AccountDiscoveryTask {
    fn metadata(&self) -> &TaskMetadata {
        &self.meta
    }

    async fn execute(&self, ctx: &TaskContext) -> Result<TaskReport, TaskError> {
        let op = ScanOp {
            service: Arc::clone(&self.service),
            accounts: AtomicU64::new(0),
        };

        let mut report = self
            .executor
            .run(ctx, &RecordQuery::category(CATEGORY), &op)
            .await;
        report.outcome.set_attribute(
            ATTR_ACCOUNTS_DISCOVERED,
            serde_json::json!(op.accounts.load(Ordering::Relaxed)),
        );
        Ok(report)
    }
}

impl fmt::Debug for AccountDiscoveryTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountDiscoveryTask")
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}

struct ScanOp {
    service: Arc<dyn DiscoveryService>,
    accounts: AtomicU64,
}

#[async_trait]
impl RecordOperation for ScanOp {
    async fn process(
        &self,
        record: &Record,
        session: &dyn StoreSession,
        _ctx: &TaskContext,
    ) -> Result<RecordDisposition, RecordError> {
        let accounts = self.service.scan(record).await?;
        if accounts.is_empty() {
            return Ok(RecordDisposition::Skipped);
        }

        let count = accounts.len() as u64;
        for account in accounts {
            session.save(account)?;
        }
        self.accounts.fetch_add(count, Ordering::Relaxed);
        Ok(RecordDisposition::Processed)
    }

    fn describe(&self, record: &Record) -> String {
        format!("Scanning application {}", record.name)
    }
}
