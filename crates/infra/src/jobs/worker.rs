//! Background worker that runs queued payroll jobs.
//!
//! A run drafts one paystub per active employee of the organization for the
//! job's pay period. Jobs end `completed` or `failed`; a failed job keeps the
//! error text in its status.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde_json::{Value as JsonValue, json};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use sovereign_core::OrganizationId;

use super::store::{JobStore, JobStoreError};
use super::types::{Job, JobKind, JobStatus};
use crate::store::{DataStore, Filter, Record, StoreError, Table};

#[derive(Debug, Error)]
pub enum PayrollRunError {
    #[error("payroll job payload is missing {0}")]
    InvalidPayload(&'static str),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct PayrollWorkerConfig {
    /// Sleep between polls when the queue is empty.
    pub poll_interval: Duration,
    pub name: String,
}

impl Default for PayrollWorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(250),
            name: "payroll-worker".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct WorkerStats {
    pub jobs_processed: u64,
    pub jobs_succeeded: u64,
    pub jobs_failed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    succeeded: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> WorkerStats {
        let jobs_succeeded = self.succeeded.load(Ordering::Relaxed);
        let jobs_failed = self.failed.load(Ordering::Relaxed);
        WorkerStats {
            jobs_processed: jobs_succeeded + jobs_failed,
            jobs_succeeded,
            jobs_failed,
        }
    }
}

/// Handle to a spawned worker.
pub struct PayrollWorkerHandle {
    shutdown: CancellationToken,
    join: JoinHandle<()>,
    counters: Arc<Counters>,
}

impl PayrollWorkerHandle {
    pub fn stats(&self) -> WorkerStats {
        self.counters.snapshot()
    }

    /// Stop polling and wait for the in-flight job, if any, to finish.
    pub async fn shutdown(self) -> WorkerStats {
        self.shutdown.cancel();
        if let Err(error) = self.join.await {
            warn!(%error, "payroll worker task ended abnormally");
        }
        self.counters.snapshot()
    }
}

pub struct PayrollRunWorker {
    jobs: Arc<dyn JobStore>,
    store: Arc<dyn DataStore>,
}

impl PayrollRunWorker {
    pub fn new(jobs: Arc<dyn JobStore>, store: Arc<dyn DataStore>) -> Self {
        Self { jobs, store }
    }

    /// Claim and run the oldest pending payroll job.
    ///
    /// Returns the job in its final state, or `None` when the queue is empty.
    pub async fn run_once(&self) -> Result<Option<Job>, JobStoreError> {
        let Some(mut job) = self.jobs.claim_next(JobKind::PayrollRun)? else {
            return Ok(None);
        };
        debug!(job_id = %job.id, organization_id = %job.organization_id, "claimed payroll job");

        match self.execute(&job).await {
            Ok(drafted) => {
                info!(job_id = %job.id, drafted, "payroll run completed");
                job.mark_completed();
            }
            Err(error) => {
                warn!(job_id = %job.id, %error, "payroll run failed");
                job.mark_failed(error.to_string());
            }
        }
        self.jobs.update(&job)?;
        Ok(Some(job))
    }

    /// Draft paystubs for the job's period; returns how many were written.
    async fn execute(&self, job: &Job) -> Result<usize, PayrollRunError> {
        let period_start = period_field(&job.payload, "period_start")?;
        let period_end = period_field(&job.payload, "period_end")?;
        let organization = job.organization_id;

        let employees = self
            .store
            .select(Table::Employees, &Filter::organization(organization))
            .await?;

        let mut drafted = 0;
        for employee in employees.iter().filter(|row| is_active(row)) {
            let Some(employee_id) = employee.get("employee_id").or_else(|| employee.get("id")) else {
                continue;
            };
            let paystub = draft_paystub(organization, employee_id, &period_start, &period_end);
            self.store.insert(Table::Paystubs, paystub).await?;
            drafted += 1;
        }
        Ok(drafted)
    }

    /// Run until the handle is shut down, polling while the queue is empty.
    pub fn spawn(self, config: PayrollWorkerConfig) -> PayrollWorkerHandle {
        let shutdown = CancellationToken::new();
        let counters = Arc::new(Counters::default());
        let join = tokio::spawn(worker_loop(self, config, shutdown.clone(), counters.clone()));
        PayrollWorkerHandle {
            shutdown,
            join,
            counters,
        }
    }
}

async fn worker_loop(
    worker: PayrollRunWorker,
    config: PayrollWorkerConfig,
    shutdown: CancellationToken,
    counters: Arc<Counters>,
) {
    info!(worker = %config.name, "payroll worker started");

    while !shutdown.is_cancelled() {
        match worker.run_once().await {
            Ok(Some(job)) => {
                let counter = if job.status == JobStatus::Completed {
                    &counters.succeeded
                } else {
                    &counters.failed
                };
                counter.fetch_add(1, Ordering::Relaxed);
                continue;
            }
            Ok(None) => {}
            Err(error) => warn!(worker = %config.name, %error, "payroll queue unavailable"),
        }

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(config.poll_interval) => {}
        }
    }

    let stats = counters.snapshot();
    info!(
        worker = %config.name,
        processed = stats.jobs_processed,
        failed = stats.jobs_failed,
        "payroll worker stopped"
    );
}

fn period_field(payload: &JsonValue, key: &'static str) -> Result<String, PayrollRunError> {
    payload
        .get(key)
        .and_then(JsonValue::as_str)
        .map(str::to_string)
        .ok_or(PayrollRunError::InvalidPayload(key))
}

/// Employees without a status column count as active.
fn is_active(employee: &Record) -> bool {
    employee
        .get("status")
        .and_then(JsonValue::as_str)
        .is_none_or(|status| status == "active")
}

fn draft_paystub(
    organization: OrganizationId,
    employee_id: &JsonValue,
    period_start: &str,
    period_end: &str,
) -> Record {
    let mut record = Record::new();
    record.insert("organization_id".into(), json!(organization.get()));
    record.insert("employee_id".into(), employee_id.clone());
    record.insert("period_start".into(), json!(period_start));
    record.insert("period_end".into(), json!(period_end));
    record.insert("status".into(), json!("draft"));
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use sovereign_core::CallerId;

    use crate::jobs::InMemoryJobStore;
    use crate::store::InMemoryDataStore;

    const ORG: i64 = 7;

    fn employee(org: i64, employee_id: &str, status: &str) -> Record {
        let JsonValue::Object(row) = json!({
            "id": employee_id.to_lowercase(),
            "organization_id": org,
            "employee_id": employee_id,
            "status": status,
        }) else {
            unreachable!()
        };
        row
    }

    fn payroll_job(payload: JsonValue) -> Job {
        Job::new(OrganizationId::new(ORG), JobKind::PayrollRun, payload, CallerId::new("u-1"))
    }

    fn seeded_store() -> Arc<InMemoryDataStore> {
        let store = Arc::new(InMemoryDataStore::new());
        store.seed(Table::Employees, employee(ORG, "EMP-1", "active")).unwrap();
        store.seed(Table::Employees, employee(ORG, "EMP-2", "active")).unwrap();
        store.seed(Table::Employees, employee(ORG, "EMP-3", "terminated")).unwrap();
        store.seed(Table::Employees, employee(ORG + 1, "EMP-9", "active")).unwrap();
        store
    }

    #[tokio::test]
    async fn run_drafts_paystubs_for_active_employees() {
        let jobs = InMemoryJobStore::arc();
        let store = seeded_store();
        jobs.enqueue(payroll_job(json!({
            "organization_id": ORG,
            "period_start": "2025-01-01",
            "period_end": "2025-01-15",
        })))
        .unwrap();

        let worker = PayrollRunWorker::new(jobs.clone(), store.clone());
        let job = worker.run_once().await.unwrap().unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        let stubs = store
            .select(Table::Paystubs, &Filter::organization(OrganizationId::new(ORG)))
            .await
            .unwrap();
        assert_eq!(stubs.len(), 2);
        assert!(stubs.iter().all(|s| s["status"] == json!("draft")));
        assert!(stubs.iter().all(|s| s["period_end"] == json!("2025-01-15")));
        assert_eq!(store.count(Table::Paystubs), 2);

        let stored = jobs
            .list_by_status(OrganizationId::new(ORG), Some(JobStatus::Completed), 10)
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert!(worker.run_once().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn malformed_job_is_marked_failed() {
        let jobs = InMemoryJobStore::arc();
        let store = seeded_store();
        jobs.enqueue(payroll_job(json!({ "period_start": "2025-01-01" }))).unwrap();

        let job = PayrollRunWorker::new(jobs.clone(), store.clone())
            .run_once()
            .await
            .unwrap()
            .unwrap();

        assert!(matches!(&job.status, JobStatus::Failed { error } if error.contains("period_end")));
        assert_eq!(store.count(Table::Paystubs), 0);
        assert_eq!(jobs.stats().unwrap().failed, 1);
    }

    #[tokio::test]
    async fn spawned_worker_drains_the_queue() {
        let jobs = InMemoryJobStore::arc();
        let store = seeded_store();
        for start in ["2025-01-01", "2025-01-16"] {
            jobs.enqueue(payroll_job(json!({ "period_start": start, "period_end": "2025-01-31" })))
                .unwrap();
        }

        let handle = PayrollRunWorker::new(jobs.clone(), store.clone()).spawn(PayrollWorkerConfig {
            poll_interval: Duration::from_millis(10),
            name: "test-worker".into(),
        });
        for _ in 0..200 {
            if handle.stats().jobs_processed == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let stats = handle.shutdown().await;

        assert_eq!(stats, WorkerStats { jobs_processed: 2, jobs_succeeded: 2, jobs_failed: 0 });
        assert_eq!(jobs.stats().unwrap().completed, 2);
        assert_eq!(store.count(Table::Paystubs), 4);
    }
}
