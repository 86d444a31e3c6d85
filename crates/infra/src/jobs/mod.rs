//! Long-running job queue.
//!
//! Handlers that start work too slow for a request (payroll runs) enqueue a
//! [`Job`] here and return immediately. Jobs are organization-scoped; the
//! [`PayrollRunWorker`] claims pending runs in the background and completes
//! them.

pub mod store;
pub mod types;
pub mod worker;

pub use store::{InMemoryJobStore, JobStats, JobStore, JobStoreError};
pub use types::{Job, JobId, JobKind, JobStatus};
pub use worker::{PayrollRunError, PayrollRunWorker, PayrollWorkerConfig, PayrollWorkerHandle, WorkerStats};
