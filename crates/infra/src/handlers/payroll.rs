use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value as JsonValue, json};

use sovereign_commands::{Action, ExecutionOutcome, Target, keys};

use super::{require_organization, unsupported};
use crate::command_dispatcher::{ExecutionError, ExecutionHandler};
use crate::jobs::{Job, JobKind, JobStore};
use crate::validator::ApprovedCommand;

/// Most recent payroll runs listed by READ.
const LIST_LIMIT: usize = 50;

/// Payroll runs: PROCESS enqueues a payroll job for the pay period, READ
/// lists the organization's runs.
pub struct PayrollHandler {
    jobs: Arc<dyn JobStore>,
}

impl PayrollHandler {
    pub fn new(jobs: Arc<dyn JobStore>) -> Self {
        Self { jobs }
    }

    fn process(&self, command: &mut ApprovedCommand) -> Result<ExecutionOutcome, ExecutionError> {
        let organization = require_organization(command)?;
        let payload = command.payload();
        let start = payload
            .str_field(keys::PERIOD_START)
            .ok_or(ExecutionError::MissingField("periodStart"))?
            .to_string();
        let end = payload
            .str_field(keys::PERIOD_END)
            .ok_or(ExecutionError::MissingField("periodEnd"))?
            .to_string();

        let job = Job::new(
            organization,
            JobKind::PayrollRun,
            json!({
                "organization_id": organization.get(),
                "period_start": start,
                "period_end": end,
            }),
            command.metadata().requested_by.clone(),
        );
        let job_id = self.jobs.enqueue(job)?;
        command.payload_mut().insert("jobId", json!(job_id.to_string()));

        Ok(
            ExecutionOutcome::success(format!("Payroll processing initiated for {start} to {end}"))
                .with_data(json!({ "jobId": job_id.to_string(), "status": "pending" })),
        )
    }

    fn read(&self, command: &ApprovedCommand) -> Result<ExecutionOutcome, ExecutionError> {
        let organization = require_organization(command)?;
        let runs: Vec<JsonValue> = self
            .jobs
            .list_by_status(organization, None, usize::MAX)?
            .into_iter()
            .rev()
            .take(LIST_LIMIT)
            .map(|job| {
                json!({
                    "jobId": job.id.to_string(),
                    "status": job.status.as_str(),
                    "period": job.payload,
                    "createdAt": job.created_at,
                })
            })
            .collect();

        Ok(ExecutionOutcome::success(format!("Found {} payroll runs", runs.len()))
            .with_data(JsonValue::Array(runs)))
    }
}

#[async_trait]
impl ExecutionHandler for PayrollHandler {
    fn target(&self) -> Target {
        Target::PayrollRun
    }

    async fn execute(&self, command: &mut ApprovedCommand) -> Result<ExecutionOutcome, ExecutionError> {
        match command.action() {
            Action::Process => self.process(command),
            Action::Read => self.read(command),
            _ => Ok(unsupported(command)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sovereign_core::OrganizationId;

    use crate::handlers::testing::{ORG, approved};
    use crate::jobs::{InMemoryJobStore, JobStatus};

    #[tokio::test]
    async fn process_enqueues_a_payroll_job() {
        let jobs = InMemoryJobStore::arc();
        let handler = PayrollHandler::new(jobs.clone());
        let mut command = approved(
            Action::Process,
            Target::PayrollRun,
            json!({ "periodStart": "2025-01-01", "periodEnd": "2025-01-15" }),
        );

        let outcome = handler.execute(&mut command).await.unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.message, "Payroll processing initiated for 2025-01-01 to 2025-01-15");
        let queued = jobs
            .list_by_status(OrganizationId::new(ORG), Some(JobStatus::Pending), 10)
            .unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].kind, JobKind::PayrollRun);
        assert_eq!(queued[0].payload["period_end"], json!("2025-01-15"));
        assert_eq!(
            command.payload().get("jobId"),
            Some(&json!(queued[0].id.to_string()))
        );
    }

    #[tokio::test]
    async fn process_requires_both_dates() {
        let handler = PayrollHandler::new(InMemoryJobStore::arc());
        let mut command = approved(Action::Process, Target::PayrollRun, json!({ "periodStart": "2025-01-01" }));
        let err = handler.execute(&mut command).await.unwrap_err();
        assert!(matches!(err, ExecutionError::MissingField("periodEnd")));
    }

    #[tokio::test]
    async fn read_lists_runs() {
        let jobs = InMemoryJobStore::arc();
        let handler = PayrollHandler::new(jobs);
        let mut process = approved(
            Action::Process,
            Target::PayrollRun,
            json!({ "periodStart": "2025-02-01", "periodEnd": "2025-02-15" }),
        );
        handler.execute(&mut process).await.unwrap();

        let mut read = approved(Action::Read, Target::PayrollRun, json!({}));
        let outcome = handler.execute(&mut read).await.unwrap();
        assert_eq!(outcome.message, "Found 1 payroll runs");
        assert_eq!(outcome.data.unwrap()[0]["status"], json!("pending"));
    }
}
