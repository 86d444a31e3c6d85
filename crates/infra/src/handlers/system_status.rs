use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tracing::warn;

use sovereign_commands::{Action, ExecutionOutcome, Target, keys};

use super::unsupported;
use crate::command_dispatcher::{ExecutionError, ExecutionHandler};
use crate::jobs::JobStore;
use crate::journal::ExecutionJournal;
use crate::validator::ApprovedCommand;

/// Reports pipeline health: registered handlers, journal statistics and
/// queued jobs.
///
/// Also the landing spot for the generation fallback (`PROCESS` with the
/// original intent in the payload).
pub struct SystemStatusHandler {
    journal: Arc<dyn ExecutionJournal>,
    jobs: Arc<dyn JobStore>,
    targets: Vec<Target>,
}

impl SystemStatusHandler {
    pub fn new(journal: Arc<dyn ExecutionJournal>, jobs: Arc<dyn JobStore>, targets: Vec<Target>) -> Self {
        Self {
            journal,
            jobs,
            targets,
        }
    }

    async fn report(&self, command: &ApprovedCommand) -> ExecutionOutcome {
        let stats = match self.journal.stats().await {
            Ok(stats) => Some(stats),
            Err(err) => {
                warn!(error = %err, "journal statistics unavailable");
                None
            }
        };
        let jobs = match self.jobs.stats() {
            Ok(jobs) => Some(jobs),
            Err(err) => {
                warn!(error = %err, "job statistics unavailable");
                None
            }
        };

        let mut message = format!("System operational: {} handlers registered", self.targets.len());
        if let Some(stats) = &stats {
            message.push_str(&format!(
                ", {} commands journaled ({:.0}% succeeded)",
                stats.total_commands,
                stats.success_rate * 100.0
            ));
        }

        ExecutionOutcome::success(message).with_data(json!({
            "timestamp": Utc::now(),
            "handlers": self.targets,
            "learning": stats,
            "jobs": jobs,
            "intent": command.payload().str_field(keys::INTENT),
        }))
    }
}

#[async_trait]
impl ExecutionHandler for SystemStatusHandler {
    fn target(&self) -> Target {
        Target::SystemStatus
    }

    async fn execute(&self, command: &mut ApprovedCommand) -> Result<ExecutionOutcome, ExecutionError> {
        match command.action() {
            Action::Read | Action::Process => Ok(self.report(command).await),
            _ => Ok(unsupported(command)),
        }
    }
}
