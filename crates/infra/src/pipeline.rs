//! Wiring: collaborators → [`Orchestrator`].

use std::sync::Arc;

use sqlx::PgPool;
use tracing::{info, warn};

use sovereign_ai::{CommandGenerator, CompletionService, UnavailableCompletion};
use sovereign_auth::{InMemoryRoleDirectory, RoleLookup};

use crate::command_dispatcher::CommandDispatcher;
use crate::config::PipelineConfig;
use crate::handlers::default_registry;
use crate::jobs::{InMemoryJobStore, JobStore, PayrollRunWorker};
use crate::journal::{ExecutionJournal, InMemoryJournal};
use crate::llm::HttpCompletionClient;
use crate::orchestrator::Orchestrator;
use crate::roles::PgRoleDirectory;
use crate::store::{DataStore, InMemoryDataStore, PgDataStore, StoreError};
use crate::validator::Validator;

/// The injectable collaborators of one pipeline.
#[derive(Clone)]
pub struct PipelineParts {
    pub completion: Arc<dyn CompletionService>,
    pub roles: Arc<dyn RoleLookup>,
    pub store: Arc<dyn DataStore>,
    pub jobs: Arc<dyn JobStore>,
    pub journal: Arc<dyn ExecutionJournal>,
}

impl PipelineParts {
    /// In-memory adapters around `completion` (tests/dev).
    pub fn in_memory(completion: Arc<dyn CompletionService>, roles: Arc<dyn RoleLookup>) -> Self {
        Self {
            completion,
            roles,
            store: Arc::new(InMemoryDataStore::new()),
            jobs: InMemoryJobStore::arc(),
            journal: Arc::new(InMemoryJournal::new()),
        }
    }

    /// Adapters selected by `config`: Postgres when `database_url` is set,
    /// HTTP completion when an API key is set.
    pub async fn from_config(config: &PipelineConfig) -> Result<Self, StoreError> {
        let completion: Arc<dyn CompletionService> = match &config.completion {
            Some(completion) => {
                info!(model = %completion.model, url = %completion.api_url, "completion service configured");
                Arc::new(HttpCompletionClient::new(completion.clone()))
            }
            None => {
                warn!("LLM_API_KEY not set; every intent will resolve to the fallback command");
                Arc::new(UnavailableCompletion::new("LLM_API_KEY not set"))
            }
        };

        let mut parts = Self::in_memory(completion, Arc::new(InMemoryRoleDirectory::new()));
        match &config.database_url {
            Some(url) => {
                let pool = PgPool::connect(url)
                    .await
                    .map_err(|e| StoreError::Unavailable(e.to_string()))?;
                info!("using postgres data store and role directory");
                parts.roles = Arc::new(PgRoleDirectory::new(pool.clone()));
                parts.store = Arc::new(PgDataStore::new(pool));
            }
            None => warn!("DATABASE_URL not set; using in-memory stores with an empty role directory"),
        }
        Ok(parts)
    }

    /// Background worker draining the payroll runs this pipeline enqueues.
    pub fn payroll_worker(&self) -> PayrollRunWorker {
        PayrollRunWorker::new(self.jobs.clone(), self.store.clone())
    }

    pub fn build(self) -> Orchestrator {
        let registry = default_registry(self.store.clone(), self.jobs, self.journal.clone());
        Orchestrator::new(
            CommandGenerator::new(self.completion),
            Validator::new(self.roles, self.store),
            CommandDispatcher::new(registry),
        )
        .with_journal(self.journal)
    }
}
