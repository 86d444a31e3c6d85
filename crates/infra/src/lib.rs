//! Infrastructure for the intent pipeline: validation gates, dispatch,
//! execution handlers, storage adapters and the orchestrator that ties
//! them together.

pub mod command_dispatcher;
pub mod config;
pub mod handlers;
pub mod jobs;
pub mod journal;
pub mod llm;
pub mod orchestrator;
pub mod pipeline;
pub mod roles;
pub mod store;
pub mod validator;


pub use command_dispatcher::{
    CommandDispatcher, DispatchReport, ExecutionError, ExecutionHandler, HandlerRegistry,
};
pub use config::{CompletionConfig, ConfigError, PipelineConfig};
pub use jobs::{PayrollRunWorker, PayrollWorkerConfig, PayrollWorkerHandle};
pub use journal::{ExecutionJournal, InMemoryJournal, JournalEntry, JournalStats};
pub use llm::HttpCompletionClient;
pub use orchestrator::{OrchestrationResult, Orchestrator};
pub use pipeline::PipelineParts;
pub use roles::PgRoleDirectory;
pub use store::{DataStore, InMemoryDataStore, PgDataStore, StoreError, Table};
pub use validator::{ApprovedCommand, Validator, Verdict};
