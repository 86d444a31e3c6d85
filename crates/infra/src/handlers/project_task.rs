use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value as JsonValue, json};

use sovereign_commands::{Action, ExecutionOutcome, Target, keys};

use super::{
    NON_COLUMN_KEYS, fetch_scoped, insert_scoped, list_scoped, record_from_payload, require_id,
    unsupported,
};
use crate::command_dispatcher::{ExecutionError, ExecutionHandler};
use crate::store::{DataStore, Table};
use crate::validator::ApprovedCommand;

/// Project tasks: CREATE, READ, UPDATE, DELETE.
pub struct ProjectTaskHandler {
    store: Arc<dyn DataStore>,
}

impl ProjectTaskHandler {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    async fn create(&self, command: &mut ApprovedCommand) -> Result<ExecutionOutcome, ExecutionError> {
        let mut exclude = NON_COLUMN_KEYS.to_vec();
        exclude.push(keys::TASK_ID);
        let mut record = record_from_payload(command.payload(), &exclude);
        record.entry("status").or_insert_with(|| json!("todo"));

        let stored = insert_scoped(self.store.as_ref(), Table::ProjectTasks, command, record).await?;
        if let Some(id) = stored.get("id") {
            command.payload_mut().insert("taskId", id.clone());
        }
        Ok(ExecutionOutcome::success("Project task created").with_data(JsonValue::Object(stored)))
    }

    async fn update(&self, command: &ApprovedCommand) -> Result<ExecutionOutcome, ExecutionError> {
        let id = require_id(command, keys::TASK_ID)?;
        let mut exclude = NON_COLUMN_KEYS.to_vec();
        exclude.push(keys::TASK_ID);
        let patch = record_from_payload(command.payload(), &exclude);
        if patch.is_empty() {
            return Ok(ExecutionOutcome::failure(format!("no fields to update on task {id}")));
        }

        fetch_scoped(self.store.as_ref(), Table::ProjectTasks, command, &id).await?;
        let stored = self.store.update(Table::ProjectTasks, &id, patch).await?;
        Ok(ExecutionOutcome::success(format!("Task {id} updated")).with_data(JsonValue::Object(stored)))
    }

    async fn delete(&self, command: &ApprovedCommand) -> Result<ExecutionOutcome, ExecutionError> {
        let id = require_id(command, keys::TASK_ID)?;
        fetch_scoped(self.store.as_ref(), Table::ProjectTasks, command, &id).await?;
        self.store.delete(Table::ProjectTasks, &id).await?;
        Ok(ExecutionOutcome::success(format!("Task {id} deleted")))
    }
}

#[async_trait]
impl ExecutionHandler for ProjectTaskHandler {
    fn target(&self) -> Target {
        Target::ProjectTask
    }

    async fn execute(&self, command: &mut ApprovedCommand) -> Result<ExecutionOutcome, ExecutionError> {
        match command.action() {
            Action::Create => self.create(command).await,
            Action::Read => {
                let rows = list_scoped(self.store.as_ref(), Table::ProjectTasks, command).await?;
                Ok(ExecutionOutcome::success(format!("Found {} tasks", rows.len()))
                    .with_data(JsonValue::Array(rows.into_iter().map(JsonValue::Object).collect())))
            }
            Action::Update => self.update(command).await,
            Action::Delete => self.delete(command).await,
            _ => Ok(unsupported(command)),
        }
    }
}
