use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use sovereign_commands::{Action, ExecutionOutcome, Target};

use super::{NON_COLUMN_KEYS, insert_scoped, list_scoped, record_from_payload, unsupported};
use crate::command_dispatcher::{ExecutionError, ExecutionHandler};
use crate::store::{DataStore, Table};
use crate::validator::ApprovedCommand;

pub struct TimeEntryHandler {
    store: Arc<dyn DataStore>,
}

impl TimeEntryHandler {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ExecutionHandler for TimeEntryHandler {
    fn target(&self) -> Target {
        Target::TimeEntry
    }

    async fn execute(&self, command: &mut ApprovedCommand) -> Result<ExecutionOutcome, ExecutionError> {
        match command.action() {
            Action::Create => {
                let record = record_from_payload(command.payload(), NON_COLUMN_KEYS);
                let stored = insert_scoped(self.store.as_ref(), Table::TimeEntries, command, record).await?;
                if let Some(id) = stored.get("id") {
                    command.payload_mut().insert("timeEntryId", id.clone());
                }
                Ok(ExecutionOutcome::success("Time entry recorded").with_data(JsonValue::Object(stored)))
            }
            Action::Read => {
                let rows = list_scoped(self.store.as_ref(), Table::TimeEntries, command).await?;
                Ok(ExecutionOutcome::success(format!("Found {} time entries", rows.len()))
                    .with_data(JsonValue::Array(rows.into_iter().map(JsonValue::Object).collect())))
            }
            _ => Ok(unsupported(command)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::handlers::testing::approved;
    use crate::store::InMemoryDataStore;

    #[tokio::test]
    async fn create_then_read() {
        let handler = TimeEntryHandler::new(Arc::new(InMemoryDataStore::new()));

        let mut create = approved(
            Action::Create,
            Target::TimeEntry,
            json!({ "employeeId": "EMP-1", "date": "2025-03-03", "hours": 7.5 }),
        );
        let outcome = handler.execute(&mut create).await.unwrap();
        assert_eq!(outcome.data.unwrap()["hours"], json!(7.5));
        assert!(create.payload().get("timeEntryId").is_some());

        let mut read = approved(Action::Read, Target::TimeEntry, json!({}));
        let outcome = handler.execute(&mut read).await.unwrap();
        assert_eq!(outcome.message, "Found 1 time entries");
    }

    #[tokio::test]
    async fn update_is_unsupported() {
        let handler = TimeEntryHandler::new(Arc::new(InMemoryDataStore::new()));
        let mut command = approved(Action::Update, Target::TimeEntry, json!({}));
        assert!(!handler.execute(&mut command).await.unwrap().success);
    }
}
