use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value as JsonValue, json};

use sovereign_commands::{Action, ExecutionOutcome, Target, keys};

use super::{
    NON_COLUMN_KEYS, fetch_scoped, insert_scoped, list_scoped, record_from_payload, require_id,
    unsupported,
};
use crate::command_dispatcher::{ExecutionError, ExecutionHandler};
use crate::store::{DataStore, Record, Table};
use crate::validator::ApprovedCommand;

/// Status a bid moves to when EXECUTE submits it.
pub const SUBMITTED_STATUS: &str = "pending_review";

/// Bids: CREATE drafts, READ lists, UPDATE edits, EXECUTE submits.
pub struct BidHandler {
    store: Arc<dyn DataStore>,
}

impl BidHandler {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    fn columns(command: &ApprovedCommand) -> Record {
        let mut exclude = NON_COLUMN_KEYS.to_vec();
        exclude.push(keys::BID_ID);
        record_from_payload(command.payload(), &exclude)
    }

    async fn create(&self, command: &mut ApprovedCommand) -> Result<ExecutionOutcome, ExecutionError> {
        let mut record = Self::columns(command);
        record.entry("status").or_insert_with(|| json!("draft"));

        let stored = insert_scoped(self.store.as_ref(), Table::Bids, command, record).await?;
        if let Some(id) = stored.get("id") {
            command.payload_mut().insert("bidId", id.clone());
        }
        Ok(ExecutionOutcome::success("Bid drafted").with_data(JsonValue::Object(stored)))
    }

    async fn update(&self, command: &ApprovedCommand) -> Result<ExecutionOutcome, ExecutionError> {
        let id = require_id(command, keys::BID_ID)?;
        let patch = Self::columns(command);
        if patch.is_empty() {
            return Ok(ExecutionOutcome::failure(format!("no fields to update on bid {id}")));
        }
        fetch_scoped(self.store.as_ref(), Table::Bids, command, &id).await?;
        let stored = self.store.update(Table::Bids, &id, patch).await?;
        Ok(ExecutionOutcome::success(format!("Bid {id} updated")).with_data(JsonValue::Object(stored)))
    }

    async fn submit(&self, command: &ApprovedCommand) -> Result<ExecutionOutcome, ExecutionError> {
        let id = require_id(command, keys::BID_ID)?;
        fetch_scoped(self.store.as_ref(), Table::Bids, command, &id).await?;

        let mut patch = Record::new();
        patch.insert("status".into(), json!(SUBMITTED_STATUS));
        patch.insert("submitted_at".into(), json!(Utc::now()));
        let stored = self.store.update(Table::Bids, &id, patch).await?;
        Ok(ExecutionOutcome::success(format!("Bid {id} submitted for review"))
            .with_data(JsonValue::Object(stored)))
    }
}

#[async_trait]
impl ExecutionHandler for BidHandler {
    fn target(&self) -> Target {
        Target::Bid
    }

    async fn execute(&self, command: &mut ApprovedCommand) -> Result<ExecutionOutcome, ExecutionError> {
        match command.action() {
            Action::Create => self.create(command).await,
            Action::Read => {
                let rows = list_scoped(self.store.as_ref(), Table::Bids, command).await?;
                Ok(ExecutionOutcome::success(format!("Found {} bids", rows.len()))
                    .with_data(JsonValue::Array(rows.into_iter().map(JsonValue::Object).collect())))
            }
            Action::Update => self.update(command).await,
            Action::Execute => self.submit(command).await,
            _ => Ok(unsupported(command)),
        }
    }
}
