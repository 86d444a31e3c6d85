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

/// Pay statements: full CRUD plus APPROVE.
///
/// Processed statements are frozen by the business-rule gate before they
/// reach this handler.
pub struct PaystubHandler {
    store: Arc<dyn DataStore>,
}

impl PaystubHandler {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    async fn create(&self, command: &mut ApprovedCommand) -> Result<ExecutionOutcome, ExecutionError> {
        let mut record = record_from_payload(
            command.payload(),
            &[keys::ORGANIZATION_ID, keys::INTENT, keys::PAYSTUB_ID],
        );
        record.entry("status").or_insert_with(|| json!("draft"));

        let stored = insert_scoped(self.store.as_ref(), Table::Paystubs, command, record).await?;
        if let Some(id) = stored.get("id") {
            command.payload_mut().insert("paystubId", id.clone());
        }
        Ok(ExecutionOutcome::success("Pay statement created").with_data(JsonValue::Object(stored)))
    }

    async fn update(&self, command: &ApprovedCommand) -> Result<ExecutionOutcome, ExecutionError> {
        let id = require_id(command, keys::PAYSTUB_ID)?;
        let mut exclude = NON_COLUMN_KEYS.to_vec();
        exclude.push(keys::PAYSTUB_ID);
        let patch = record_from_payload(command.payload(), &exclude);
        if patch.is_empty() {
            return Ok(ExecutionOutcome::failure(format!(
                "no fields to update on pay statement {id}"
            )));
        }
        self.patch(command, &id, patch, "updated").await
    }

    async fn approve(&self, command: &ApprovedCommand) -> Result<ExecutionOutcome, ExecutionError> {
        let id = require_id(command, keys::PAYSTUB_ID)?;
        let mut patch = Record::new();
        patch.insert("status".into(), json!("approved"));
        patch.insert("approved_by".into(), json!(command.metadata().requested_by));
        patch.insert("approved_at".into(), json!(Utc::now()));
        self.patch(command, &id, patch, "approved").await
    }

    async fn patch(
        &self,
        command: &ApprovedCommand,
        id: &str,
        patch: Record,
        verb: &str,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        fetch_scoped(self.store.as_ref(), Table::Paystubs, command, id).await?;
        let stored = self.store.update(Table::Paystubs, id, patch).await?;
        Ok(ExecutionOutcome::success(format!("Pay statement {id} {verb}"))
            .with_data(JsonValue::Object(stored)))
    }

    async fn delete(&self, command: &ApprovedCommand) -> Result<ExecutionOutcome, ExecutionError> {
        let id = require_id(command, keys::PAYSTUB_ID)?;
        fetch_scoped(self.store.as_ref(), Table::Paystubs, command, &id).await?;
        self.store.delete(Table::Paystubs, &id).await?;
        Ok(ExecutionOutcome::success(format!("Pay statement {id} deleted")))
    }
}

#[async_trait]
impl ExecutionHandler for PaystubHandler {
    fn target(&self) -> Target {
        Target::Paystub
    }

    async fn execute(&self, command: &mut ApprovedCommand) -> Result<ExecutionOutcome, ExecutionError> {
        match command.action() {
            Action::Create => self.create(command).await,
            Action::Read => {
                let rows = list_scoped(self.store.as_ref(), Table::Paystubs, command).await?;
                Ok(ExecutionOutcome::success(format!("Found {} pay statements", rows.len()))
                    .with_data(JsonValue::Array(rows.into_iter().map(JsonValue::Object).collect())))
            }
            Action::Update => self.update(command).await,
            Action::Delete => self.delete(command).await,
            Action::Approve => self.approve(command).await,
            _ => Ok(unsupported(command)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::{ORG, approved};
    use crate::store::{InMemoryDataStore, StoreError};

    fn store_with(id: i64, organization: i64) -> Arc<InMemoryDataStore> {
        let store = Arc::new(InMemoryDataStore::new());
        store
            .seed(
                Table::Paystubs,
                json!({ "id": id, "organization_id": organization, "status": "draft", "net_pay": 900 })
                    .as_object()
                    .cloned()
                    .unwrap(),
            )
            .unwrap();
        store
    }

    #[tokio::test]
    async fn create_defaults_to_draft() {
        let store = Arc::new(InMemoryDataStore::new());
        let mut command = approved(
            Action::Create,
            Target::Paystub,
            json!({ "employeeId": "EMP-1", "grossPay": 1200, "netPay": 950 }),
        );
        let outcome = PaystubHandler::new(store).execute(&mut command).await.unwrap();
        let data = outcome.data.unwrap();
        assert_eq!(data["status"], json!("draft"));
        assert_eq!(data["employee_id"], json!("EMP-1"));
        assert!(command.payload().contains_any(keys::PAYSTUB_ID));
    }

    #[tokio::test]
    async fn approve_stamps_approver_and_time() {
        let store = store_with(5, ORG);
        let mut command = approved(Action::Approve, Target::Paystub, json!({ "paystubId": 5 }));
        let outcome = PaystubHandler::new(store).execute(&mut command).await.unwrap();

        assert_eq!(outcome.message, "Pay statement 5 approved");
        let data = outcome.data.unwrap();
        assert_eq!(data["status"], json!("approved"));
        assert_eq!(data["approved_by"], json!("admin-1"));
        assert!(data["approved_at"].is_string());
    }

    #[tokio::test]
    async fn update_applies_snake_case_patch() {
        let store = store_with(5, ORG);
        let mut command = approved(Action::Update, Target::Paystub, json!({ "paystubId": "5", "netPay": 1000 }));
        let outcome = PaystubHandler::new(store).execute(&mut command).await.unwrap();
        assert_eq!(outcome.data.unwrap()["net_pay"], json!(1000));
    }

    #[tokio::test]
    async fn update_without_fields_fails() {
        let store = store_with(5, ORG);
        let mut command = approved(Action::Update, Target::Paystub, json!({ "paystubId": 5 }));
        let outcome = PaystubHandler::new(store).execute(&mut command).await.unwrap();
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn other_organizations_rows_are_not_found() {
        let store = store_with(5, 99);
        let mut command = approved(Action::Delete, Target::Paystub, json!({ "paystubId": 5 }));
        let err = PaystubHandler::new(store.clone()).execute(&mut command).await.unwrap_err();
        assert!(matches!(err, ExecutionError::Store(StoreError::NotFound { .. })));
        assert_eq!(store.count(Table::Paystubs), 1);
    }

    #[tokio::test]
    async fn delete_removes_the_statement() {
        let store = store_with(5, ORG);
        let mut command = approved(Action::Delete, Target::Paystub, json!({ "paystubId": 5 }));
        let outcome = PaystubHandler::new(store.clone()).execute(&mut command).await.unwrap();
        assert_eq!(outcome.message, "Pay statement 5 deleted");
        assert_eq!(store.count(Table::Paystubs), 0);
    }

    #[tokio::test]
    async fn missing_id_is_reported() {
        let mut command = approved(Action::Approve, Target::Paystub, json!({}));
        let err = PaystubHandler::new(store_with(5, ORG))
            .execute(&mut command)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::MissingField("paystubId")));
    }
}
