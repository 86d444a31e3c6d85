use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value as JsonValue, json};
use uuid::Uuid;

use sovereign_commands::{Action, ExecutionOutcome, Target, keys};

use super::{insert_scoped, list_scoped, record_from_payload, unsupported};
use crate::command_dispatcher::{ExecutionError, ExecutionHandler};
use crate::store::{DataStore, Table};
use crate::validator::ApprovedCommand;

/// Employee records: READ lists the organization's employees, CREATE hires.
pub struct EmployeeHandler {
    store: Arc<dyn DataStore>,
}

impl EmployeeHandler {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    async fn create(&self, command: &mut ApprovedCommand) -> Result<ExecutionOutcome, ExecutionError> {
        let mut record = record_from_payload(
            command.payload(),
            &[keys::ORGANIZATION_ID, keys::INTENT, keys::NAME],
        );

        if let Some(name) = command.payload().str_field(keys::NAME) {
            let (first, last) = split_name(name);
            record.entry("first_name").or_insert_with(|| json!(first));
            record.entry("last_name").or_insert_with(|| json!(last));
        }
        if !record.contains_key("first_name") {
            return Err(ExecutionError::MissingField("name"));
        }

        let employee_id = match record.get("employee_id").and_then(JsonValue::as_str) {
            Some(id) => id.to_string(),
            None => generate_employee_id(),
        };
        record.insert("employee_id".into(), json!(employee_id));
        record.entry("status").or_insert_with(|| json!("active"));

        let stored = insert_scoped(self.store.as_ref(), Table::Employees, command, record).await?;
        command.payload_mut().insert("employeeId", json!(employee_id));

        let full_name = [stored.get("first_name"), stored.get("last_name")]
            .into_iter()
            .flatten()
            .filter_map(JsonValue::as_str)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        Ok(
            ExecutionOutcome::success(format!("Employee {full_name} ({employee_id}) created"))
                .with_data(JsonValue::Object(stored)),
        )
    }
}

/// First word is the first name; the remainder (possibly empty) the last.
fn split_name(name: &str) -> (String, String) {
    let mut parts = name.split_whitespace();
    let first = parts.next().unwrap_or_default().to_string();
    let last = parts.collect::<Vec<_>>().join(" ");
    (first, last)
}

/// `EMP-<unix millis>-<3 digits>`.
fn generate_employee_id() -> String {
    let suffix = Uuid::now_v7().as_u128() % 1000;
    format!("EMP-{}-{suffix:03}", Utc::now().timestamp_millis())
}

#[async_trait]
impl ExecutionHandler for EmployeeHandler {
    fn target(&self) -> Target {
        Target::Employee
    }

    async fn execute(&self, command: &mut ApprovedCommand) -> Result<ExecutionOutcome, ExecutionError> {
        match command.action() {
            Action::Read => {
                let rows = list_scoped(self.store.as_ref(), Table::Employees, command).await?;
                Ok(ExecutionOutcome::success(format!("Found {} employees", rows.len()))
                    .with_data(JsonValue::Array(rows.into_iter().map(JsonValue::Object).collect())))
            }
            Action::Create => self.create(command).await,
            _ => Ok(unsupported(command)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::{ORG, approved};
    use crate::store::InMemoryDataStore;

    #[test]
    fn names_split_on_first_whitespace() {
        assert_eq!(split_name("Jane Doe"), ("Jane".into(), "Doe".into()));
        assert_eq!(split_name("Cher"), ("Cher".into(), String::new()));
        assert_eq!(
            split_name("  Mary   Ann Smith "),
            ("Mary".into(), "Ann Smith".into())
        );
    }

    #[test]
    fn generated_ids_have_the_expected_shape() {
        let id = generate_employee_id();
        let parts: Vec<_> = id.split('-').collect();
        assert_eq!(parts[0], "EMP");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 3);
    }

    #[tokio::test]
    async fn create_splits_name_and_enriches_payload() {
        let store = Arc::new(InMemoryDataStore::new());
        let handler = EmployeeHandler::new(store.clone());
        let mut command = approved(
            Action::Create,
            Target::Employee,
            json!({ "name": "Jane Doe", "email": "jane@example.com" }),
        );

        let outcome = handler.execute(&mut command).await.unwrap();

        assert!(outcome.success, "{}", outcome.message);
        assert!(outcome.message.starts_with("Employee Jane Doe (EMP-"));
        let data = outcome.data.unwrap();
        assert_eq!(data["first_name"], json!("Jane"));
        assert_eq!(data["last_name"], json!("Doe"));
        assert_eq!(data["status"], json!("active"));
        assert_eq!(data["organization_id"], json!(ORG));
        assert_eq!(command.payload().get("employeeId"), Some(&data["employee_id"]));
        assert_eq!(store.count(Table::Employees), 1);
    }

    #[tokio::test]
    async fn create_without_a_name_fails() {
        let handler = EmployeeHandler::new(Arc::new(InMemoryDataStore::new()));
        let mut command = approved(Action::Create, Target::Employee, json!({ "email": "x@y.z" }));
        let err = handler.execute(&mut command).await.unwrap_err();
        assert!(matches!(err, ExecutionError::MissingField("name")));
    }

    #[tokio::test]
    async fn read_lists_only_the_organization() {
        let store = Arc::new(InMemoryDataStore::new());
        store
            .seed(Table::Employees, json!({ "id": 1, "organization_id": ORG }).as_object().cloned().unwrap())
            .unwrap();
        store
            .seed(Table::Employees, json!({ "id": 2, "organization_id": 99 }).as_object().cloned().unwrap())
            .unwrap();

        let mut command = approved(Action::Read, Target::Employee, json!({}));
        let outcome = EmployeeHandler::new(store).execute(&mut command).await.unwrap();
        assert_eq!(outcome.message, "Found 1 employees");
    }

    #[tokio::test]
    async fn delete_is_unsupported() {
        let mut command = approved(Action::Delete, Target::Employee, json!({}));
        let outcome = EmployeeHandler::new(Arc::new(InMemoryDataStore::new()))
            .execute(&mut command)
            .await
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.message, "action DELETE not supported for target EMPLOYEE");
    }
}
