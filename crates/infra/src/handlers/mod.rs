//! Execution handlers, one per target.
//!
//! Handlers translate payload keys to snake_case column names, scope every
//! row to the command's organization, and report results as
//! [`ExecutionOutcome`]s. TRADE has no handler.

pub mod bid;
pub mod employee;
pub mod payroll;
pub mod paystub;
pub mod project_task;
pub mod system_status;
pub mod time_entry;

use std::sync::Arc;

use serde_json::Value as JsonValue;

use sovereign_commands::{ExecutionOutcome, Payload, keys};
use sovereign_core::OrganizationId;

use crate::command_dispatcher::{ExecutionError, HandlerRegistry};
use crate::jobs::JobStore;
use crate::journal::ExecutionJournal;
use crate::store::{DataStore, Filter, Record, Table};
use crate::validator::ApprovedCommand;

pub use bid::BidHandler;
pub use employee::EmployeeHandler;
pub use payroll::PayrollHandler;
pub use paystub::PaystubHandler;
pub use project_task::ProjectTaskHandler;
pub use system_status::SystemStatusHandler;
pub use time_entry::TimeEntryHandler;

/// Registry with every built-in handler.
pub fn default_registry(
    store: Arc<dyn DataStore>,
    jobs: Arc<dyn JobStore>,
    journal: Arc<dyn ExecutionJournal>,
) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new()
        .with(Arc::new(EmployeeHandler::new(store.clone())))
        .with(Arc::new(PayrollHandler::new(jobs.clone())))
        .with(Arc::new(PaystubHandler::new(store.clone())))
        .with(Arc::new(TimeEntryHandler::new(store.clone())))
        .with(Arc::new(ProjectTaskHandler::new(store.clone())))
        .with(Arc::new(BidHandler::new(store)));

    let mut targets = registry.targets();
    targets.push(sovereign_commands::Target::SystemStatus);
    registry.register(Arc::new(SystemStatusHandler::new(journal, jobs, targets)));
    registry
}

/// Failure for an action the target does not support.
pub(crate) fn unsupported(command: &ApprovedCommand) -> ExecutionOutcome {
    ExecutionOutcome::failure(format!(
        "action {} not supported for target {}",
        command.action(),
        command.target()
    ))
}

pub(crate) fn require_organization(command: &ApprovedCommand) -> Result<OrganizationId, ExecutionError> {
    command
        .organization_id()
        .ok_or(ExecutionError::MissingField("organizationId"))
}

pub(crate) fn require_id(
    command: &ApprovedCommand,
    aliases: &'static [&'static str],
) -> Result<String, ExecutionError> {
    command
        .payload()
        .id_field(aliases)
        .ok_or(ExecutionError::MissingField(aliases[0]))
}

/// `employeeId` → `employee_id`; keys already in snake_case pass through.
pub(crate) fn column_name(key: &str) -> String {
    let mut column = String::with_capacity(key.len() + 4);
    for (i, c) in key.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                column.push('_');
            }
            column.push(c.to_ascii_lowercase());
        } else {
            column.push(c);
        }
    }
    column
}

/// Payload as a row: snake_case columns, `exclude` aliases and nulls dropped.
pub(crate) fn record_from_payload(payload: &Payload, exclude: &[&[&str]]) -> Record {
    payload
        .as_map()
        .iter()
        .filter(|(key, value)| {
            !value.is_null() && !exclude.iter().any(|aliases| aliases.contains(&key.as_str()))
        })
        .map(|(key, value)| (column_name(key), value.clone()))
        .collect()
}

/// Insert a payload-derived row stamped with the command's organization.
pub(crate) async fn insert_scoped(
    store: &dyn DataStore,
    table: Table,
    command: &ApprovedCommand,
    mut record: Record,
) -> Result<Record, ExecutionError> {
    let organization = require_organization(command)?;
    record.insert("organization_id".into(), JsonValue::from(organization.get()));
    Ok(store.insert(table, record).await?)
}

/// Every row of `table` in the command's organization.
pub(crate) async fn list_scoped(
    store: &dyn DataStore,
    table: Table,
    command: &ApprovedCommand,
) -> Result<Vec<Record>, ExecutionError> {
    let organization = require_organization(command)?;
    Ok(store.select(table, &Filter::organization(organization)).await?)
}

/// The row `id` of `table`, only if it belongs to the command's organization.
///
/// Rows in other organizations are reported as not found.
pub(crate) async fn fetch_scoped(
    store: &dyn DataStore,
    table: Table,
    command: &ApprovedCommand,
    id: &str,
) -> Result<Record, ExecutionError> {
    let organization = require_organization(command)?;
    let filter = Filter::by_id(id).eq("organization_id", JsonValue::from(organization.get()));
    store
        .select(table, &filter)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| {
            ExecutionError::Store(crate::store::StoreError::NotFound {
                table,
                id: id.to_string(),
            })
        })
}

/// Keys that never become columns.
pub(crate) const NON_COLUMN_KEYS: &[&[&str]] = &[keys::ORGANIZATION_ID, keys::INTENT];

#[cfg(test)]
pub(crate) mod testing {
    //! Shared fixtures for handler tests.

    use chrono::Utc;
    use serde_json::Value;

    use sovereign_commands::{Action, Command, CommandMetadata, Target};
    use sovereign_core::{CallerId, OrganizationId};

    use crate::validator::ApprovedCommand;

    pub const ORG: i64 = 7;

    pub fn approved(action: Action, target: Target, payload: Value) -> ApprovedCommand {
        ApprovedCommand::new(Command::new(
            action,
            target,
            serde_json::from_value(payload).unwrap(),
            CommandMetadata::new(
                CallerId::new("admin-1"),
                Some(OrganizationId::new(ORG)),
                Utc::now(),
                "test",
            ),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn column_names_are_snake_case() {
        assert_eq!(column_name("employeeId"), "employee_id");
        assert_eq!(column_name("periodStart"), "period_start");
        assert_eq!(column_name("net_pay"), "net_pay");
        assert_eq!(column_name("Name"), "name");
    }

    #[test]
    fn records_drop_excluded_and_null_keys() {
        let payload: Payload = serde_json::from_value(json!({
            "organizationId": 3,
            "intent": "x",
            "grossPay": 100,
            "memo": null
        }))
        .unwrap();
        let record = record_from_payload(&payload, NON_COLUMN_KEYS);
        assert_eq!(record.len(), 1);
        assert_eq!(record["gross_pay"], json!(100));
    }
}
