//! Gate 3: domain rules that depend on command content or stored state.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::warn;

use sovereign_commands::{Action, Command, Payload, Target, keys};
use sovereign_core::{DomainError, DomainResult, OrganizationId};

use crate::store::{DataStore, Filter, Record, StoreError, Table};

/// Pay statement status after which it is frozen.
pub const PROCESSED_STATUS: &str = "processed";

pub async fn check(store: &dyn DataStore, command: &Command) -> DomainResult<()> {
    match (command.target, command.action) {
        (Target::PayrollRun, Action::Process) => check_pay_period(&command.payload),
        (Target::Paystub, Action::Update | Action::Delete) => {
            check_paystub_mutable(store, &command.payload, command.organization_id()).await
        }
        _ => Ok(()),
    }
}

fn check_pay_period(payload: &Payload) -> DomainResult<()> {
    let start = required_date(payload, keys::PERIOD_START, "periodStart")?;
    let end = required_date(payload, keys::PERIOD_END, "periodEnd")?;
    if end <= start {
        return Err(DomainError::rule(format!(
            "pay period end ({}) must be after start ({})",
            end.format("%Y-%m-%d"),
            start.format("%Y-%m-%d")
        )));
    }
    Ok(())
}

fn required_date(payload: &Payload, aliases: &[&str], name: &str) -> DomainResult<DateTime<Utc>> {
    let text = payload
        .str_field(aliases)
        .ok_or_else(|| DomainError::rule(format!("{name} is required to process payroll")))?;
    parse_date(text).ok_or_else(|| DomainError::rule(format!("{name} is not a valid date: {text}")))
}

/// `YYYY-MM-DD` (midnight UTC) or RFC 3339.
pub fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

async fn check_paystub_mutable(
    store: &dyn DataStore,
    payload: &Payload,
    organization: Option<OrganizationId>,
) -> DomainResult<()> {
    // Without an id there is nothing to look up; the handler reports the missing field.
    let Some(id) = payload.id_field(keys::PAYSTUB_ID) else {
        return Ok(());
    };

    match lookup_paystub(store, &id, organization).await {
        Ok(Some(record)) => {
            let processed = record
                .get("status")
                .and_then(|s| s.as_str())
                .is_some_and(|s| s.trim().eq_ignore_ascii_case(PROCESSED_STATUS));
            if processed {
                Err(DomainError::rule(format!(
                    "pay statement {id} is processed and cannot be modified or deleted"
                )))
            } else {
                Ok(())
            }
        }
        Ok(None) => Ok(()),
        Err(err) => {
            warn!(paystub_id = %id, error = %err, "pay statement status lookup failed");
            Err(DomainError::rule(format!(
                "status of pay statement {id} could not be verified"
            )))
        }
    }
}

/// The statement as the handler will see it: another organization's row with
/// the same id is invisible.
async fn lookup_paystub(
    store: &dyn DataStore,
    id: &str,
    organization: Option<OrganizationId>,
) -> Result<Option<Record>, StoreError> {
    match organization {
        Some(organization) => {
            let filter = Filter::by_id(id).eq("organization_id", organization.get().into());
            Ok(store.select(Table::Paystubs, &filter).await?.into_iter().next())
        }
        None => store.fetch(Table::Paystubs, id).await,
    }
}
