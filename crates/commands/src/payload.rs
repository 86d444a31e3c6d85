use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use sovereign_core::OrganizationId;

/// Payload keys understood by the gates and handlers.
///
/// Each entry lists the camelCase key the model is asked to emit first, then
/// the snake_case column name it maps to.
pub mod keys {
    pub const ORGANIZATION_ID: &[&str] = &["organizationId", "organization_id"];
    pub const PERIOD_START: &[&str] = &["periodStart", "period_start"];
    pub const PERIOD_END: &[&str] = &["periodEnd", "period_end"];
    pub const PAYSTUB_ID: &[&str] = &["paystubId", "paystub_id"];
    pub const TASK_ID: &[&str] = &["taskId", "task_id"];
    pub const BID_ID: &[&str] = &["bidId", "bid_id"];
    pub const EMPLOYEE_ID: &[&str] = &["employeeId", "employee_id"];
    pub const NAME: &[&str] = &["name"];
    pub const INTENT: &[&str] = &["intent"];
}

/// Target-specific key/value fields of a command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Map<String, Value>);

impl Payload {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// First non-null value under any of `aliases`.
    pub fn field(&self, aliases: &[&str]) -> Option<&Value> {
        aliases
            .iter()
            .filter_map(|k| self.0.get(*k))
            .find(|v| !v.is_null())
    }

    /// Non-empty string field (whitespace-only counts as absent).
    pub fn str_field(&self, aliases: &[&str]) -> Option<&str> {
        self.field(aliases)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Integer field; numeric strings are accepted (`"42"` == `42`).
    pub fn i64_field(&self, aliases: &[&str]) -> Option<i64> {
        match self.field(aliases)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Identifier field rendered as a string, whether stored as number or string.
    pub fn id_field(&self, aliases: &[&str]) -> Option<String> {
        match self.field(aliases)? {
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        }
    }

    pub fn organization_id(&self) -> Option<OrganizationId> {
        self.i64_field(keys::ORGANIZATION_ID).map(OrganizationId::new)
    }

    pub fn contains_any(&self, aliases: &[&str]) -> bool {
        self.field(aliases).is_some()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    /// Remove every alias, returning the first non-null value removed.
    pub fn take(&mut self, aliases: &[&str]) -> Option<Value> {
        let mut taken = None;
        for key in aliases {
            if let Some(v) = self.0.remove(*key) {
                if taken.is_none() && !v.is_null() {
                    taken = Some(v);
                }
            }
        }
        taken
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for Payload {
    fn from(value: Map<String, Value>) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Payload {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn aliases_resolve_camel_and_snake_case() {
        let p = payload(json!({ "organization_id": "12", "periodStart": "2025-01-01" }));
        assert_eq!(p.organization_id(), Some(OrganizationId::new(12)));
        assert_eq!(p.str_field(keys::PERIOD_START), Some("2025-01-01"));
    }

    #[test]
    fn null_and_blank_values_count_as_absent() {
        let p = payload(json!({ "organizationId": null, "name": "   " }));
        assert_eq!(p.organization_id(), None);
        assert_eq!(p.str_field(keys::NAME), None);
        assert!(!p.contains_any(keys::ORGANIZATION_ID));
    }

    #[test]
    fn id_field_renders_numbers_and_strings() {
        let p = payload(json!({ "paystubId": 77, "taskId": " t-9 " }));
        assert_eq!(p.id_field(keys::PAYSTUB_ID).as_deref(), Some("77"));
        assert_eq!(p.id_field(keys::TASK_ID).as_deref(), Some("t-9"));
    }

    #[test]
    fn take_removes_every_alias() {
        let mut p = payload(json!({ "paystubId": 1, "paystub_id": 2, "status": "draft" }));
        assert_eq!(p.take(keys::PAYSTUB_ID), Some(json!(1)));
        assert!(!p.contains_any(keys::PAYSTUB_ID));
        assert_eq!(p.get("status"), Some(&json!("draft")));
    }
}
