//! Record storage used by execution handlers.
//!
//! Handlers read and write loosely-typed records (`serde_json` objects)
//! through [`DataStore`]. Every table carries an `organization_id` column;
//! organization scoping is expressed as an ordinary equality filter.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

use sovereign_core::OrganizationId;

pub use in_memory::InMemoryDataStore;
pub use postgres::PgDataStore;

/// One row, keyed by column name.
pub type Record = Map<String, JsonValue>;

/// Tables the handlers touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Employees,
    Paystubs,
    TimeEntries,
    ProjectTasks,
    Bids,
}

impl Table {
    pub const ALL: &'static [Table] = &[
        Table::Employees,
        Table::Paystubs,
        Table::TimeEntries,
        Table::ProjectTasks,
        Table::Bids,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Table::Employees => "employees",
            Table::Paystubs => "paystubs",
            Table::TimeEntries => "time_entries",
            Table::ProjectTasks => "project_tasks",
            Table::Bids => "bids",
        }
    }
}

impl core::fmt::Display for Table {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{table} record not found: {id}")]
    NotFound { table: Table, id: String },

    #[error("invalid column name: {0}")]
    InvalidColumn(String),

    #[error("data store unavailable: {0}")]
    Unavailable(String),

    #[error("data store query failed: {0}")]
    Query(String),
}

/// Conjunction of column equality predicates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    predicates: Vec<(String, JsonValue)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_id(id: impl Into<String>) -> Self {
        Self::new().eq("id", JsonValue::String(id.into()))
    }

    pub fn organization(organization_id: OrganizationId) -> Self {
        Self::new().eq("organization_id", JsonValue::from(organization_id.get()))
    }

    pub fn eq(mut self, column: impl Into<String>, value: JsonValue) -> Self {
        self.predicates.push((column.into(), value));
        self
    }

    pub fn predicates(&self) -> &[(String, JsonValue)] {
        &self.predicates
    }

    /// Whether `record` satisfies every predicate.
    pub fn matches(&self, record: &Record) -> bool {
        self.predicates
            .iter()
            .all(|(column, expected)| record.get(column).is_some_and(|v| loosely_equal(v, expected)))
    }
}

/// Equality that treats `7` and `"7"` as the same identifier.
pub(crate) fn loosely_equal(a: &JsonValue, b: &JsonValue) -> bool {
    a == b || matches!((scalar_text(a), scalar_text(b)), (Some(x), Some(y)) if x == y)
}

/// Text form of a scalar, as Postgres' `::text` cast renders it.
pub(crate) fn scalar_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[async_trait]
pub trait DataStore: Send + Sync {
    async fn select(&self, table: Table, filter: &Filter) -> Result<Vec<Record>, StoreError>;

    /// Insert a record; returns the stored row (with generated columns).
    async fn insert(&self, table: Table, record: Record) -> Result<Record, StoreError>;

    /// Merge `patch` into the row with primary key `id`.
    async fn update(&self, table: Table, id: &str, patch: Record) -> Result<Record, StoreError>;

    async fn delete(&self, table: Table, id: &str) -> Result<(), StoreError>;

    async fn fetch(&self, table: Table, id: &str) -> Result<Option<Record>, StoreError> {
        Ok(self.select(table, &Filter::by_id(id)).await?.into_iter().next())
    }
}

#[async_trait]
impl<S> DataStore for Arc<S>
where
    S: DataStore + ?Sized,
{
    async fn select(&self, table: Table, filter: &Filter) -> Result<Vec<Record>, StoreError> {
        (**self).select(table, filter).await
    }

    async fn insert(&self, table: Table, record: Record) -> Result<Record, StoreError> {
        (**self).insert(table, record).await
    }

    async fn update(&self, table: Table, id: &str, patch: Record) -> Result<Record, StoreError> {
        (**self).update(table, id, patch).await
    }

    async fn delete(&self, table: Table, id: &str) -> Result<(), StoreError> {
        (**self).delete(table, id).await
    }

    async fn fetch(&self, table: Table, id: &str) -> Result<Option<Record>, StoreError> {
        (**self).fetch(table, id).await
    }
}
