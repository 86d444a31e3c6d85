use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use super::{DataStore, Filter, Record, StoreError, Table, loosely_equal};

/// In-memory store for tests/dev.
///
/// Rows without an `id` get a UUIDv7 on insert; rows without `created_at`
/// get the insertion time.
#[derive(Debug, Default)]
pub struct InMemoryDataStore {
    tables: RwLock<HashMap<Table, Vec<Record>>>,
}

impl InMemoryDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a row verbatim (no generated columns).
    pub fn seed(&self, table: Table, record: Record) -> Result<(), StoreError> {
        self.tables
            .write()
            .map_err(|_| poisoned())?
            .entry(table)
            .or_default()
            .push(record);
        Ok(())
    }

    /// Number of rows in `table`.
    pub fn count(&self, table: Table) -> usize {
        self.tables
            .read()
            .map(|t| t.get(&table).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("in-memory store lock poisoned".into())
}

fn has_id(row: &Record, id: &str) -> bool {
    row.get("id")
        .is_some_and(|v| loosely_equal(v, &JsonValue::String(id.to_string())))
}

#[async_trait]
impl DataStore for InMemoryDataStore {
    async fn select(&self, table: Table, filter: &Filter) -> Result<Vec<Record>, StoreError> {
        let tables = self.tables.read().map_err(|_| poisoned())?;
        Ok(tables
            .get(&table)
            .map(|rows| rows.iter().filter(|r| filter.matches(r)).cloned().collect())
            .unwrap_or_default())
    }

    async fn insert(&self, table: Table, mut record: Record) -> Result<Record, StoreError> {
        record
            .entry("id")
            .or_insert_with(|| JsonValue::String(Uuid::now_v7().to_string()));
        record
            .entry("created_at")
            .or_insert_with(|| JsonValue::String(Utc::now().to_rfc3339()));

        self.tables
            .write()
            .map_err(|_| poisoned())?
            .entry(table)
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn update(&self, table: Table, id: &str, patch: Record) -> Result<Record, StoreError> {
        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        let row = tables
            .get_mut(&table)
            .and_then(|rows| rows.iter_mut().find(|r| has_id(r, id)))
            .ok_or_else(|| StoreError::NotFound {
                table,
                id: id.to_string(),
            })?;

        for (column, value) in patch {
            if column != "id" {
                row.insert(column, value);
            }
        }
        Ok(row.clone())
    }

    async fn delete(&self, table: Table, id: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        let rows = tables.entry(table).or_default();
        let before = rows.len();
        rows.retain(|r| !has_id(r, id));
        if rows.len() == before {
            return Err(StoreError::NotFound {
                table,
                id: id.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sovereign_core::OrganizationId;

    fn record(value: JsonValue) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn insert_generates_id_and_select_filters_by_organization() {
        let store = InMemoryDataStore::new();
        let stored = store
            .insert(Table::Bids, record(json!({ "organization_id": 1, "title": "Roof" })))
            .await
            .unwrap();
        store
            .insert(Table::Bids, record(json!({ "organization_id": 2, "title": "Fence" })))
            .await
            .unwrap();

        assert!(stored.get("id").is_some());
        let rows = store
            .select(Table::Bids, &Filter::organization(OrganizationId::new(1)))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["title"], json!("Roof"));
    }

    #[tokio::test]
    async fn update_merges_and_keeps_id() {
        let store = InMemoryDataStore::new();
        store
            .seed(Table::Paystubs, record(json!({ "id": 9, "status": "draft", "net_pay": 100 })))
            .unwrap();

        let updated = store
            .update(Table::Paystubs, "9", record(json!({ "id": 10, "status": "approved" })))
            .await
            .unwrap();

        assert_eq!(updated["id"], json!(9));
        assert_eq!(updated["status"], json!("approved"));
        assert_eq!(updated["net_pay"], json!(100));
    }

    #[tokio::test]
    async fn missing_rows_are_not_found() {
        let store = InMemoryDataStore::new();
        let err = store.delete(Table::ProjectTasks, "nope").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert!(store.fetch(Table::ProjectTasks, "nope").await.unwrap().is_none());
        assert!(
            store
                .update(Table::ProjectTasks, "nope", Record::new())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn delete_removes_the_row() {
        let store = InMemoryDataStore::new();
        store.seed(Table::ProjectTasks, record(json!({ "id": "t-1" }))).unwrap();
        store.delete(Table::ProjectTasks, "t-1").await.unwrap();
        assert_eq!(store.count(Table::ProjectTasks), 0);
    }
}
