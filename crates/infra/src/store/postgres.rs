//! Postgres-backed record store.
//!
//! Rows cross the boundary as `jsonb`: reads go through `to_jsonb(row)`,
//! writes through `jsonb_populate_record`, so the column set lives in the
//! schema rather than in Rust. Column names are validated before they are
//! spliced into SQL; values are always bound.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::types::Json;
use sqlx::{PgPool, Row};

use super::{DataStore, Filter, Record, StoreError, Table, scalar_text};

pub struct PgDataStore {
    pool: PgPool,
}

impl PgDataStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url).await.map_err(map_sqlx)?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn map_sqlx(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(err.to_string())
        }
        other => StoreError::Query(other.to_string()),
    }
}

fn column(name: &str) -> Result<&str, StoreError> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(name)
    } else {
        Err(StoreError::InvalidColumn(name.to_string()))
    }
}

fn row_to_record(row: &sqlx::postgres::PgRow) -> Result<Record, StoreError> {
    let Json(value): Json<JsonValue> = row.try_get("record").map_err(map_sqlx)?;
    match value {
        JsonValue::Object(map) => Ok(map),
        other => Err(StoreError::Query(format!("expected a row object, got {other}"))),
    }
}

/// `WHERE` clause comparing each column's text form to a bound parameter.
fn where_clause(filter: &Filter) -> Result<(String, Vec<Option<String>>), StoreError> {
    let mut clauses = Vec::with_capacity(filter.predicates().len());
    let mut binds = Vec::with_capacity(filter.predicates().len());
    for (i, (name, value)) in filter.predicates().iter().enumerate() {
        clauses.push(format!("t.{}::text = ${}", column(name)?, i + 1));
        binds.push(scalar_text(value));
    }
    if clauses.is_empty() {
        Ok((String::new(), binds))
    } else {
        Ok((format!(" WHERE {}", clauses.join(" AND ")), binds))
    }
}

#[async_trait]
impl DataStore for PgDataStore {
    async fn select(&self, table: Table, filter: &Filter) -> Result<Vec<Record>, StoreError> {
        let (predicate, binds) = where_clause(filter)?;
        let sql = format!("SELECT to_jsonb(t) AS record FROM {table} t{predicate}");

        let mut query = sqlx::query(&sql);
        for bind in binds {
            query = query.bind(bind);
        }
        let rows = query.fetch_all(&self.pool).await.map_err(map_sqlx)?;
        rows.iter().map(row_to_record).collect()
    }

    async fn insert(&self, table: Table, record: Record) -> Result<Record, StoreError> {
        let columns = record
            .keys()
            .map(|k| column(k))
            .collect::<Result<Vec<_>, _>>()?
            .join(", ");
        let sql = if columns.is_empty() {
            format!("INSERT INTO {table} AS t DEFAULT VALUES RETURNING to_jsonb(t) AS record")
        } else {
            format!(
                "INSERT INTO {table} AS t ({columns}) \
                 SELECT {columns} FROM jsonb_populate_record(NULL::{table}, $1) \
                 RETURNING to_jsonb(t) AS record"
            )
        };

        let row = sqlx::query(&sql)
            .bind(Json(JsonValue::Object(record)))
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)?;
        row_to_record(&row)
    }

    async fn update(&self, table: Table, id: &str, patch: Record) -> Result<Record, StoreError> {
        let assignments = patch
            .keys()
            .filter(|k| k.as_str() != "id")
            .map(|k| column(k).map(|c| format!("{c} = r.{c}")))
            .collect::<Result<Vec<_>, _>>()?;
        if assignments.is_empty() {
            return self.fetch(table, id).await?.ok_or_else(|| StoreError::NotFound {
                table,
                id: id.to_string(),
            });
        }

        let sql = format!(
            "UPDATE {table} AS t SET {} \
             FROM jsonb_populate_record(NULL::{table}, $2) AS r \
             WHERE t.id::text = $1 RETURNING to_jsonb(t) AS record",
            assignments.join(", ")
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(Json(JsonValue::Object(patch)))
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?
            .ok_or_else(|| StoreError::NotFound {
                table,
                id: id.to_string(),
            })?;
        row_to_record(&row)
    }

    async fn delete(&self, table: Table, id: &str) -> Result<(), StoreError> {
        let sql = format!("DELETE FROM {table} WHERE id::text = $1");
        let result = sqlx::query(&sql)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        if result.rows_affected() == 0 {
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

    #[test]
    fn column_names_are_restricted_to_identifiers() {
        assert!(column("organization_id").is_ok());
        assert!(column("_x1").is_ok());
        assert!(column("id; DROP TABLE bids").is_err());
        assert!(column("Name").is_err());
        assert!(column("").is_err());
    }

    #[test]
    fn where_clause_binds_text_forms() {
        let filter = Filter::organization(OrganizationId::new(4)).eq("status", json!("draft"));
        let (sql, binds) = where_clause(&filter).unwrap();
        assert_eq!(sql, " WHERE t.organization_id::text = $1 AND t.status::text = $2");
        assert_eq!(binds, vec![Some("4".to_string()), Some("draft".to_string())]);
    }

    #[test]
    fn empty_filter_has_no_where_clause() {
        let (sql, binds) = where_clause(&Filter::new()).unwrap();
        assert!(sql.is_empty());
        assert!(binds.is_empty());
    }
}
