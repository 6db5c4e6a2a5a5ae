use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use roster_store::schema::{COLUMN_CREATED_AT, COLUMN_ID};
use roster_store::{Filter, Row};
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use super::{Select, StoreError, StoreResult, TableStore, require_filter};

/// Process-local `TableStore`.
///
/// Tables spring into existence on first insert; reading a table that was
/// never written yields no rows. Inserted rows get an integer `id` and an
/// RFC 3339 `created_at` unless they already carry them.
#[derive(Clone, Default)]
pub struct MemoryTableStore {
    tables: Arc<RwLock<HashMap<String, MemoryTable>>>,
}

#[derive(Default)]
struct MemoryTable {
    rows: Vec<Row>,
    last_id: i64,
}

impl MemoryTable {
    /// Stamps and appends `rows`. Either every row is stored or none is.
    fn push_all(&mut self, rows: Vec<Row>) -> StoreResult<Vec<Row>> {
        let mut last_id = self.last_id;
        let stamped = rows
            .into_iter()
            .map(|row| stamp(&mut last_id, row))
            .collect::<StoreResult<Vec<Row>>>()?;
        self.last_id = last_id;
        self.rows.extend(stamped.iter().cloned());
        Ok(stamped)
    }
}

fn stamp(last_id: &mut i64, mut row: Row) -> StoreResult<Row> {
    match row.get(COLUMN_ID).and_then(Value::as_i64) {
        Some(id) => *last_id = (*last_id).max(id),
        None if !row.contains_key(COLUMN_ID) => {
            let id = last_id.checked_add(1).ok_or_else(|| {
                StoreError::InvalidInput("no integer id left to assign".to_string())
            })?;
            row.insert(COLUMN_ID.to_string(), Value::from(id));
            *last_id = id;
        }
        None => {}
    }
    row.entry(COLUMN_CREATED_AT)
        .or_insert_with(|| Value::from(Utc::now().to_rfc3339()));
    Ok(row)
}

impl MemoryTableStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from a `{ "table": [row, ...] }` seed document.
    ///
    /// # Errors
    /// Returns `StoreError::InvalidInput` if a table entry is not a list of
    /// objects.
    pub fn from_seed(seed: Map<String, Value>) -> StoreResult<Self> {
        let mut tables = HashMap::new();
        for (name, rows) in seed {
            let Value::Array(rows) = rows else {
                return Err(StoreError::InvalidInput(format!(
                    "seed for table `{name}` must be a list of rows"
                )));
            };
            let rows = rows
                .into_iter()
                .map(|row| match row {
                    Value::Object(row) => Ok(row),
                    _ => Err(StoreError::InvalidInput(format!(
                        "seed rows for table `{name}` must be objects"
                    ))),
                })
                .collect::<StoreResult<Vec<Row>>>()?;
            let mut table = MemoryTable::default();
            table.push_all(rows)?;
            tables.insert(name, table);
        }
        Ok(Self {
            tables: Arc::new(RwLock::new(tables)),
        })
    }

    /// Returns a snapshot of every row in `table`.
    pub async fn rows(&self, table: &str) -> Vec<Row> {
        let tables = self.tables.read().await;
        tables
            .get(table)
            .map(|table| table.rows.clone())
            .unwrap_or_default()
    }

    pub async fn table_names(&self) -> Vec<String> {
        let tables = self.tables.read().await;
        let mut names: Vec<String> = tables.keys().cloned().collect();
        names.sort();
        names
    }
}

impl TableStore for MemoryTableStore {
    async fn select(&self, table: &str, query: &Select) -> StoreResult<Vec<Row>> {
        let tables = self.tables.read().await;
        let Some(table) = tables.get(table) else {
            return Ok(Vec::new());
        };
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(table
            .rows
            .iter()
            .filter(|row| query.filter.matches(row))
            .take(limit)
            .map(|row| query.project(row))
            .collect())
    }

    async fn insert(&self, table: &str, rows: Vec<Row>) -> StoreResult<Vec<Row>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let mut tables = self.tables.write().await;
        tables.entry(table.to_string()).or_default().push_all(rows)
    }

    async fn update(&self, table: &str, values: Row, filter: &Filter) -> StoreResult<Vec<Row>> {
        require_filter("update", table, filter)?;
        let mut tables = self.tables.write().await;
        let Some(table) = tables.get_mut(table) else {
            return Ok(Vec::new());
        };
        let mut updated = Vec::new();
        for row in table.rows.iter_mut().filter(|row| filter.matches(row)) {
            for (column, value) in &values {
                row.insert(column.clone(), value.clone());
            }
            updated.push(row.clone());
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, filter: &Filter) -> StoreResult<Vec<Row>> {
        require_filter("delete", table, filter)?;
        let mut tables = self.tables.write().await;
        let Some(table) = tables.get_mut(table) else {
            return Ok(Vec::new());
        };
        let (deleted, kept): (Vec<Row>, Vec<Row>) = std::mem::take(&mut table.rows)
            .into_iter()
            .partition(|row| filter.matches(row));
        table.rows = kept;
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn rows(value: Value) -> Vec<Row> {
        value
            .as_array()
            .expect("rows must be a list")
            .iter()
            .filter_map(|row| row.as_object().cloned())
            .collect()
    }

    fn filter(value: Value) -> Filter {
        Filter::from_map(value.as_object().expect("filter must be an object")).expect("valid filter")
    }

    #[tokio::test]
    async fn insert_assigns_ids_and_timestamps() {
        let store = MemoryTableStore::new();

        let inserted = store
            .insert("users", rows(json!([{"name": "John"}, {"name": "Jane"}, {"id": 10, "name": "Jim"}])))
            .await
            .expect("insert succeeds");
        let next = store
            .insert("users", rows(json!([{"name": "Jo"}])))
            .await
            .expect("insert succeeds");

        assert_eq!(inserted.len(), 3);
        assert_eq!(inserted[0].get("id"), Some(&json!(1)));
        assert_eq!(inserted[1].get("id"), Some(&json!(2)));
        assert_eq!(next[0].get("id"), Some(&json!(11)));
        assert!(inserted.iter().all(|row| row.contains_key("created_at")));
    }

    #[tokio::test]
    async fn select_filters_limits_and_projects() {
        let store = MemoryTableStore::new();
        let seed: Vec<Value> = (1..=20).map(|age| json!({"name": format!("user{age}"), "age": age})).collect();
        store.insert("users", rows(Value::Array(seed))).await.expect("seed");

        let query = Select::all()
            .with_columns(vec!["name".to_string(), "age".to_string()])
            .with_filter(filter(json!({"age": {"gt": 15}})))
            .with_limit(3);
        let selected = store.select("users", &query).await.expect("select succeeds");

        assert_eq!(selected.len(), 3);
        assert!(selected.iter().all(|row| row.len() == 2));
        assert!(selected.iter().all(|row| row["age"].as_i64().is_some_and(|age| age > 15)));
    }

    #[tokio::test]
    async fn update_and_delete_touch_only_matching_rows() {
        let store = MemoryTableStore::new();
        store
            .insert("users", rows(json!([
                {"name": "a", "status": "inactive"},
                {"name": "b", "status": "active"},
                {"name": "c", "status": "inactive"}
            ])))
            .await
            .expect("seed");

        let values = json!({"status": "active"}).as_object().cloned().expect("object");
        let updated = store
            .update("users", values, &filter(json!({"status": "inactive"})))
            .await
            .expect("update succeeds");
        assert_eq!(updated.len(), 2);

        let deleted = store
            .delete("users", &filter(json!({"name": "b"})))
            .await
            .expect("delete succeeds");
        assert_eq!(deleted.len(), 1);

        let remaining = store.rows("users").await;
        assert_eq!(remaining.len(), 2);
        assert!(remaining.iter().all(|row| row["status"] == json!("active")));
    }

    #[tokio::test]
    async fn delete_matching_nothing_is_empty_not_an_error() {
        let store = MemoryTableStore::new();
        store.insert("users", rows(json!([{"name": "a"}]))).await.expect("seed");

        let deleted = store
            .delete("users", &filter(json!({"name": "zzz"})))
            .await
            .expect("delete succeeds");

        assert!(deleted.is_empty());
        assert_eq!(store.rows("users").await.len(), 1);
    }

    #[tokio::test]
    async fn writes_without_filter_are_refused() {
        let store = MemoryTableStore::new();
        store.insert("users", rows(json!([{"name": "a"}]))).await.expect("seed");

        let err = store
            .delete("users", &Filter::new())
            .await
            .expect_err("empty filter is refused");

        assert!(matches!(err, StoreError::InvalidInput(_)));
        assert_eq!(store.rows("users").await.len(), 1);
    }

    #[tokio::test]
    async fn exhausted_id_sequence_is_an_error_not_an_overflow() {
        let store = MemoryTableStore::new();
        store
            .insert("users", rows(json!([{"id": i64::MAX, "name": "last"}])))
            .await
            .expect("explicit id is kept");

        let err = store
            .insert("users", rows(json!([{"name": "first"}, {"name": "next"}])))
            .await
            .expect_err("no id left to assign");

        assert!(matches!(err, StoreError::InvalidInput(_)));
        let stored = store.rows("users").await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0]["id"], json!(i64::MAX));

        let with_id = store
            .insert("users", rows(json!([{"id": 7, "name": "explicit"}])))
            .await
            .expect("rows carrying an id still insert");
        assert_eq!(with_id[0]["id"], json!(7));
    }

    #[tokio::test]
    async fn seeds_tables_from_json() {
        let seed = json!({"scouts": [{"id": 4, "full_name": "Ada"}]});
        let store = MemoryTableStore::from_seed(seed.as_object().cloned().expect("object"))
            .expect("valid seed");

        let inserted = store
            .insert("scouts", rows(json!([{"full_name": "Grace"}])))
            .await
            .expect("insert succeeds");

        assert_eq!(store.table_names().await, vec!["scouts".to_string()]);
        assert_eq!(inserted[0].get("id"), Some(&json!(5)));
    }
}
