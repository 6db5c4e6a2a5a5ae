use reqwest::{Method, Response, Url};
use roster_store::schema::is_table_identifier;
use roster_store::{Condition, Filter, FilterOp, Row};
use serde_json::Value;
use tracing::debug;

use super::{Select, StoreError, StoreResult, TableStore, require_filter};
use crate::backend::{BackendClient, BackendError, check_status};

const REST_PREFIX: &str = "rest/v1/";
const PREFER_HEADER: &str = "Prefer";
const RETURN_REPRESENTATION: &str = "return=representation";

/// `TableStore` backed by the hosted database's REST interface.
#[derive(Debug, Clone)]
pub struct RestTableStore {
    client: BackendClient,
}

impl RestTableStore {
    #[must_use]
    pub const fn new(client: BackendClient) -> Self {
        Self { client }
    }

    /// The table's REST endpoint. Only bare identifiers are addressable; a
    /// dotted name would be read as a table literally named that way.
    fn table_url(&self, table: &str) -> StoreResult<Url> {
        if !is_table_identifier(table) {
            return Err(StoreError::InvalidInput(format!(
                "`{table}` is not a table in the exposed schema"
            )));
        }
        Ok(self.client.endpoint(&format!("{REST_PREFIX}{table}"))?)
    }
}

impl TableStore for RestTableStore {
    async fn select(&self, table: &str, query: &Select) -> StoreResult<Vec<Row>> {
        let mut params = vec![("select".to_string(), query.select_clause())];
        params.extend(filter_params(&query.filter));
        if let Some(limit) = query.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        debug!(table, params = ?params, "select");
        let response = self
            .client
            .request(Method::GET, self.table_url(table)?)
            .query(&params)
            .send()
            .await?;
        read_rows(response).await
    }

    async fn insert(&self, table: &str, rows: Vec<Row>) -> StoreResult<Vec<Row>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        debug!(table, rows = rows.len(), "insert");
        let response = self
            .client
            .request(Method::POST, self.table_url(table)?)
            .header(PREFER_HEADER, RETURN_REPRESENTATION)
            .json(&rows)
            .send()
            .await?;
        read_rows(response).await
    }

    async fn update(&self, table: &str, values: Row, filter: &Filter) -> StoreResult<Vec<Row>> {
        require_filter("update", table, filter)?;
        debug!(table, filter = %filter, "update");
        let response = self
            .client
            .request(Method::PATCH, self.table_url(table)?)
            .header(PREFER_HEADER, RETURN_REPRESENTATION)
            .query(&filter_params(filter))
            .json(&values)
            .send()
            .await?;
        read_rows(response).await
    }

    async fn delete(&self, table: &str, filter: &Filter) -> StoreResult<Vec<Row>> {
        require_filter("delete", table, filter)?;
        debug!(table, filter = %filter, "delete");
        let response = self
            .client
            .request(Method::DELETE, self.table_url(table)?)
            .header(PREFER_HEADER, RETURN_REPRESENTATION)
            .query(&filter_params(filter))
            .send()
            .await?;
        read_rows(response).await
    }
}

async fn read_rows(response: Response) -> StoreResult<Vec<Row>> {
    let response = check_status(response).await?;
    let body = response.bytes().await?;
    if body.is_empty() {
        return Ok(Vec::new());
    }
    let rows = serde_json::from_slice::<Vec<Row>>(&body)
        .map_err(|err| BackendError::Decode(format!("expected a JSON array of rows: {err}")))?;
    Ok(rows)
}

fn filter_params(filter: &Filter) -> Vec<(String, String)> {
    filter
        .conditions()
        .iter()
        .map(|condition| (condition.column().to_string(), render_condition(condition)))
        .collect()
}

/// Renders `op.value` in the REST filter syntax, e.g. `gt.18` or `in.(1,2)`.
fn render_condition(condition: &Condition) -> String {
    let operand = match (condition.op(), condition.value()) {
        (FilterOp::In, Value::Array(items)) => {
            let items: Vec<String> = items.iter().map(render_list_item).collect();
            format!("({})", items.join(","))
        }
        (_, value) => render_scalar(value),
    };
    format!("{}.{operand}", condition.op())
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn render_list_item(value: &Value) -> String {
    match value {
        Value::String(text) if needs_quoting(text) => {
            let escaped = text.replace('\\', "\\\\").replace('"', "\\\"");
            format!("\"{escaped}\"")
        }
        other => render_scalar(other),
    }
}

fn needs_quoting(text: &str) -> bool {
    text.is_empty()
        || text
            .chars()
            .any(|ch| matches!(ch, ',' | '(' | ')' | '"' | '\\' | '.' | ':') || ch.is_whitespace())
}
