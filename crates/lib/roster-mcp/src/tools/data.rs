use rmcp::{
    ErrorData,
    handler::server::wrapper::Parameters,
    model::{CallToolResult, Content},
    schemars,
    tool,
    tool_router,
};
use roster_core::control::{
    CreateRecordsRequest,
    DeleteRecordsRequest,
    ReadRowsRequest,
    UpdateRecordsRequest,
};
use roster_core::store::TableStore;
use roster_store::Row;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{RosterMcp, helpers};

/// Parameters for reading rows from a table.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ReadRowsParams {
    pub table_name: String,
    pub columns: Option<Vec<String>>,
    pub filters: Option<Map<String, Value>>,
    pub limit: Option<usize>,
}

/// Parameters for inserting records into a table.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CreateRecordsParams {
    pub table_name: String,
    pub records: Vec<Map<String, Value>>,
}

/// Parameters for updating the rows matching a filter.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct UpdateRecordsParams {
    pub table_name: String,
    pub filters: Map<String, Value>,
    pub updates: Map<String, Value>,
}

/// Parameters for deleting the rows matching a filter.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct DeleteRecordsParams {
    pub table_name: String,
    pub filters: Map<String, Value>,
}

impl From<ReadRowsParams> for ReadRowsRequest {
    fn from(params: ReadRowsParams) -> Self {
        Self {
            table_name: params.table_name,
            columns: params.columns,
            filters: params.filters,
            limit: params.limit,
        }
    }
}

impl From<CreateRecordsParams> for CreateRecordsRequest {
    fn from(params: CreateRecordsParams) -> Self {
        Self {
            table_name: params.table_name,
            records: params.records,
        }
    }
}

impl From<UpdateRecordsParams> for UpdateRecordsRequest {
    fn from(params: UpdateRecordsParams) -> Self {
        Self {
            table_name: params.table_name,
            filters: params.filters,
            updates: params.updates,
        }
    }
}

impl From<DeleteRecordsParams> for DeleteRecordsRequest {
    fn from(params: DeleteRecordsParams) -> Self {
        Self {
            table_name: params.table_name,
            filters: params.filters,
        }
    }
}

fn rows_result(rows: Vec<Row>) -> Result<CallToolResult, ErrorData> {
    Ok(CallToolResult::success(vec![Content::json(rows)?]))
}

#[tool_router(router = tool_router_data, vis = "pub")]
impl<S: TableStore> RosterMcp<S> {
    #[tool(description = "Read rows from a table. Optional column projection, filters, and row limit.")]
    async fn read_rows(
        &self,
        Parameters(params): Parameters<ReadRowsParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let rows = self
            .control
            .read_rows(&self.client_id, params.into())
            .await
            .map_err(helpers::map_control_err)?;
        rows_result(rows)
    }

    #[tool(description = "Insert one or more records into a table. Returns the stored rows.")]
    async fn create_records(
        &self,
        Parameters(params): Parameters<CreateRecordsParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let rows = self
            .control
            .create_records(&self.client_id, params.into())
            .await
            .map_err(helpers::map_control_err)?;
        rows_result(rows)
    }

    #[tool(description = "Update every row matching the filters. Filters are required. Returns the updated rows.")]
    async fn update_records(
        &self,
        Parameters(params): Parameters<UpdateRecordsParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let rows = self
            .control
            .update_records(&self.client_id, params.into())
            .await
            .map_err(helpers::map_control_err)?;
        rows_result(rows)
    }

    #[tool(description = "Delete every row matching the filters. Filters are required. Returns the deleted rows.")]
    async fn delete_records(
        &self,
        Parameters(params): Parameters<DeleteRecordsParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let rows = self
            .control
            .delete_records(&self.client_id, params.into())
            .await
            .map_err(helpers::map_control_err)?;
        rows_result(rows)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use rmcp::model::ErrorCode;
    use roster_core::control::{ClientId, DataControlPlane};
    use roster_core::rate_limit::{RateLimitConfig, RateLimiter};
    use roster_core::store::MemoryTableStore;
    use serde_json::json;

    use super::*;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("object")
    }

    fn server(max_requests: usize) -> RosterMcp<MemoryTableStore> {
        let limiter = RateLimiter::new(RateLimitConfig::new(Duration::from_secs(60), max_requests));
        RosterMcp::new(DataControlPlane::new(MemoryTableStore::new(), limiter))
    }

    fn result_rows(result: &CallToolResult) -> Vec<Value> {
        let value = serde_json::to_value(result).expect("result serializes");
        let text = value["content"][0]["text"].as_str().expect("text content");
        serde_json::from_str(text).expect("rows are JSON")
    }

    #[tokio::test]
    async fn create_then_read_through_tools() {
        let server = server(100);

        let created = server
            .create_records(Parameters(CreateRecordsParams {
                table_name: "users".to_string(),
                records: vec![
                    object(json!({"name": "John", "age": 30})),
                    object(json!({"name": "Jane", "age": 12})),
                ],
            }))
            .await
            .expect("create succeeds");
        assert_eq!(result_rows(&created).len(), 2);

        let read = server
            .read_rows(Parameters(ReadRowsParams {
                table_name: "users".to_string(),
                columns: Some(vec!["name".to_string()]),
                filters: Some(object(json!({"age": {"gte": 18}}))),
                limit: None,
            }))
            .await
            .expect("read succeeds");
        assert_eq!(result_rows(&read), vec![json!({"name": "John"})]);
    }

    #[tokio::test]
    async fn update_and_delete_return_affected_rows() {
        let server = server(100);
        server
            .create_records(Parameters(CreateRecordsParams {
                table_name: "users".to_string(),
                records: vec![object(json!({"name": "a", "status": "inactive"}))],
            }))
            .await
            .expect("seed");

        let updated = server
            .update_records(Parameters(UpdateRecordsParams {
                table_name: "users".to_string(),
                filters: object(json!({"status": "inactive"})),
                updates: object(json!({"status": "active"})),
            }))
            .await
            .expect("update succeeds");
        assert_eq!(result_rows(&updated)[0]["status"], json!("active"));

        let deleted = server
            .delete_records(Parameters(DeleteRecordsParams {
                table_name: "users".to_string(),
                filters: object(json!({"name": "nobody"})),
            }))
            .await
            .expect("delete succeeds");
        assert!(result_rows(&deleted).is_empty());
    }

    #[tokio::test]
    async fn invalid_requests_are_invalid_params() {
        let server = server(100);

        let error = server
            .delete_records(Parameters(DeleteRecordsParams {
                table_name: "users".to_string(),
                filters: Map::new(),
            }))
            .await
            .expect_err("filters are required");

        assert_eq!(error.code, ErrorCode::INVALID_PARAMS);
        assert_eq!(error.data, Some(json!({"status": 400, "retryable": false})));
    }

    #[tokio::test(start_paused = true)]
    async fn sessions_are_limited_independently() {
        let limiter = RateLimiter::new(RateLimitConfig::new(Duration::from_secs(60), 1));
        let control = Arc::new(DataControlPlane::new(MemoryTableStore::new(), limiter));
        let first = RosterMcp::with_control(Arc::clone(&control), ClientId::new("session-1"));
        let second = RosterMcp::with_control(control, ClientId::new("session-2"));
        let read = || {
            Parameters(ReadRowsParams {
                table_name: "users".to_string(),
                columns: None,
                filters: None,
                limit: None,
            })
        };

        first.read_rows(read()).await.expect("first call");
        let error = first.read_rows(read()).await.expect_err("limited");
        assert_eq!(error.data.as_ref().map(|data| data["status"].clone()), Some(json!(429)));
        assert_eq!(error.data.as_ref().map(|data| data["retryable"].clone()), Some(json!(true)));

        second.read_rows(read()).await.expect("other session has its own quota");
    }
}
