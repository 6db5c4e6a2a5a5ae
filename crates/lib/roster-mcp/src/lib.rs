//! MCP server implementation for roster.
//!
//! This crate wires the data control plane into rmcp tool handlers and exposes
//! the generic table tools over stdio and streamable HTTP.

mod helpers;
mod tools;
pub mod server;

use std::sync::Arc;

use roster_core::control::{ClientId, DataControlPlane};
use roster_core::store::TableStore;
use rmcp::{
    ErrorData,
    ServerHandler,
    handler::server::tool::ToolRouter,
    tool,
    tool_handler,
    tool_router,
};
use rmcp::model::{CallToolResult, Content, ServerCapabilities, ServerInfo};

pub use server::RateLimitScope;

const SERVER_INSTRUCTIONS: &str = r#"roster provides MCP tools for reading and writing rows in the roster database.

Tools:
- `read_rows`: read rows from `table_name`, optionally projecting `columns`, narrowing with `filters`, and capping with `limit`.
- `create_records`: insert one or more `records` into `table_name`; returns the stored rows.
- `update_records`: apply `updates` to every row in `table_name` matching `filters`; returns the updated rows.
- `delete_records`: delete every row in `table_name` matching `filters`; returns the deleted rows.

Filters:
- `{"name": "Jane"}` matches rows whose `name` equals `Jane`; `{"leader": null}` matches a null `leader`.
- `{"age": {"gt": 18}}` applies an operator. Operators: eq, neq, gt, gte, lt, lte, like, ilike, in, is.
- Every condition must hold. `update_records` and `delete_records` require at least one condition.

Notes:
- Calls are rate limited per session. A limited call fails with status 429 and a `retry_after_secs` hint.
- Use `help` for the command list. `health` returns `ok`."#;

/// MCP server wrapper around the data control plane.
pub struct RosterMcp<S: TableStore> {
    tool_router: ToolRouter<Self>,
    control: Arc<DataControlPlane<S>>,
    client_id: ClientId,
}

impl<S: TableStore> Clone for RosterMcp<S> {
    fn clone(&self) -> Self {
        Self {
            tool_router: self.tool_router.clone(),
            control: Arc::clone(&self.control),
            client_id: self.client_id.clone(),
        }
    }
}

impl<S: TableStore> RosterMcp<S> {
    /// Creates a server whose calls count against the shared `default` bucket.
    #[must_use]
    pub fn new(control: DataControlPlane<S>) -> Self {
        Self::with_control(Arc::new(control), ClientId::global())
    }

    /// Creates a server over a shared control plane, rate limited as `client_id`.
    #[must_use]
    pub fn with_control(control: Arc<DataControlPlane<S>>, client_id: ClientId) -> Self {
        let tool_router = Self::tool_router_core()
            + Self::tool_router_data()
            + Self::tool_router_context();
        Self {
            tool_router,
            control,
            client_id,
        }
    }

    #[must_use]
    pub const fn client_id(&self) -> &ClientId {
        &self.client_id
    }
}

#[tool_router(router = tool_router_core, vis = "pub")]
impl<S: TableStore> RosterMcp<S> {
    #[tool(description = "Health check. Returns 'ok'.")]
    async fn health(&self) -> Result<CallToolResult, ErrorData> {
        Ok(CallToolResult::success(vec![Content::text("ok")]))
    }
}

#[tool_handler]
impl<S: TableStore> ServerHandler for RosterMcp<S> {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(SERVER_INSTRUCTIONS.to_string()),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}
