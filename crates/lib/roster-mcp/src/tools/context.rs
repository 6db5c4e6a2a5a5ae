use rmcp::{
    ErrorData,
    model::{CallToolResult, Content},
    schemars,
    tool,
    tool_router,
};
use roster_core::store::TableStore;
use serde::{Deserialize, Serialize};

use crate::RosterMcp;

/// Payload listing the MCP commands this server exposes.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct HelpCommands {
    pub commands: Vec<String>,
}

impl Default for HelpCommands {
    fn default() -> Self {
        Self {
            commands: vec![
                "help - List the MCP commands this server exposes.".to_string(),
                "health - Returns 'ok' when the server is up.".to_string(),
                "read_rows - Read rows from a table with optional columns, filters, and limit."
                    .to_string(),
                "create_records - Insert records into a table and return the stored rows."
                    .to_string(),
                "update_records - Update rows matching the filters and return them."
                    .to_string(),
                "delete_records - Delete rows matching the filters and return them."
                    .to_string(),
                "filter_help - Describes the filter syntax accepted by the table tools."
                    .to_string(),
            ],
        }
    }
}

#[tool_router(router = tool_router_context, vis = "pub")]
impl<S: TableStore> RosterMcp<S> {
    #[tool(description = "List the MCP commands this server exposes.")]
    async fn help(&self) -> Result<CallToolResult, ErrorData> {
        Ok(CallToolResult::success(vec![Content::json(HelpCommands::default())?]))
    }

    #[tool(description = "Describes the filter syntax accepted by read_rows, update_records, and delete_records.")]
    async fn filter_help(&self) -> Result<CallToolResult, ErrorData> {
        Ok(CallToolResult::success(vec![Content::text(
r#"
1. `filters` is an object keyed by column name. Every condition must hold for a row to match.
2. A plain value means equality:
    - `{"status": "active"}`
    - `{"leader": null}` matches rows where `leader` is null.
3. An object applies operators to the column:
    - `{"age": {"gt": 18}}`
    - `{"age": {"gte": 18, "lt": 65}}` (both must hold)
    - `{"crew": {"in": ["Terns", "Sea Lions"]}}`
    - `{"full_name": {"ilike": "jo%"}}` (`%` or `*` match any run, `_` one character)
    - `{"leader": {"is": true}}` (`is` accepts null, true, or false)
4. Operators: eq, neq, gt, gte, lt, lte, like, ilike, in, is.
5. `update_records` and `delete_records` refuse to run without at least one condition.
"#
        )]))
    }
}
