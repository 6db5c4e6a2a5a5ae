use std::borrow::Cow;

use rmcp::ErrorData;
use rmcp::model::ErrorCode;
use roster_core::control::ControlError;
use serde_json::json;

pub fn mcp_err(code: ErrorCode, message: impl Into<Cow<'static, str>>) -> ErrorData {
    ErrorData {
        code,
        message: message.into(),
        data: None,
    }
}

/// Maps a control-plane failure onto an MCP error.
///
/// `data` carries the HTTP-style status and whether the caller may retry,
/// plus `retry_after_secs` for rate-limited calls.
pub fn map_control_err(err: ControlError) -> ErrorData {
    let code = match &err {
        ControlError::Validation(_) => ErrorCode::INVALID_PARAMS,
        ControlError::RateLimited(_) => ErrorCode::INVALID_REQUEST,
        ControlError::Store(_) | ControlError::Timeout(_) => ErrorCode::INTERNAL_ERROR,
    };
    let mut data = json!({
        "status": err.status_code(),
        "retryable": err.is_retryable(),
    });
    if let ControlError::RateLimited(limited) = &err {
        data["retry_after_secs"] = json!(limited.retry_after_secs());
    }
    let mut error = mcp_err(code, err.to_string());
    error.data = Some(data);
    error
}
