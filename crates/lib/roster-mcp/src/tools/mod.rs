//! MCP tool modules.
//!
//! Tools are grouped by domain: generic table access and contextual help.

pub mod data;
mod context;
