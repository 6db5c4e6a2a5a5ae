//! Storage models and schema helpers for roster.
//!
//! This crate defines the data model shared by the database backends, the
//! tool control plane, and the invitation procedure: opaque table rows, the
//! filter model applied to them, and the typed records written during an
//! invitation.

pub mod filter;
pub mod models;
pub mod schema;

pub use filter::{Condition, Filter, FilterError, FilterOp};
pub use models::*;
