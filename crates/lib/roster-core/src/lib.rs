//! Core services for roster.
//!
//! This crate owns the clients for the hosted database and auth APIs (with
//! in-memory stand-ins for local runs and tests), the fixed-window rate
//! limiter, the data control plane that validates and executes generic table
//! operations, and the invitation and scout removal procedures.

pub mod auth;
pub mod backend;
pub mod control;
pub mod invite;
pub mod rate_limit;
pub mod removal;
pub mod store;
