//! Database client interface and implementations.
//!
//! `TableStore` is the table-scoped surface the rest of the workspace talks
//! to. `RestTableStore` translates it into REST calls against the hosted
//! database; `MemoryTableStore` keeps tables in process for local runs and
//! tests.

use std::error::Error;
use std::fmt;
use std::future::Future;

use roster_store::{Filter, Row};

use crate::backend::BackendError;

pub mod memory;
pub mod rest;

pub use memory::MemoryTableStore;
pub use rest::RestTableStore;

#[derive(Debug)]
pub enum StoreError {
    Backend(BackendError),
    InvalidInput(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend(err) => write!(f, "{err}"),
            Self::InvalidInput(message) => write!(f, "Invalid input: {message}"),
        }
    }
}

impl Error for StoreError {}

impl From<BackendError> for StoreError {
    fn from(err: BackendError) -> Self {
        Self::Backend(err)
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        Self::Backend(err.into())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Projection, filter, and limit for a read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Select {
    pub columns: Option<Vec<String>>,
    pub filter: Filter,
    pub limit: Option<usize>,
}

impl Select {
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = Some(columns);
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The column list in `select=` form; `*` when no projection was requested.
    #[must_use]
    pub fn select_clause(&self) -> String {
        self.columns
            .as_ref()
            .filter(|columns| !columns.is_empty())
            .map_or_else(|| "*".to_string(), |columns| columns.join(","))
    }

    /// Keeps only the requested columns of `row`.
    #[must_use]
    pub fn project(&self, row: &Row) -> Row {
        match self.columns.as_ref().filter(|columns| !columns.is_empty()) {
            None => row.clone(),
            Some(columns) => columns
                .iter()
                .filter_map(|column| row.get(column).map(|value| (column.clone(), value.clone())))
                .collect(),
        }
    }
}

/// Table-scoped database operations.
///
/// Every operation returns the affected rows. `update` and `delete` refuse an
/// empty filter rather than touching every row.
pub trait TableStore: Send + Sync + 'static {
    fn select(
        &self,
        table: &str,
        query: &Select,
    ) -> impl Future<Output = StoreResult<Vec<Row>>> + Send;

    fn insert(
        &self,
        table: &str,
        rows: Vec<Row>,
    ) -> impl Future<Output = StoreResult<Vec<Row>>> + Send;

    fn update(
        &self,
        table: &str,
        values: Row,
        filter: &Filter,
    ) -> impl Future<Output = StoreResult<Vec<Row>>> + Send;

    fn delete(
        &self,
        table: &str,
        filter: &Filter,
    ) -> impl Future<Output = StoreResult<Vec<Row>>> + Send;
}

fn require_filter(operation: &str, table: &str, filter: &Filter) -> StoreResult<()> {
    if filter.is_empty() {
        return Err(StoreError::InvalidInput(format!(
            "refusing to {operation} `{table}` without a filter"
        )));
    }
    Ok(())
}
