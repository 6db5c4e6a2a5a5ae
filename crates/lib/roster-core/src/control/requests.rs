//! Request shapes for the table operations and their validation.
//!
//! Validation runs before the rate limiter and before any database call, so
//! a malformed request never consumes quota or causes a side effect.

use roster_store::schema::is_table_identifier;
use roster_store::{Filter, Row};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ControlError;
use crate::store::Select;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReadRowsRequest {
    pub table_name: String,
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    #[serde(default)]
    pub filters: Option<Map<String, Value>>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateRecordsRequest {
    pub table_name: String,
    pub records: Vec<Row>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateRecordsRequest {
    pub table_name: String,
    pub filters: Map<String, Value>,
    pub updates: Row,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteRecordsRequest {
    pub table_name: String,
    pub filters: Map<String, Value>,
}

pub(crate) struct ValidatedRead {
    pub table: String,
    pub query: Select,
}

pub(crate) struct ValidatedCreate {
    pub table: String,
    pub rows: Vec<Row>,
}

pub(crate) struct ValidatedUpdate {
    pub table: String,
    pub filter: Filter,
    pub values: Row,
}

pub(crate) struct ValidatedDelete {
    pub table: String,
    pub filter: Filter,
}

impl ReadRowsRequest {
    pub(crate) fn validate(self) -> Result<ValidatedRead, ControlError> {
        let table = validate_table(&self.table_name)?;
        let mut query = Select::all();
        if let Some(columns) = self.columns {
            query = query.with_columns(validate_columns(columns)?);
        }
        if let Some(filters) = self.filters {
            query = query.with_filter(Filter::from_map(&filters)?);
        }
        if let Some(limit) = self.limit {
            if limit == 0 {
                return Err(invalid("limit must be a positive number of rows"));
            }
            query = query.with_limit(limit);
        }
        Ok(ValidatedRead { table, query })
    }
}

impl CreateRecordsRequest {
    pub(crate) fn validate(self) -> Result<ValidatedCreate, ControlError> {
        let table = validate_table(&self.table_name)?;
        if self.records.is_empty() {
            return Err(invalid("records must contain at least one row"));
        }
        Ok(ValidatedCreate {
            table,
            rows: self.records,
        })
    }
}

impl UpdateRecordsRequest {
    pub(crate) fn validate(self) -> Result<ValidatedUpdate, ControlError> {
        let table = validate_table(&self.table_name)?;
        let filter = required_filter(&self.filters, "update")?;
        if self.updates.is_empty() {
            return Err(invalid("updates must set at least one column"));
        }
        Ok(ValidatedUpdate {
            table,
            filter,
            values: self.updates,
        })
    }
}

impl DeleteRecordsRequest {
    pub(crate) fn validate(self) -> Result<ValidatedDelete, ControlError> {
        let table = validate_table(&self.table_name)?;
        let filter = required_filter(&self.filters, "delete")?;
        Ok(ValidatedDelete { table, filter })
    }
}

fn invalid(message: impl Into<String>) -> ControlError {
    ControlError::Validation(message.into())
}

fn validate_table(table_name: &str) -> Result<String, ControlError> {
    let trimmed = table_name.trim();
    if trimmed.is_empty() {
        return Err(invalid("table_name is required"));
    }
    if !is_table_identifier(trimmed) {
        return Err(invalid(format!("`{trimmed}` is not a valid table name")));
    }
    Ok(trimmed.to_string())
}

fn validate_columns(columns: Vec<String>) -> Result<Vec<String>, ControlError> {
    columns
        .into_iter()
        .map(|column| {
            let trimmed = column.trim();
            if trimmed.is_empty() || trimmed.contains([',', '(', ')']) {
                Err(invalid(format!("`{column}` is not a valid column name")))
            } else {
                Ok(trimmed.to_string())
            }
        })
        .collect()
}

fn required_filter(filters: &Map<String, Value>, operation: &str) -> Result<Filter, ControlError> {
    let filter = Filter::from_map(filters)?;
    if filter.is_empty() {
        return Err(invalid(format!(
            "filters are required to {operation} records"
        )));
    }
    Ok(filter)
}
