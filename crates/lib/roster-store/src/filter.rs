//! Row filters.
//!
//! A filter is parsed from a JSON object mapping column names to conditions:
//! a scalar means equality, `null` means `is null`, and an object of
//! operators (`{"age": {"gt": 18, "lte": 65}}`) applies every operator to the
//! column. A row matches a filter when it matches every condition.

use std::cmp::Ordering;
use std::error::Error;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::Row;

/// Query parameter names the REST backend reserves for itself, including its
/// logical operators.
const RESERVED_COLUMNS: &[&str] = &[
    "select",
    "limit",
    "offset",
    "order",
    "on_conflict",
    "columns",
    "or",
    "and",
    "not",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterError {
    message: String,
}

impl FilterError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for FilterError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    Ilike,
    In,
    Is,
}

impl FilterOp {
    pub const ALL: [Self; 10] = [
        Self::Eq,
        Self::Neq,
        Self::Gt,
        Self::Gte,
        Self::Lt,
        Self::Lte,
        Self::Like,
        Self::Ilike,
        Self::In,
        Self::Is,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Neq => "neq",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Like => "like",
            Self::Ilike => "ilike",
            Self::In => "in",
            Self::Is => "is",
        }
    }

    #[must_use]
    pub fn parse(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == key)
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single `column op value` test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    column: String,
    op: FilterOp,
    value: Value,
}

impl Condition {
    /// Builds a condition after checking the operand fits the operator.
    ///
    /// # Errors
    /// Returns `FilterError` if the column name is unusable or the operand has
    /// the wrong shape for `op`.
    pub fn new(column: impl Into<String>, op: FilterOp, value: Value) -> Result<Self, FilterError> {
        let column = column.into();
        validate_column(&column)?;
        validate_operand(&column, op, &value)?;
        Ok(Self { column, op, value })
    }

    #[must_use]
    pub fn column(&self) -> &str {
        &self.column
    }

    #[must_use]
    pub const fn op(&self) -> FilterOp {
        self.op
    }

    #[must_use]
    pub const fn value(&self) -> &Value {
        &self.value
    }

    #[must_use]
    pub fn matches(&self, row: &Row) -> bool {
        let actual = row.get(&self.column).unwrap_or(&Value::Null);
        match self.op {
            FilterOp::Is => match &self.value {
                Value::Null => actual.is_null(),
                Value::Bool(expected) => actual.as_bool() == Some(*expected),
                _ => false,
            },
            // SQL semantics: null never satisfies a comparison.
            _ if actual.is_null() => false,
            FilterOp::Eq => values_equal(actual, &self.value),
            FilterOp::Neq => !values_equal(actual, &self.value),
            FilterOp::Gt => compare(actual, &self.value) == Some(Ordering::Greater),
            FilterOp::Gte => matches!(
                compare(actual, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FilterOp::Lt => compare(actual, &self.value) == Some(Ordering::Less),
            FilterOp::Lte => matches!(
                compare(actual, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            FilterOp::Like | FilterOp::Ilike => match (actual.as_str(), self.value.as_str()) {
                (Some(text), Some(pattern)) => {
                    like_matches(text, pattern, self.op == FilterOp::Ilike)
                }
                _ => false,
            },
            FilterOp::In => self
                .value
                .as_array()
                .is_some_and(|items| items.iter().any(|item| values_equal(actual, item))),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.column, self.op, self.value)
    }
}

/// Conjunction of conditions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            conditions: Vec::new(),
        }
    }

    /// Filter with a single equality condition.
    ///
    /// # Errors
    /// Returns `FilterError` if the column or value cannot be used for equality.
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Result<Self, FilterError> {
        Ok(Self::new().and(Condition::new(column, FilterOp::Eq, value.into())?))
    }

    #[must_use]
    pub fn and(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Parses the JSON filter mapping accepted by the data tools.
    ///
    /// # Errors
    /// Returns `FilterError` for unknown operators, empty operator objects,
    /// list values without `in`, or operands that do not fit their operator.
    pub fn from_map(map: &Map<String, Value>) -> Result<Self, FilterError> {
        let mut filter = Self::new();
        for (column, value) in map {
            match value {
                Value::Object(operators) => {
                    if operators.is_empty() {
                        return Err(FilterError::new(format!(
                            "filter for `{column}` has no operators"
                        )));
                    }
                    for (key, operand) in operators {
                        let op = FilterOp::parse(key).ok_or_else(|| {
                            FilterError::new(format!(
                                "unsupported filter operator `{key}` on `{column}`"
                            ))
                        })?;
                        filter = filter.and(Condition::new(column.clone(), op, operand.clone())?);
                    }
                }
                Value::Array(_) => {
                    return Err(FilterError::new(format!(
                        "use the `in` operator to match `{column}` against a list"
                    )));
                }
                Value::Null => {
                    filter = filter.and(Condition::new(column.clone(), FilterOp::Is, Value::Null)?);
                }
                scalar => {
                    filter = filter.and(Condition::new(column.clone(), FilterOp::Eq, scalar.clone())?);
                }
            }
        }
        Ok(filter)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    #[must_use]
    pub fn matches(&self, row: &Row) -> bool {
        self.conditions.iter().all(|condition| condition.matches(row))
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, condition) in self.conditions.iter().enumerate() {
            if index > 0 {
                f.write_str(" and ")?;
            }
            write!(f, "{condition}")?;
        }
        Ok(())
    }
}

fn validate_column(column: &str) -> Result<(), FilterError> {
    if column.trim().is_empty() {
        return Err(FilterError::new("filter column name is empty"));
    }
    if RESERVED_COLUMNS.contains(&column) {
        return Err(FilterError::new(format!(
            "`{column}` is reserved and cannot be filtered on"
        )));
    }
    Ok(())
}

fn validate_operand(column: &str, op: FilterOp, value: &Value) -> Result<(), FilterError> {
    let valid = match op {
        FilterOp::Eq | FilterOp::Neq | FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte => {
            is_scalar(value)
        }
        FilterOp::Like | FilterOp::Ilike => value.is_string(),
        FilterOp::In => value
            .as_array()
            .is_some_and(|items| items.iter().all(is_scalar)),
        FilterOp::Is => matches!(value, Value::Null | Value::Bool(_)),
    };
    if valid {
        return Ok(());
    }
    let expected = match op {
        FilterOp::Like | FilterOp::Ilike => "a string pattern",
        FilterOp::In => "a list of strings, numbers, or booleans",
        FilterOp::Is => "null, true, or false",
        _ if value.is_null() => "a non-null value; use `is` to compare with null",
        _ => "a string, number, or boolean",
    };
    Err(FilterError::new(format!(
        "`{op}` on `{column}` expects {expected}"
    )))
}

const fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(_), Value::Number(_)) => compare(left, right) == Some(Ordering::Equal),
        _ => left == right,
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(left), Value::Number(right)) => {
            if let (Some(left), Some(right)) = (left.as_i64(), right.as_i64()) {
                return Some(left.cmp(&right));
            }
            left.as_f64()?.partial_cmp(&right.as_f64()?)
        }
        (Value::String(left), Value::String(right)) => Some(left.cmp(right)),
        (Value::Bool(left), Value::Bool(right)) => Some(left.cmp(right)),
        _ => None,
    }
}

/// SQL `LIKE` matching; `%` and `*` match any run, `_` matches one character.
fn like_matches(text: &str, pattern: &str, case_insensitive: bool) -> bool {
    let (text, pattern) = if case_insensitive {
        (text.to_lowercase(), pattern.to_lowercase())
    } else {
        (text.to_string(), pattern.to_string())
    };
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    let is_any = |ch: char| ch == '%' || ch == '*';

    let (mut ti, mut pi) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while ti < text.len() {
        if pi < pattern.len() && is_any(pattern[pi]) {
            backtrack = Some((pi, ti));
            pi += 1;
        } else if pi < pattern.len() && (pattern[pi] == '_' || pattern[pi] == text[ti]) {
            ti += 1;
            pi += 1;
        } else if let Some((star, mark)) = backtrack {
            pi = star + 1;
            ti = mark + 1;
            backtrack = Some((star, mark + 1));
        } else {
            return false;
        }
    }
    pattern[pi..].iter().all(|ch| is_any(*ch))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(row) => row,
            _ => panic!("test rows must be objects"),
        }
    }

    fn parse(value: Value) -> Result<Filter, FilterError> {
        match value {
            Value::Object(map) => Filter::from_map(&map),
            _ => panic!("test filters must be objects"),
        }
    }

    #[test]
    fn scalar_values_are_equality_conditions() {
        let filter = parse(json!({"status": "inactive", "id": 1})).expect("valid filter");

        assert_eq!(filter.conditions().len(), 2);
        assert!(filter.conditions().iter().all(|c| c.op() == FilterOp::Eq));
        assert!(filter.matches(&row(json!({"id": 1, "status": "inactive"}))));
        assert!(!filter.matches(&row(json!({"id": 2, "status": "inactive"}))));
    }

    #[test]
    fn operator_objects_apply_every_operator() {
        let filter = parse(json!({"age": {"gt": 18, "lte": 30}})).expect("valid filter");

        assert!(filter.matches(&row(json!({"age": 19}))));
        assert!(filter.matches(&row(json!({"age": 30.0}))));
        assert!(!filter.matches(&row(json!({"age": 18}))));
        assert!(!filter.matches(&row(json!({"age": 31}))));
        assert!(!filter.matches(&row(json!({"name": "no age"}))));
    }

    #[test]
    fn null_matches_missing_and_null_columns_only_with_is() {
        let filter = parse(json!({"crew": null})).expect("valid filter");
        assert_eq!(filter.conditions()[0].op(), FilterOp::Is);
        assert!(filter.matches(&row(json!({"crew": null}))));
        assert!(filter.matches(&row(json!({}))));
        assert!(!filter.matches(&row(json!({"crew": "Terns"}))));

        let neq = parse(json!({"crew": {"neq": "Terns"}})).expect("valid filter");
        assert!(!neq.matches(&row(json!({"crew": null}))));
        assert!(neq.matches(&row(json!({"crew": "Kingfishers"}))));
    }

    #[test]
    fn like_and_ilike_use_sql_wildcards() {
        let like = parse(json!({"name": {"like": "Jo%"}})).expect("valid filter");
        assert!(like.matches(&row(json!({"name": "John"}))));
        assert!(!like.matches(&row(json!({"name": "john"}))));

        let ilike = parse(json!({"name": {"ilike": "j_n*"}})).expect("valid filter");
        assert!(ilike.matches(&row(json!({"name": "Jane"}))));
        assert!(ilike.matches(&row(json!({"name": "JON"}))));
        assert!(!ilike.matches(&row(json!({"name": "Joan"}))));
    }

    #[test]
    fn in_matches_any_listed_value() {
        let filter = parse(json!({"id": {"in": [1, 3]}})).expect("valid filter");

        assert!(filter.matches(&row(json!({"id": 3}))));
        assert!(!filter.matches(&row(json!({"id": 2}))));
    }

    #[test]
    fn rejects_malformed_filters() {
        assert!(parse(json!({"age": {"between": [1, 2]}})).is_err());
        assert!(parse(json!({"age": {}})).is_err());
        assert!(parse(json!({"id": [1, 2]})).is_err());
        assert!(parse(json!({"id": {"eq": null}})).is_err());
        assert!(parse(json!({"name": {"like": 3}})).is_err());
        assert!(parse(json!({"active": {"is": "yes"}})).is_err());
        assert!(parse(json!({"limit": 3})).is_err());
        assert!(parse(json!({"": 3})).is_err());
    }

    #[test]
    fn logical_operator_keys_are_not_columns() {
        for key in ["or", "and", "not"] {
            let mut filter = Map::new();
            filter.insert(key.to_string(), json!("x"));
            let err = Filter::from_map(&filter).expect_err("logical key is reserved");
            assert!(err.to_string().contains("reserved"));
        }
        assert!(Condition::new("not", FilterOp::Eq, json!(1)).is_err());
        assert!(parse(json!({"order_id": 3})).is_ok());
    }

    #[test]
    fn strings_compare_lexically() {
        let filter = parse(json!({"joined": {"gte": "2024-01-01"}})).expect("valid filter");

        assert!(filter.matches(&row(json!({"joined": "2024-03-09"}))));
        assert!(!filter.matches(&row(json!({"joined": "2023-12-31"}))));
        assert!(!filter.matches(&row(json!({"joined": 2024}))));
    }
}
