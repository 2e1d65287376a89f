//! Query-related data models.
//!
//! This module defines filter conditions, bind values and query results.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Default cap on rows returned by a data query.
pub const DEFAULT_MAX_ROWS: u32 = 1000;

/// Maximum allowed row cap.
pub const MAX_ROW_LIMIT: u32 = 100_000;

/// Comparison operators accepted in filter conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Operator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    NotEq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    GtEq,
    #[serde(rename = "<=")]
    LtEq,
    #[serde(rename = "LIKE", alias = "like")]
    Like,
}

impl Operator {
    pub const ALL: [Operator; 7] = [
        Operator::Eq,
        Operator::NotEq,
        Operator::Gt,
        Operator::Lt,
        Operator::GtEq,
        Operator::LtEq,
        Operator::Like,
    ];

    /// SQL text of the operator.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::GtEq => ">=",
            Self::LtEq => "<=",
            Self::Like => "LIKE",
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// One `<column> <operator> <value>` clause of a filtered query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FilterCondition {
    pub column: String,
    pub operator: Operator,
    /// Bound as a parameter, never interpolated
    pub value: String,
}

impl FilterCondition {
    pub fn new(column: impl Into<String>, operator: Operator, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            operator,
            value: value.into(),
        }
    }
}

/// A value bound to a statement placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryParam {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl QueryParam {
    /// Convert a JSON scalar taken from a result row. Nulls yield `None`.
    ///
    /// Arrays and objects are bound as their JSON text.
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Null => None,
            JsonValue::Bool(b) => Some(Self::Bool(*b)),
            JsonValue::Number(n) => Some(match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or_default()),
            }),
            JsonValue::String(s) => Some(Self::String(s.clone())),
            other => Some(Self::String(other.to_string())),
        }
    }
}

/// A SELECT statement with its bind values, ready for execution.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub binds: Vec<QueryParam>,
}

/// Rows and driver-reported column names of a data query.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct QueryResult {
    pub rows: Vec<serde_json::Map<String, JsonValue>>,
    pub columns: Vec<String>,
    /// True when more rows existed than the configured cap
    #[serde(default)]
    pub truncated: bool,
}

impl QueryResult {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Outcome of a connection probe. Failures are reported here, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TestResult {
    pub success: bool,
    pub message: String,
}

impl TestResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}
