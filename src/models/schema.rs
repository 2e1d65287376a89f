//! Schema-related data models.
//!
//! Introspection results are normalized into a dialect-neutral shape: a table is a
//! name plus its columns, and each column carries an ordered list of constraint tags.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const PRIMARY_KEY: &str = "PRIMARY KEY";
pub const NOT_NULL: &str = "NOT NULL";
pub const UNIQUE: &str = "UNIQUE";
pub const AUTO_INCREMENT: &str = "AUTO_INCREMENT";
/// Reported by some catalogs, never returned to callers.
pub const CHECK: &str = "CHECK";

/// Build a `DEFAULT <expr>` tag.
pub fn default_tag(expr: &str) -> String {
    format!("DEFAULT {}", expr.trim())
}

/// Column metadata in dialect-neutral form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ColumnDescriptor {
    pub name: String,
    /// Upper-cased native type name (e.g., "INT", "CHARACTER VARYING", "VARCHAR2")
    #[serde(rename = "type")]
    pub data_type: String,
    /// Ordered tags: PRIMARY KEY, NOT NULL, UNIQUE, DEFAULT <expr>, AUTO_INCREMENT
    pub constraints: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl ColumnDescriptor {
    /// Create a column with no constraints. The type name is upper-cased.
    pub fn new(name: impl Into<String>, native_type: &str) -> Self {
        Self {
            name: name.into(),
            data_type: native_type.trim().to_uppercase(),
            constraints: Vec::new(),
            comment: None,
        }
    }

    /// Append a constraint tag. Duplicates and CHECK tags are ignored.
    pub fn push_constraint(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if tag.is_empty() || tag == CHECK || self.constraints.contains(&tag) {
            return;
        }
        self.constraints.push(tag);
    }

    /// Builder form of [`push_constraint`](Self::push_constraint).
    pub fn with_constraint(mut self, tag: impl Into<String>) -> Self {
        self.push_constraint(tag);
        self
    }

    /// Apply the cross-dialect normalization rules.
    ///
    /// A primary key implies NOT NULL, so the NOT NULL tag is dropped when
    /// PRIMARY KEY is present.
    pub fn normalized(mut self) -> Self {
        if self.has_constraint(PRIMARY_KEY) {
            self.constraints.retain(|c| c != NOT_NULL);
        }
        self
    }

    pub fn has_constraint(&self, tag: &str) -> bool {
        self.constraints.iter().any(|c| c == tag)
    }

    pub fn is_primary_key(&self) -> bool {
        self.has_constraint(PRIMARY_KEY)
    }
}

/// A table and its columns, in catalog order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TableDescriptor {
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
}

impl TableDescriptor {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDescriptor>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Names of the primary key columns.
    pub fn primary_key(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.is_primary_key())
            .map(|c| c.name.as_str())
            .collect()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }
}
