//! Data models for the schema bridge.
//!
//! This module re-exports all model types used throughout the application.

pub mod connection;
pub mod query;
pub mod schema;

// Re-export commonly used types
pub use connection::{ConnectionSummary, DatabaseConnectionInfo, Dialect};
pub use query::{
    BuiltQuery, DEFAULT_MAX_ROWS, FilterCondition, MAX_ROW_LIMIT, Operator, QueryParam,
    QueryResult, TestResult,
};
pub use schema::{ColumnDescriptor, TableDescriptor};
