//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Identifier quoting and placeholder rules per dialect
//! - Connection pool registry
//! - Dialect drivers (PostgreSQL, MySQL, Oracle)
//! - Schema introspection
//! - Query execution
//! - Connection testing
//! - Type mappings

pub mod dialect;
pub mod driver;
pub mod executor;
pub mod params;
pub mod pool;
pub mod schema;
pub mod tester;
pub mod types;

pub use dialect::{bind_placeholder, sanitize_identifier};
pub use driver::{DialectDriver, driver_for};
pub use executor::{QueryExecutor, build_filtered_query, build_in_list_query, collect_join_values};
pub use pool::{DbPool, PoolKey, PoolRegistry};
pub use schema::SchemaInspector;
pub use tester::test_connection;
