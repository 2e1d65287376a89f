//! Schema introspection module.
//!
//! Lists tables and describes their columns for PostgreSQL, MySQL and Oracle.
//!
//! # Architecture
//!
//! Catalog SQL lives next to each dialect driver in its `queries` submodule. This
//! module resolves the pool, dispatches to the driver once and applies the rules
//! shared by all dialects.

use crate::db::driver::driver_for;
use crate::db::pool::PoolRegistry;
use crate::error::{DbError, DbResult};
use crate::models::{DatabaseConnectionInfo, TableDescriptor};
use std::sync::Arc;
use tracing::debug;

/// Schema inspector for database introspection.
pub struct SchemaInspector {
    registry: Arc<PoolRegistry>,
}

impl SchemaInspector {
    pub fn new(registry: Arc<PoolRegistry>) -> Self {
        Self { registry }
    }

    /// List the tables visible to the connecting account.
    ///
    /// Scope differs per dialect: the database's schema for MySQL, `public` for
    /// PostgreSQL and the user's own tables for Oracle.
    pub async fn list_table_names(&self, info: &DatabaseConnectionInfo) -> DbResult<Vec<String>> {
        let dialect = info.dialect()?;
        let pool = self.registry.get_pool(info).await?;
        let tables = driver_for(dialect).list_tables(&pool, info).await?;
        debug!(dbms = %dialect, database = %info.database_name, count = tables.len(), "Listed tables");
        Ok(tables)
    }

    /// Describe a table's columns and constraints.
    pub async fn describe_table(
        &self,
        info: &DatabaseConnectionInfo,
        table: &str,
    ) -> DbResult<TableDescriptor> {
        let dialect = info.dialect()?;
        if table.trim().is_empty() {
            return Err(DbError::invalid_input("Table name cannot be empty"));
        }

        let pool = self.registry.get_pool(info).await?;
        let columns = driver_for(dialect)
            .describe_columns(&pool, info, table)
            .await?;
        if columns.is_empty() {
            return Err(DbError::not_found(
                "table",
                table,
                format!(
                    "Check the table name; use list_tables to see the tables in '{}'",
                    info.database_name
                ),
            ));
        }

        debug!(dbms = %dialect, table = %table, columns = columns.len(), "Described table");
        Ok(TableDescriptor::new(table, columns))
    }
}
