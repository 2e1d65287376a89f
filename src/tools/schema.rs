//! Schema introspection tools.
//!
//! This module implements the `list_tables` and `describe_table` MCP tools.

use super::TargetDatabase;
use crate::catalog::CredentialStore;
use crate::db::SchemaInspector;
use crate::error::DbResult;
use crate::models::{ColumnDescriptor, TableDescriptor};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Input for the list_tables tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListTablesInput {
    #[serde(flatten)]
    pub target: TargetDatabase,
}

/// Output from the list_tables tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ListTablesOutput {
    /// Table names in catalog order
    pub tables: Vec<String>,
    pub count: usize,
}

/// Input for the describe_table tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DescribeTableInput {
    #[serde(flatten)]
    pub target: TargetDatabase,
    /// Name of the table to describe
    pub table_name: String,
}

/// Output from the describe_table tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct DescribeTableOutput {
    pub table_name: String,
    /// Columns in ordinal order, with upper-cased types and constraint tags
    pub columns: Vec<ColumnDescriptor>,
    /// Column names that form the primary key
    pub primary_key: Vec<String>,
}

impl From<TableDescriptor> for DescribeTableOutput {
    fn from(table: TableDescriptor) -> Self {
        let primary_key = table.primary_key().into_iter().map(String::from).collect();
        Self {
            table_name: table.name,
            columns: table.columns,
            primary_key,
        }
    }
}

pub struct SchemaToolHandler {
    credentials: Arc<dyn CredentialStore>,
    inspector: Arc<SchemaInspector>,
}

impl SchemaToolHandler {
    pub fn new(credentials: Arc<dyn CredentialStore>, inspector: Arc<SchemaInspector>) -> Self {
        Self {
            credentials,
            inspector,
        }
    }

    pub async fn list_tables(&self, input: ListTablesInput) -> DbResult<ListTablesOutput> {
        let info = input.target.resolve(self.credentials.as_ref())?;
        let tables = self.inspector.list_table_names(&info).await?;
        let count = tables.len();
        info!(database = %info.database_name, count, "list_tables completed");
        Ok(ListTablesOutput { tables, count })
    }

    pub async fn describe_table(&self, input: DescribeTableInput) -> DbResult<DescribeTableOutput> {
        let info = input.target.resolve(self.credentials.as_ref())?;
        let table = self
            .inspector
            .describe_table(&info, &input.table_name)
            .await?;
        info!(table = %table.name, columns = table.columns.len(), "describe_table completed");
        Ok(table.into())
    }
}
