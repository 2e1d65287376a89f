//! Data browsing tools.
//!
//! This module implements the `search_table` and `traverse_relation` MCP tools,
//! plus `search_catalog_table` and `traverse_catalog_relation`, which address
//! tables and relations by their catalog ids, and `import_catalog_table`.

use super::{DescribeTableOutput, TargetDatabase};
use crate::catalog::{CredentialStore, DataBrowser};
use crate::db::QueryExecutor;
use crate::error::DbResult;
use crate::models::{FilterCondition, QueryResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Input for the search_table tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SearchTableInput {
    #[serde(flatten)]
    pub target: TargetDatabase,
    pub table_name: String,
    /// Conditions combined with AND. Omit to select every row (up to the row cap).
    #[serde(default)]
    pub conditions: Vec<FilterCondition>,
}

/// Input for the traverse_relation tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TraverseRelationInput {
    #[serde(flatten)]
    pub target: TargetDatabase,
    /// Rows already fetched, e.g. the rows of a previous search_table call
    pub source_rows: Vec<Map<String, JsonValue>>,
    /// Column of source_rows whose values are looked up
    pub source_column: String,
    pub target_table: String,
    /// Column of target_table matched against the source values
    pub target_column: String,
}

/// Input for the search_catalog_table tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SearchCatalogTableInput {
    /// Table id from the catalog
    pub table_id: i64,
    #[serde(default)]
    pub conditions: Vec<FilterCondition>,
}

/// Input for the traverse_catalog_relation tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TraverseCatalogRelationInput {
    /// Relation id from the catalog
    pub relation_id: i64,
    /// Catalog id of the table the rows come from
    pub from_table_id: i64,
    pub rows: Vec<Map<String, JsonValue>>,
}

/// Input for the import_catalog_table tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ImportCatalogTableInput {
    /// Id of a configured database
    pub database_id: String,
    /// Name of the live table to describe
    pub table_name: String,
}

/// Output from the data browsing tools.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct QueryOutput {
    /// Column names reported by the driver, in result order
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, JsonValue>>,
    pub row_count: usize,
    /// True if more rows existed than the server's row cap
    pub truncated: bool,
    pub execution_time_ms: u64,
}

impl QueryOutput {
    fn from_result(result: QueryResult, started: Instant) -> Self {
        Self {
            row_count: result.rows.len(),
            columns: result.columns,
            rows: result.rows,
            truncated: result.truncated,
            execution_time_ms: started.elapsed().as_millis() as u64,
        }
    }
}

pub struct BrowseToolHandler {
    credentials: Arc<dyn CredentialStore>,
    executor: Arc<QueryExecutor>,
    browser: Arc<DataBrowser>,
}

impl BrowseToolHandler {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        executor: Arc<QueryExecutor>,
        browser: Arc<DataBrowser>,
    ) -> Self {
        Self {
            credentials,
            executor,
            browser,
        }
    }

    pub async fn search_table(&self, input: SearchTableInput) -> DbResult<QueryOutput> {
        let started = Instant::now();
        let info = input.target.resolve(self.credentials.as_ref())?;
        let result = self
            .executor
            .execute_filtered_query(&info, &input.table_name, &input.conditions)
            .await?;
        info!(table = %input.table_name, rows = result.rows.len(), "search_table completed");
        Ok(QueryOutput::from_result(result, started))
    }

    pub async fn traverse_relation(&self, input: TraverseRelationInput) -> DbResult<QueryOutput> {
        let started = Instant::now();
        let info = input.target.resolve(self.credentials.as_ref())?;
        let result = self
            .executor
            .execute_join_traversal(
                &info,
                &input.source_rows,
                &input.source_column,
                &input.target_table,
                &input.target_column,
            )
            .await?;
        info!(
            table = %input.target_table,
            rows = result.rows.len(),
            "traverse_relation completed"
        );
        Ok(QueryOutput::from_result(result, started))
    }

    pub async fn search_catalog_table(
        &self,
        input: SearchCatalogTableInput,
    ) -> DbResult<QueryOutput> {
        let started = Instant::now();
        let result = self
            .browser
            .search_table(input.table_id, &input.conditions)
            .await?;
        Ok(QueryOutput::from_result(result, started))
    }

    pub async fn traverse_catalog_relation(
        &self,
        input: TraverseCatalogRelationInput,
    ) -> DbResult<QueryOutput> {
        let started = Instant::now();
        let result = self
            .browser
            .traverse_relation(input.relation_id, input.from_table_id, &input.rows)
            .await?;
        Ok(QueryOutput::from_result(result, started))
    }

    pub async fn import_catalog_table(
        &self,
        input: ImportCatalogTableInput,
    ) -> DbResult<DescribeTableOutput> {
        let table = self
            .browser
            .import_table(&input.database_id, &input.table_name)
            .await?;
        info!(
            database = %input.database_id,
            table = %table.name,
            columns = table.columns.len(),
            "import_catalog_table completed"
        );
        Ok(table.into())
    }
}
