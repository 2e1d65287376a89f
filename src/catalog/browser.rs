//! Data browsing over the catalog.
//!
//! Resolves catalog ids to target databases and tables, then delegates to the
//! query executor and schema inspector.

use super::{Catalog, CatalogTable, CredentialStore};
use crate::db::{QueryExecutor, SchemaInspector};
use crate::error::{DbError, DbResult};
use crate::models::{DatabaseConnectionInfo, FilterCondition, QueryResult, TableDescriptor};
use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;
use tracing::info;

/// Which side of a relation a traversal reads and which it queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraversalPlan {
    /// Column read from the rows already shown
    pub read_column: String,
    /// Table queried for matching rows
    pub target: CatalogTable,
    /// Column of `target` matched against the read values
    pub match_column: String,
}

impl Catalog {
    /// Plan a traversal of `relation_id` starting from `from_table_id`.
    ///
    /// Starting from the source table walks towards the target table; starting
    /// from the target table walks back.
    pub fn plan_traversal(&self, relation_id: i64, from_table_id: i64) -> DbResult<TraversalPlan> {
        let relation = self.relation(relation_id)?;
        let plan = if relation.source_table_id == from_table_id {
            TraversalPlan {
                read_column: relation.source_column.clone(),
                target: self.table(relation.target_table_id)?.clone(),
                match_column: relation.target_column.clone(),
            }
        } else if relation.target_table_id == from_table_id {
            TraversalPlan {
                read_column: relation.target_column.clone(),
                target: self.table(relation.source_table_id)?.clone(),
                match_column: relation.source_column.clone(),
            }
        } else {
            return Err(DbError::invalid_input(format!(
                "Relation {} does not involve table {}",
                relation_id, from_table_id
            )));
        };
        Ok(plan)
    }
}

pub struct DataBrowser {
    credentials: Arc<dyn CredentialStore>,
    catalog: Arc<Catalog>,
    executor: Arc<QueryExecutor>,
    inspector: Arc<SchemaInspector>,
}

impl DataBrowser {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        catalog: Arc<Catalog>,
        executor: Arc<QueryExecutor>,
        inspector: Arc<SchemaInspector>,
    ) -> Self {
        Self {
            credentials,
            catalog,
            executor,
            inspector,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Connection details for `database_id`.
    pub fn resolve_database(&self, database_id: &str) -> DbResult<DatabaseConnectionInfo> {
        self.credentials.get(database_id).ok_or_else(|| {
            DbError::not_found(
                "database",
                database_id,
                "Use list_databases to see the configured database ids",
            )
        })
    }

    /// Rows of a catalog table matching every condition.
    pub async fn search_table(
        &self,
        table_id: i64,
        conditions: &[FilterCondition],
    ) -> DbResult<QueryResult> {
        let table = self.catalog.table(table_id)?;
        let info = self.resolve_database(&table.database_id)?;
        self.executor
            .execute_filtered_query(&info, &table.name, conditions)
            .await
    }

    /// Rows on the other side of a relation, matched against `rows`.
    pub async fn traverse_relation(
        &self,
        relation_id: i64,
        from_table_id: i64,
        rows: &[Map<String, JsonValue>],
    ) -> DbResult<QueryResult> {
        let plan = self.catalog.plan_traversal(relation_id, from_table_id)?;
        // The queried table's own database serves the query
        let info = self.resolve_database(&plan.target.database_id)?;
        info!(
            relation = relation_id,
            from_table = from_table_id,
            to_table = %plan.target.name,
            "Traversing relation"
        );
        self.executor
            .execute_join_traversal(
                &info,
                rows,
                &plan.read_column,
                &plan.target.name,
                &plan.match_column,
            )
            .await
    }

    /// Describe a live table so it can be added to the diagram.
    pub async fn import_table(
        &self,
        database_id: &str,
        table_name: &str,
    ) -> DbResult<TableDescriptor> {
        let info = self.resolve_database(database_id)?;
        self.inspector.describe_table(&info, table_name).await
    }
}
