//! MCP tool implementations.
//!
//! This module contains the tool handlers:
//! - `connection`: `list_databases`, `test_connection`
//! - `schema`: `list_tables`, `describe_table`
//! - `browse`: `search_table`, `traverse_relation`, their catalog variants and
//!   `import_catalog_table`

pub mod browse;
pub mod connection;
pub mod schema;

pub use browse::{
    BrowseToolHandler, ImportCatalogTableInput, QueryOutput, SearchCatalogTableInput,
    SearchTableInput, TraverseCatalogRelationInput, TraverseRelationInput,
};
pub use connection::{
    ConnectionToolHandler, ListDatabasesOutput, TestConnectionInput, TestConnectionOutput,
};
pub use schema::{
    DescribeTableInput, DescribeTableOutput, ListTablesInput, ListTablesOutput, SchemaToolHandler,
};

use crate::catalog::CredentialStore;
use crate::error::{DbError, DbResult};
use crate::models::DatabaseConnectionInfo;
use schemars::JsonSchema;
use serde::Deserialize;

/// The database a tool call addresses: a configured id or inline credentials.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct TargetDatabase {
    /// Database id from list_databases
    #[serde(default)]
    pub database_id: Option<String>,
    /// Inline connection details, used when no database_id is given
    #[serde(default)]
    pub connection: Option<DatabaseConnectionInfo>,
}

impl TargetDatabase {
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            database_id: Some(id.into()),
            connection: None,
        }
    }

    pub fn inline(info: DatabaseConnectionInfo) -> Self {
        Self {
            database_id: None,
            connection: Some(info),
        }
    }

    /// Resolve to connection details. A non-empty `database_id` wins.
    pub fn resolve(&self, credentials: &dyn CredentialStore) -> DbResult<DatabaseConnectionInfo> {
        let id = self
            .database_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty());

        match (id, &self.connection) {
            (Some(id), _) => credentials.get(id).ok_or_else(|| {
                DbError::not_found(
                    "database",
                    id,
                    "Use list_databases to see the configured database ids",
                )
            }),
            (None, Some(info)) => Ok(info.clone()),
            (None, None) => Err(DbError::invalid_input(
                "Either database_id or connection is required. Call list_databases to get available database ids.",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCredentialStore;

    fn store() -> InMemoryCredentialStore {
        let store = InMemoryCredentialStore::new();
        store.insert(
            "crm",
            DatabaseConnectionInfo::new("postgresql", "db", None, "crm", "u", "p"),
        );
        store
    }

    #[test]
    fn test_resolve_by_id() {
        let info = TargetDatabase::by_id(" crm ").resolve(&store()).unwrap();
        assert_eq!(info.database_name, "crm");
    }

    #[test]
    fn test_resolve_unknown_id() {
        let err = TargetDatabase::by_id("billing").resolve(&store()).unwrap_err();
        assert!(matches!(err, DbError::NotFound { ref kind, .. } if kind == "database"));
    }

    #[test]
    fn test_resolve_inline() {
        let inline = DatabaseConnectionInfo::new("mysql", "h", Some(3307), "shop", "u", "p");
        let info = TargetDatabase::inline(inline).resolve(&store()).unwrap();
        assert_eq!(info.port, Some(3307));
    }

    #[test]
    fn test_blank_id_falls_back_to_inline() {
        let target = TargetDatabase {
            database_id: Some("  ".into()),
            connection: Some(DatabaseConnectionInfo::new("mysql", "h", None, "shop", "u", "p")),
        };
        assert_eq!(target.resolve(&store()).unwrap().database_name, "shop");
    }

    #[test]
    fn test_resolve_requires_a_target() {
        let err = TargetDatabase::default().resolve(&store()).unwrap_err();
        assert!(err.to_string().contains("database_id or connection"));
    }

    #[test]
    fn test_deserialize_inline_connection() {
        let json = r#"{"connection": {"dbms": "oracle", "host": "h", "database_name": "XE",
            "username": "scott", "password": "tiger"}}"#;
        let target: TargetDatabase = serde_json::from_str(json).unwrap();
        assert!(target.database_id.is_none());
        assert_eq!(target.connection.unwrap().username, "scott");
    }
}
