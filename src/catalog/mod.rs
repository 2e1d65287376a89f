//! ERD catalog.
//!
//! The catalog documents tables of the target databases and the relations drawn
//! between them. It is loaded read-only from a JSON file:
//!
//! ```json
//! {
//!   "databases": [{"id": "shop", "dbms": "mysql", "host": "localhost",
//!                  "database_name": "shop", "username": "app", "password": "pw"}],
//!   "tables": [{"id": 1, "database_id": "shop", "name": "users"},
//!              {"id": 2, "database_id": "shop", "name": "orders"}],
//!   "relations": [{"id": 1, "source_table_id": 1, "source_column": "id",
//!                  "target_table_id": 2, "target_column": "user_id",
//!                  "kind": "one-to-many"}]
//! }
//! ```

pub mod browser;
pub mod store;

pub use browser::{DataBrowser, TraversalPlan};
pub use store::{CredentialStore, InMemoryCredentialStore};

use crate::error::{DbError, DbResult};
use crate::models::DatabaseConnectionInfo;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// Credentials of a target database declared in the catalog file.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogDatabase {
    pub id: String,
    #[serde(flatten)]
    pub info: DatabaseConnectionInfo,
}

/// A documented table of a target database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CatalogTable {
    pub id: i64,
    /// Credential store id of the database holding the table
    #[serde(alias = "databaseId")]
    pub database_id: String,
    pub name: String,
}

/// A relation between a column of one table and a column of another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CatalogRelation {
    pub id: i64,
    #[serde(alias = "sourceTableId")]
    pub source_table_id: i64,
    #[serde(alias = "sourceColumn")]
    pub source_column: String,
    #[serde(alias = "targetTableId")]
    pub target_table_id: i64,
    #[serde(alias = "targetColumn")]
    pub target_column: String,
    /// e.g. "one-to-many"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// Tables and relations of the ERD, loaded once at startup.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub databases: Vec<CatalogDatabase>,
    #[serde(default)]
    pub tables: Vec<CatalogTable>,
    #[serde(default)]
    pub relations: Vec<CatalogRelation>,
}

impl Catalog {
    /// Read and validate a catalog file.
    pub fn load(path: &Path) -> DbResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            DbError::invalid_input(format!(
                "Cannot read catalog file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let catalog = Self::from_json(&text)?;
        info!(
            path = %path.display(),
            databases = catalog.databases.len(),
            tables = catalog.tables.len(),
            relations = catalog.relations.len(),
            "Loaded catalog"
        );
        Ok(catalog)
    }

    /// Parse and validate catalog JSON.
    pub fn from_json(text: &str) -> DbResult<Self> {
        let catalog: Self = serde_json::from_str(text)
            .map_err(|e| DbError::invalid_input(format!("Invalid catalog JSON: {}", e)))?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Ids must be unique and every relation must name catalog tables.
    fn validate(&self) -> DbResult<()> {
        let mut table_ids = HashSet::new();
        for table in &self.tables {
            if !table_ids.insert(table.id) {
                return Err(DbError::invalid_input(format!(
                    "Duplicate table id {} in catalog",
                    table.id
                )));
            }
        }

        let mut relation_ids = HashSet::new();
        for relation in &self.relations {
            if !relation_ids.insert(relation.id) {
                return Err(DbError::invalid_input(format!(
                    "Duplicate relation id {} in catalog",
                    relation.id
                )));
            }
            for table_id in [relation.source_table_id, relation.target_table_id] {
                if !table_ids.contains(&table_id) {
                    return Err(DbError::invalid_input(format!(
                        "Relation {} refers to unknown table id {}",
                        relation.id, table_id
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn table(&self, table_id: i64) -> DbResult<&CatalogTable> {
        self.tables
            .iter()
            .find(|t| t.id == table_id)
            .ok_or_else(|| {
                DbError::not_found(
                    "table",
                    table_id.to_string(),
                    "Use search_catalog_table with a table id from the catalog",
                )
            })
    }

    pub fn relation(&self, relation_id: i64) -> DbResult<&CatalogRelation> {
        self.relations
            .iter()
            .find(|r| r.id == relation_id)
            .ok_or_else(|| {
                DbError::not_found(
                    "relation",
                    relation_id.to_string(),
                    "Check the relation id in the catalog",
                )
            })
    }

    /// Relations touching `table_id` on either side.
    pub fn relations_of(&self, table_id: i64) -> Vec<&CatalogRelation> {
        self.relations
            .iter()
            .filter(|r| r.source_table_id == table_id || r.target_table_id == table_id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "tables": [
            {"id": 1, "database_id": "shop", "name": "users"},
            {"id": 2, "databaseId": "shop", "name": "orders"}
        ],
        "relations": [
            {"id": 7, "source_table_id": 1, "source_column": "id",
             "target_table_id": 2, "target_column": "user_id", "kind": "one-to-many"}
        ]
    }"#;

    #[test]
    fn test_lookup_table_and_relation() {
        let catalog = Catalog::from_json(SAMPLE).unwrap();
        assert_eq!(catalog.table(2).unwrap().name, "orders");
        assert_eq!(catalog.relation(7).unwrap().target_column, "user_id");
        assert_eq!(catalog.relations_of(2).len(), 1);
        assert!(catalog.relations_of(3).is_empty());
    }

    #[test]
    fn test_missing_ids_are_not_found() {
        let catalog = Catalog::from_json(SAMPLE).unwrap();
        assert!(matches!(
            catalog.table(9).unwrap_err(),
            DbError::NotFound { ref kind, .. } if kind == "table"
        ));
        assert!(matches!(
            catalog.relation(9).unwrap_err(),
            DbError::NotFound { ref kind, .. } if kind == "relation"
        ));
    }

    #[test]
    fn test_relation_to_unknown_table_rejected() {
        let json = r#"{"tables": [{"id": 1, "database_id": "a", "name": "t"}],
            "relations": [{"id": 1, "source_table_id": 1, "source_column": "id",
                           "target_table_id": 5, "target_column": "t_id"}]}"#;
        let err = Catalog::from_json(json).unwrap_err();
        assert!(err.to_string().contains("unknown table id 5"));
    }

    #[test]
    fn test_duplicate_table_id_rejected() {
        let json = r#"{"tables": [{"id": 1, "database_id": "a", "name": "t"},
                                  {"id": 1, "database_id": "a", "name": "u"}]}"#;
        assert!(Catalog::from_json(json).is_err());
    }

    #[test]
    fn test_databases_carry_credentials() {
        let json = r#"{"databases": [{"id": "shop", "dbms": "mysql", "host": "h",
            "databaseName": "shop", "username": "app", "password": "pw"}]}"#;
        let catalog = Catalog::from_json(json).unwrap();
        assert_eq!(catalog.databases[0].id, "shop");
        assert_eq!(catalog.databases[0].info.password, "pw");
        assert!(catalog.tables.is_empty());
    }

    #[test]
    fn test_empty_object_is_empty_catalog() {
        let catalog = Catalog::from_json("{}").unwrap();
        assert!(catalog.tables.is_empty() && catalog.relations.is_empty());
    }
}
