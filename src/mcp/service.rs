//! MCP service implementation using rmcp.
//!
//! This module defines the BridgeService struct with all tools exposed via the
//! MCP protocol using the rmcp framework's macros.

use crate::catalog::{Catalog, CredentialStore, DataBrowser};
use crate::db::{PoolRegistry, QueryExecutor, SchemaInspector};
use crate::tools::{
    BrowseToolHandler, ConnectionToolHandler, DescribeTableInput, DescribeTableOutput,
    ImportCatalogTableInput, ListDatabasesOutput, ListTablesInput, ListTablesOutput, QueryOutput, SchemaToolHandler,
    SearchCatalogTableInput, SearchTableInput, TestConnectionInput, TestConnectionOutput,
    TraverseCatalogRelationInput, TraverseRelationInput,
};
use rmcp::Json;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use std::sync::Arc;

/// Shared state behind every service instance.
///
/// The HTTP transport builds one service per session; all of them share the
/// same pools, credentials and catalog through this context.
#[derive(Clone)]
pub struct BridgeContext {
    pub registry: Arc<PoolRegistry>,
    pub credentials: Arc<dyn CredentialStore>,
    pub inspector: Arc<SchemaInspector>,
    pub executor: Arc<QueryExecutor>,
    pub browser: Arc<DataBrowser>,
}

impl BridgeContext {
    pub fn new(
        registry: Arc<PoolRegistry>,
        credentials: Arc<dyn CredentialStore>,
        catalog: Catalog,
        max_rows: u32,
    ) -> Self {
        let inspector = Arc::new(SchemaInspector::new(registry.clone()));
        let executor = Arc::new(QueryExecutor::with_max_rows(registry.clone(), max_rows));
        let browser = Arc::new(DataBrowser::new(
            credentials.clone(),
            Arc::new(catalog),
            executor.clone(),
            inspector.clone(),
        ));
        Self {
            registry,
            credentials,
            inspector,
            executor,
            browser,
        }
    }
}

#[derive(Clone)]
pub struct BridgeService {
    context: BridgeContext,
    /// Tool router for MCP tool dispatch (auto-generated)
    tool_router: ToolRouter<Self>,
}

impl BridgeService {
    pub fn new(context: BridgeContext) -> Self {
        Self {
            context,
            tool_router: Self::tool_router(),
        }
    }

    fn schema_handler(&self) -> SchemaToolHandler {
        SchemaToolHandler::new(
            self.context.credentials.clone(),
            self.context.inspector.clone(),
        )
    }

    fn browse_handler(&self) -> BrowseToolHandler {
        BrowseToolHandler::new(
            self.context.credentials.clone(),
            self.context.executor.clone(),
            self.context.browser.clone(),
        )
    }
}

#[tool_router]
impl BridgeService {
    #[tool(
        description = "List the configured target databases.\nReturns ids, DBMS, host, port, database name and user. Passwords are never returned."
    )]
    async fn list_databases(&self) -> Json<ListDatabasesOutput> {
        let handler = ConnectionToolHandler::new(self.context.credentials.clone());
        Json(handler.list_databases())
    }

    #[tool(
        description = "Check whether a database can be reached with the given credentials.\nAlways returns {success, message}; failures are reported, not raised."
    )]
    async fn test_connection(
        &self,
        Parameters(input): Parameters<TestConnectionInput>,
    ) -> Json<TestConnectionOutput> {
        let handler = ConnectionToolHandler::new(self.context.credentials.clone());
        Json(handler.test_connection(input).await)
    }

    #[tool(
        description = "List table names in a database.\nScope: the database's schema for MySQL, `public` for PostgreSQL, the user's own tables for Oracle."
    )]
    async fn list_tables(
        &self,
        Parameters(input): Parameters<ListTablesInput>,
    ) -> Result<Json<ListTablesOutput>, McpError> {
        self.schema_handler()
            .list_tables(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Describe a table's columns in ordinal order.\nEach column has an upper-cased type and constraint tags: PRIMARY KEY, NOT NULL, UNIQUE, DEFAULT <expr>, AUTO_INCREMENT."
    )]
    async fn describe_table(
        &self,
        Parameters(input): Parameters<DescribeTableInput>,
    ) -> Result<Json<DescribeTableOutput>, McpError> {
        self.schema_handler()
            .describe_table(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Select rows of a table matching all conditions (AND).\nOperators: =, !=, >, <, >=, <=, LIKE. Values are bound as parameters.\nResults are capped; `truncated` is true when more rows existed."
    )]
    async fn search_table(
        &self,
        Parameters(input): Parameters<SearchTableInput>,
    ) -> Result<Json<QueryOutput>, McpError> {
        self.browse_handler()
            .search_table(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Follow a relation: select rows of target_table whose target_column equals any non-null value of source_column in source_rows.\nFails if source_rows hold no value for source_column."
    )]
    async fn traverse_relation(
        &self,
        Parameters(input): Parameters<TraverseRelationInput>,
    ) -> Result<Json<QueryOutput>, McpError> {
        self.browse_handler()
            .traverse_relation(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Like search_table, addressing the table by its catalog id.\nThe table's database comes from the catalog."
    )]
    async fn search_catalog_table(
        &self,
        Parameters(input): Parameters<SearchCatalogTableInput>,
    ) -> Result<Json<QueryOutput>, McpError> {
        self.browse_handler()
            .search_catalog_table(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Follow a catalog relation from the rows of one of its tables.\nFrom the source table it queries the target table; from the target table it queries the source table."
    )]
    async fn traverse_catalog_relation(
        &self,
        Parameters(input): Parameters<TraverseCatalogRelationInput>,
    ) -> Result<Json<QueryOutput>, McpError> {
        self.browse_handler()
            .traverse_catalog_relation(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Describe a live table of a configured database so it can be added to the catalog.\nReturns the same shape as describe_table."
    )]
    async fn import_catalog_table(
        &self,
        Parameters(input): Parameters<ImportCatalogTableInput>,
    ) -> Result<Json<DescribeTableOutput>, McpError> {
        self.browse_handler()
            .import_catalog_table(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }
}

#[tool_handler]
impl ServerHandler for BridgeService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "erd-schema-bridge".to_owned(),
                title: Some("ERD Schema Bridge".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Schema introspection and data browsing for PostgreSQL, MySQL and Oracle.\n\
                \n\
                ## Workflow\n\
                1. Call `list_databases` to get configured database ids\n\
                2. Pass `database_id`, or an inline `connection` object, to the other tools\n\
                3. `list_tables` and `describe_table` explore the schema\n\
                4. `search_table` fetches rows; `traverse_relation` follows a column to related rows\n\
                \n\
                ## Catalog\n\
                When the server has a catalog, `search_catalog_table` and `traverse_catalog_relation`\n\
                address tables and relations by catalog id instead of by name.\n\
                `import_catalog_table` describes a live table for adding it to the catalog."
                    .to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCredentialStore;

    fn create_test_service() -> BridgeService {
        let context = BridgeContext::new(
            Arc::new(PoolRegistry::default()),
            Arc::new(InMemoryCredentialStore::new()),
            Catalog::default(),
            50,
        );
        BridgeService::new(context)
    }

    #[test]
    fn test_server_info() {
        let service = create_test_service();
        let info = service.get_info();
        assert_eq!(info.server_info.name, "erd-schema-bridge");
        assert!(info.capabilities.tools.is_some());
    }

    #[test]
    fn test_context_applies_row_cap() {
        let service = create_test_service();
        assert_eq!(service.context.executor.max_rows(), 50);
    }

    #[test]
    fn test_all_tools_registered() {
        let service = create_test_service();
        let mut names: Vec<String> = service
            .tool_router
            .list_all()
            .into_iter()
            .map(|t| t.name.to_string())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "describe_table",
                "import_catalog_table",
                "list_databases",
                "list_tables",
                "search_catalog_table",
                "search_table",
                "test_connection",
                "traverse_catalog_relation",
                "traverse_relation",
            ]
        );
    }
}
