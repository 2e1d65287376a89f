//! ERD Schema Bridge - Main entry point.
//!
//! Serves schema introspection and data browsing tools for PostgreSQL, MySQL
//! and Oracle over MCP (Model Context Protocol).

use erd_schema_bridge::catalog::{Catalog, CredentialStore, InMemoryCredentialStore};
use erd_schema_bridge::config::{Config, PoolOptions, TransportMode};
use erd_schema_bridge::db::PoolRegistry;
use erd_schema_bridge::mcp::BridgeContext;
use erd_schema_bridge::transport::{HttpTransport, StdioTransport, Transport};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr; stdout carries the stdio transport.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse_args();
    init_tracing(&config);

    info!(
        transport = %config.transport,
        "Starting ERD Schema Bridge v{}",
        env!("CARGO_PKG_VERSION")
    );

    let db_configs = config.parse_databases()?;
    for db_config in &db_configs {
        db_config.pool_options.validate()?;
    }

    let catalog = match &config.catalog {
        Some(path) => Catalog::load(path)?,
        None => Catalog::default(),
    };

    let registry = Arc::new(PoolRegistry::new(PoolOptions::default()));
    let store = InMemoryCredentialStore::from_configs(&db_configs);
    for db_config in &db_configs {
        info!(
            id = %db_config.id,
            dbms = %db_config.info.dbms,
            host = %db_config.info.host,
            "Registered database"
        );
        registry.register_options(&db_config.info, db_config.pool_options.clone())?;
    }
    // Command-line entries take precedence over catalog entries with the same id
    for database in &catalog.databases {
        store.insert_if_absent(database.id.clone(), database.info.clone());
    }

    if store.is_empty() {
        warn!("No databases configured; tools accept inline connection details only");
    }

    let credentials: Arc<dyn CredentialStore> = Arc::new(store);
    let context = BridgeContext::new(
        registry,
        credentials,
        catalog,
        config.effective_max_rows(),
    );

    let result = match config.transport {
        TransportMode::Stdio => {
            info!("Using stdio transport");
            StdioTransport::new(context).run().await
        }
        TransportMode::Http => {
            info!(
                host = %config.http_host,
                port = config.http_port,
                endpoint = %config.mcp_endpoint,
                "Using HTTP transport"
            );
            HttpTransport::new(
                context,
                &config.http_host,
                config.http_port,
                &config.mcp_endpoint,
            )
            .run()
            .await
        }
    };

    if let Err(e) = result {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
