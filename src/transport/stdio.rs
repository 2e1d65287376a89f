//! Stdio transport for the MCP server.
//!
//! This transport uses standard input/output for communication,
//! which is the standard mode for CLI-based MCP integrations.

use crate::error::{DbError, DbResult};
use crate::mcp::{BridgeContext, BridgeService};
use crate::transport::{Transport, wait_for_signal};
use rmcp::{ServiceExt, transport::stdio};
use tracing::{info, warn};

/// Stdio transport implementation.
///
/// This transport reads JSON-RPC messages from stdin and writes
/// responses to stdout as MCP JSON-RPC messages.
pub struct StdioTransport {
    context: BridgeContext,
}

impl StdioTransport {
    pub fn new(context: BridgeContext) -> Self {
        Self { context }
    }
}

impl Transport for StdioTransport {
    async fn run(&self) -> DbResult<()> {
        info!("Starting MCP server with stdio transport");

        let service = BridgeService::new(self.context.clone());
        let running_service = service
            .serve(stdio())
            .await
            .map_err(|e| DbError::internal(format!("Failed to start stdio transport: {}", e)))?;

        let shutdown_requested = tokio::select! {
            result = running_service.waiting() => {
                match result {
                    Ok(_quit_reason) => info!("Stdio transport completed normally"),
                    Err(e) => {
                        warn!(error = %e, "Stdio transport error");
                        return Err(DbError::internal(format!("Stdio transport error: {}", e)));
                    }
                }
                false
            }
            _ = wait_for_signal() => {
                info!("Shutdown signal received");
                true
            }
        };

        let pools = self.context.registry.pool_count().await;
        info!(pools, "Stdio transport stopped; pools are released at exit");

        if shutdown_requested {
            // tokio::select! cannot interrupt a blocking stdin read
            std::process::exit(0);
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "stdio"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, InMemoryCredentialStore};
    use crate::db::PoolRegistry;
    use std::sync::Arc;

    #[test]
    fn test_stdio_transport_creation() {
        let context = BridgeContext::new(
            Arc::new(PoolRegistry::default()),
            Arc::new(InMemoryCredentialStore::new()),
            Catalog::default(),
            100,
        );
        let transport = StdioTransport::new(context);
        assert_eq!(transport.name(), "stdio");
    }
}
