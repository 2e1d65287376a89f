//! Connection tools.
//!
//! This module implements the `list_databases` and `test_connection` MCP tools.

use super::TargetDatabase;
use crate::catalog::CredentialStore;
use crate::db::test_connection;
use crate::models::{ConnectionSummary, TestResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Output for the list_databases tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ListDatabasesOutput {
    /// Configured databases, without passwords
    pub databases: Vec<ConnectionSummary>,
    pub count: usize,
}

/// Input for the test_connection tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TestConnectionInput {
    #[serde(flatten)]
    pub target: TargetDatabase,
}

/// Output for the test_connection tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct TestConnectionOutput {
    pub success: bool,
    pub message: String,
}

impl From<TestResult> for TestConnectionOutput {
    fn from(result: TestResult) -> Self {
        Self {
            success: result.success,
            message: result.message,
        }
    }
}

pub struct ConnectionToolHandler {
    credentials: Arc<dyn CredentialStore>,
}

impl ConnectionToolHandler {
    pub fn new(credentials: Arc<dyn CredentialStore>) -> Self {
        Self { credentials }
    }

    pub fn list_databases(&self) -> ListDatabasesOutput {
        let databases = self.credentials.list();
        let count = databases.len();
        ListDatabasesOutput { databases, count }
    }

    /// Probe the target. Resolution failures are reported like connection failures.
    pub async fn test_connection(&self, input: TestConnectionInput) -> TestConnectionOutput {
        let result = match input.target.resolve(self.credentials.as_ref()) {
            Ok(info) => test_connection(&info).await,
            Err(err) => TestResult::failed(err.to_string()),
        };
        info!(success = result.success, "test_connection completed");
        result.into()
    }
}
