//! Connection testing.
//!
//! A probe opens one unpooled connection and closes it. Every failure is reported
//! in the returned [`TestResult`]; nothing is raised to the caller.

use crate::db::driver::driver_for;
use crate::error::DbError;
use crate::models::{DatabaseConnectionInfo, Dialect, TestResult};
use tracing::{info, warn};

pub const SUCCESS_MESSAGE: &str = "Connection succeeded.";
pub const SQLITE_NOT_IMPLEMENTED: &str = "SQLite is not implemented.";

/// Probe whether `info` can be connected to.
pub async fn test_connection(info: &DatabaseConnectionInfo) -> TestResult {
    let dialect = match Dialect::parse(&info.dbms) {
        Ok(dialect) => dialect,
        Err(_) if info.dbms.trim().eq_ignore_ascii_case("sqlite") => {
            return TestResult::failed(SQLITE_NOT_IMPLEMENTED);
        }
        Err(err) => return TestResult::failed(err.to_string()),
    };

    match driver_for(dialect).probe(info).await {
        Ok(()) => {
            info!(dbms = %dialect, host = %info.host, database = %info.database_name, "Connection test succeeded");
            TestResult::ok(SUCCESS_MESSAGE)
        }
        Err(err) => {
            warn!(dbms = %dialect, host = %info.host, error = %err, "Connection test failed");
            TestResult::failed(failure_message(&err))
        }
    }
}

fn failure_message(err: &DbError) -> String {
    match err {
        DbError::Connection { .. } => err.to_string(),
        other => format!("Connection failed: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sqlite_reports_not_implemented() {
        let info = DatabaseConnectionInfo::new("SQLite", "", None, "file.db", "", "");
        let result = test_connection(&info).await;
        assert!(!result.success);
        assert_eq!(result.message, SQLITE_NOT_IMPLEMENTED);
    }

    #[tokio::test]
    async fn test_unknown_dbms_reports_unsupported() {
        let info = DatabaseConnectionInfo::new("db2", "h", None, "d", "u", "p");
        let result = test_connection(&info).await;
        assert!(!result.success);
        assert_eq!(result.message, "Unsupported DBMS: db2");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_reported_not_raised() {
        // Port 1 on localhost refuses connections immediately
        let info = DatabaseConnectionInfo::new("mysql", "127.0.0.1", Some(1), "d", "u", "p");
        let result = test_connection(&info).await;
        assert!(!result.success);
        assert!(result.message.starts_with("Connection failed:"));
    }

    #[test]
    fn test_failure_message_prefix() {
        let err = DbError::connection("refused", "start it");
        assert_eq!(failure_message(&err), "Connection failed: refused");
        let err = DbError::not_found("database", "crm", "check");
        assert_eq!(failure_message(&err), "Connection failed: database 'crm' not found");
    }
}
