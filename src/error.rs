//! Error types for the schema bridge.
//!
//! This module defines all error types using `thiserror`. Every variant carries a
//! human-readable message; connection and query failures also carry a suggestion
//! that is forwarded to MCP clients in the error `data` object.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Unsupported DBMS: {dbms}")]
    UnsupportedDialect { dbms: String },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("{kind} '{name}' not found")]
    NotFound {
        /// e.g. "database", "table", "relation"
        kind: String,
        name: String,
        hint: String,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Query failed: {message}")]
    QueryExecution {
        message: String,
        /// e.g., "42P01" for undefined table, "ORA-00942" for Oracle
        code: Option<String>,
        suggestion: String,
    },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create an unsupported dialect error.
    pub fn unsupported_dialect(dbms: impl Into<String>) -> Self {
        Self::UnsupportedDialect { dbms: dbms.into() }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a not found error for a database, table or relation.
    pub fn not_found(
        kind: impl Into<String>,
        name: impl Into<String>,
        hint: impl Into<String>,
    ) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
            hint: hint.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a query execution error with an optional driver error code.
    pub fn query_execution(
        message: impl Into<String>,
        code: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::QueryExecution {
            message: message.into(),
            code,
            suggestion: suggestion.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::QueryExecution { suggestion, .. } => Some(suggestion),
            Self::NotFound { hint, .. } => Some(hint),
            _ => None,
        }
    }
}

/// Convert sqlx errors to DbError.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(
                msg.to_string(),
                "Check the host, port, database name and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                DbError::query_execution(
                    db_err.message(),
                    code,
                    "Check the table and column names and the value types",
                )
            }
            sqlx::Error::RowNotFound => DbError::query_execution(
                "No rows returned",
                None,
                "Verify the query conditions match existing data",
            ),
            sqlx::Error::PoolTimedOut => DbError::connection(
                "Timed out acquiring a pooled connection",
                "The database may be overloaded or unreachable; retry later",
            ),
            sqlx::Error::PoolClosed => {
                DbError::connection("Connection pool is closed", "Restart the server")
            }
            sqlx::Error::Io(io_err) => DbError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => DbError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => DbError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnNotFound(col) => DbError::query_execution(
                format!("Column not found: {}", col),
                None,
                "Check the column name",
            ),
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => DbError::internal(format!("Decode error: {}", source)),
            sqlx::Error::WorkerCrashed => DbError::internal("Database worker crashed"),
            _ => DbError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Convert Oracle client errors to DbError.
impl From<oracle::Error> for DbError {
    fn from(err: oracle::Error) -> Self {
        match err.db_error() {
            Some(db_err) => {
                let code = Some(format!("ORA-{:05}", db_err.code()));
                DbError::query_execution(
                    db_err.message().to_string(),
                    code,
                    "Check the table and column names and the value types",
                )
            }
            None => DbError::connection(
                err.to_string(),
                "Check that the Oracle client libraries are installed and the listener is reachable",
            ),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Build suggestion data as JSON value.
fn suggestion_data(suggestion: Option<&str>) -> Option<serde_json::Value> {
    suggestion.map(|s| serde_json::json!({ "suggestion": s }))
}

/// Convert DbError to MCP ErrorData for semantic error categorization.
/// Includes the suggestion field in the `data` object when available.
impl From<DbError> for rmcp::ErrorData {
    fn from(err: DbError) -> Self {
        match &err {
            DbError::UnsupportedDialect { .. } => rmcp::ErrorData::invalid_params(
                err.to_string(),
                suggestion_data(Some("Use one of: postgresql, mysql, oracle")),
            ),
            DbError::InvalidInput { .. } => {
                rmcp::ErrorData::invalid_params(err.to_string(), suggestion_data(err.suggestion()))
            }

            DbError::NotFound { hint, .. } => {
                rmcp::ErrorData::resource_not_found(err.to_string(), suggestion_data(Some(hint)))
            }

            DbError::Connection { suggestion, .. } => {
                rmcp::ErrorData::internal_error(err.to_string(), suggestion_data(Some(suggestion)))
            }

            // Driver rejections keep their error code in the message
            DbError::QueryExecution {
                message,
                code,
                suggestion,
            } => {
                let msg = match code {
                    Some(code) => format!("{} ({})", message, code),
                    None => message.clone(),
                };
                rmcp::ErrorData::invalid_params(msg, suggestion_data(Some(suggestion)))
            }

            DbError::Internal { .. } => rmcp::ErrorData::internal_error(err.to_string(), None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DbError::connection("Failed to connect", "Check credentials");
        assert!(err.to_string().contains("Connection failed"));

        let err = DbError::unsupported_dialect("sqlserver");
        assert_eq!(err.to_string(), "Unsupported DBMS: sqlserver");

        let err = DbError::not_found("table", "orders", "check the name");
        assert_eq!(err.to_string(), "table 'orders' not found");
    }

    #[test]
    fn test_error_suggestion() {
        let err = DbError::query_execution(
            "syntax error",
            Some("42601".to_string()),
            "Check SQL syntax",
        );
        assert_eq!(err.suggestion(), Some("Check SQL syntax"));
        assert_eq!(DbError::invalid_input("x").suggestion(), None);
    }

    #[test]
    fn test_unsupported_dialect_maps_to_invalid_params() {
        let mcp_err: rmcp::ErrorData = DbError::unsupported_dialect("db2").into();
        assert_eq!(mcp_err.code.0, -32602);
    }

    #[test]
    fn test_invalid_input_maps_to_invalid_params() {
        let mcp_err: rmcp::ErrorData = DbError::invalid_input("bad input").into();
        assert_eq!(mcp_err.code.0, -32602);
    }

    #[test]
    fn test_not_found_maps_to_resource_not_found() {
        let err = DbError::not_found("relation", "r1", "verify the relation id");
        let mcp_err: rmcp::ErrorData = err.into();
        assert_eq!(mcp_err.code.0, -32002);
        let data = mcp_err.data.unwrap();
        assert_eq!(data["suggestion"], "verify the relation id");
    }

    #[test]
    fn test_connection_maps_to_internal_error() {
        let mcp_err: rmcp::ErrorData = DbError::connection("failed", "try again").into();
        assert_eq!(mcp_err.code.0, -32603);
        assert_eq!(mcp_err.data.unwrap()["suggestion"], "try again");
    }

    #[test]
    fn test_query_execution_includes_code() {
        let err = DbError::query_execution(
            "relation \"nope\" does not exist",
            Some("42P01".to_string()),
            "check table",
        );
        let mcp_err: rmcp::ErrorData = err.into();
        assert_eq!(mcp_err.code.0, -32602);
        assert!(mcp_err.message.contains("42P01"));
    }

    #[test]
    fn test_internal_maps_to_internal_error() {
        let mcp_err: rmcp::ErrorData = DbError::internal("unknown error").into();
        assert_eq!(mcp_err.code.0, -32603);
        assert!(mcp_err.data.is_none());
    }
}
