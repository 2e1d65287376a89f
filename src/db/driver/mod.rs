//! Dialect drivers.
//!
//! Each supported DBMS implements [`DialectDriver`]: pool construction, catalog
//! queries, row fetching and an unpooled connection probe. Callers pick the
//! driver with [`driver_for`] and never match on the dialect themselves.

mod mysql;
mod oracle;
mod postgres;

use crate::config::PoolOptions;
use crate::db::pool::DbPool;
use crate::db::types::RowToJson;
use crate::error::{DbError, DbResult};
use crate::models::{
    BuiltQuery, ColumnDescriptor, DatabaseConnectionInfo, Dialect, QueryResult,
};
use async_trait::async_trait;
use tracing::warn;

pub use self::mysql::MySqlDriver;
pub use self::oracle::OracleDriver;
pub use self::postgres::PostgresDriver;

/// Per-dialect database access.
#[async_trait]
pub trait DialectDriver: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Open a connection pool for `info`.
    async fn build_pool(
        &self,
        info: &DatabaseConnectionInfo,
        options: &PoolOptions,
    ) -> DbResult<DbPool>;

    /// Names of the tables visible to the connecting account.
    async fn list_tables(&self, pool: &DbPool, info: &DatabaseConnectionInfo)
    -> DbResult<Vec<String>>;

    /// Columns of `table` in catalog order, with normalized constraint tags.
    async fn describe_columns(
        &self,
        pool: &DbPool,
        info: &DatabaseConnectionInfo,
        table: &str,
    ) -> DbResult<Vec<ColumnDescriptor>>;

    /// Run a built SELECT and return at most `max_rows` rows.
    async fn fetch_rows(
        &self,
        pool: &DbPool,
        query: &BuiltQuery,
        max_rows: u32,
    ) -> DbResult<QueryResult>;

    /// Open and close a single unpooled connection.
    async fn probe(&self, info: &DatabaseConnectionInfo) -> DbResult<()>;
}

/// Driver for `dialect`.
pub fn driver_for(dialect: Dialect) -> &'static dyn DialectDriver {
    match dialect {
        Dialect::PostgreSQL => &PostgresDriver,
        Dialect::MySQL => &MySqlDriver,
        Dialect::Oracle => &OracleDriver,
    }
}

/// Error for a pool handed to the wrong driver.
pub(crate) fn pool_mismatch(expected: Dialect, pool: &DbPool) -> DbError {
    DbError::internal(format!(
        "{} driver received a {} pool",
        expected,
        pool.dialect()
    ))
}

/// Map a failure to open a connection to `NotFound` for a missing database, or
/// `Connection` with a suggestion otherwise.
pub(crate) fn connect_error(
    dialect: Dialect,
    info: &DatabaseConnectionInfo,
    error: impl std::fmt::Display,
) -> DbError {
    let message = error.to_string();
    let lower = message.to_lowercase();

    let missing_database = lower.contains("unknown database")
        || (lower.contains("database") && lower.contains("does not exist"))
        // ORA-12514: listener does not know of the requested service
        || lower.contains("ora-12514");
    if missing_database {
        return DbError::not_found(
            "database",
            &info.database_name,
            "Verify the database name exists on the server",
        );
    }

    DbError::connection(
        format!(
            "Failed to connect to {} at {}:{}: {}",
            dialect,
            info.host,
            info.resolved_port(dialect),
            message
        ),
        connection_suggestion(dialect, &lower),
    )
}

/// Generate a helpful suggestion for connection errors.
fn connection_suggestion(dialect: Dialect, lower_error: &str) -> String {
    if lower_error.contains("connection refused") || lower_error.contains("ora-12541") {
        return format!("Check that the {} server is running and accessible", dialect);
    }

    if lower_error.contains("authentication")
        || lower_error.contains("password")
        || lower_error.contains("access denied")
        || lower_error.contains("ora-01017")
    {
        return "Verify the username and password".to_string();
    }

    if lower_error.contains("tls") || lower_error.contains("ssl") {
        return "Check TLS/SSL configuration or try disabling it".to_string();
    }

    if lower_error.contains("dpi-1047") {
        return "Install the Oracle Instant Client libraries and add them to the library path"
            .to_string();
    }

    format!(
        "Check the host, port (default {}) and database name",
        dialect.default_port()
    )
}

/// Convert fetched rows into a `QueryResult`.
///
/// `rows` may hold one row more than `max_rows`; its presence marks the result as
/// truncated. `fallback_columns` is used when no row carries column metadata.
pub(crate) fn rows_to_result<R: RowToJson>(
    rows: Vec<R>,
    max_rows: u32,
    fallback_columns: Vec<String>,
) -> QueryResult {
    let limit = max_rows as usize;
    let truncated = rows.len() > limit;
    let columns = rows
        .first()
        .map(|r| r.column_names())
        .unwrap_or(fallback_columns);

    if truncated {
        warn!(limit = max_rows, "Query result truncated");
    }

    QueryResult {
        rows: rows.iter().take(limit).map(|r| r.to_json_map()).collect(),
        columns,
        truncated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, Value};

    struct FakeRow(Vec<(&'static str, i64)>);

    impl RowToJson for FakeRow {
        fn to_json_map(&self) -> Map<String, Value> {
            self.0
                .iter()
                .map(|(k, v)| (k.to_string(), Value::from(*v)))
                .collect()
        }

        fn column_names(&self) -> Vec<String> {
            self.0.iter().map(|(k, _)| k.to_string()).collect()
        }
    }

    fn info() -> DatabaseConnectionInfo {
        DatabaseConnectionInfo::new("postgresql", "pg.local", None, "crm", "app", "pw")
    }

    #[test]
    fn test_driver_for_matches_dialect() {
        for dialect in Dialect::ALL {
            assert_eq!(driver_for(dialect).dialect(), dialect);
        }
    }

    #[test]
    fn test_connect_error_missing_database_is_not_found() {
        let err = connect_error(
            Dialect::PostgreSQL,
            &info(),
            "error returned from database: database \"crm\" does not exist",
        );
        assert!(matches!(err, DbError::NotFound { ref kind, ref name, .. } if kind == "database" && name == "crm"));

        let err = connect_error(Dialect::MySQL, &info(), "1049 (42000): Unknown database 'crm'");
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[test]
    fn test_connect_error_missing_role_is_connection_failure() {
        let err = connect_error(Dialect::PostgreSQL, &info(), "role \"app\" does not exist");
        assert!(matches!(err, DbError::Connection { .. }));
    }

    #[test]
    fn test_connect_error_message_and_suggestion() {
        let err = connect_error(Dialect::PostgreSQL, &info(), "Connection refused (os error 111)");
        assert!(err.to_string().contains("pg.local:5432"));
        assert!(err.suggestion().unwrap().contains("running"));

        let err = connect_error(Dialect::Oracle, &info(), "ORA-01017: invalid username/password");
        assert!(err.suggestion().unwrap().contains("password"));
    }

    #[test]
    fn test_rows_to_result_truncates_extra_row() {
        let rows = vec![
            FakeRow(vec![("id", 1)]),
            FakeRow(vec![("id", 2)]),
            FakeRow(vec![("id", 3)]),
        ];
        let result = rows_to_result(rows, 2, Vec::new());
        assert!(result.truncated);
        assert_eq!(result.row_count(), 2);
        assert_eq!(result.columns, vec!["id"]);
    }

    #[test]
    fn test_rows_to_result_empty_uses_fallback_columns() {
        let result = rows_to_result::<FakeRow>(Vec::new(), 10, vec!["id".into(), "name".into()]);
        assert!(!result.truncated);
        assert!(result.rows.is_empty());
        assert_eq!(result.columns, vec!["id", "name"]);
    }
}
