//! Oracle driver.
//!
//! The Oracle client is blocking, so every call runs on the blocking thread pool.
//! A pooled connection is borrowed per call and returned when it drops, on every
//! exit path.

use super::{DialectDriver, connect_error, pool_mismatch};
use crate::config::PoolOptions;
use crate::db::params::oracle_bind_values;
use crate::db::pool::DbPool;
use crate::db::types::oracle_row_to_json;
use crate::error::{DbError, DbResult};
use crate::models::schema::{CHECK, NOT_NULL, PRIMARY_KEY, UNIQUE, default_tag};
use crate::models::{
    BuiltQuery, ColumnDescriptor, DatabaseConnectionInfo, Dialect, QueryParam, QueryResult,
};
use ::oracle::pool::{GetMode, Pool, PoolBuilder};
use ::oracle::sql_type::ToSql;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

mod queries {
    pub const LIST_TABLES: &str = r#"
        SELECT table_name
        FROM user_tables
        ORDER BY table_name
        "#;

    /// Constraint types per column as a comma-separated list of P, U and C.
    pub const DESCRIBE_COLUMNS: &str = r#"
        SELECT
            c.column_name,
            c.data_type,
            c.nullable,
            c.data_default,
            (
                SELECT LISTAGG(tc.constraint_type, ',') WITHIN GROUP (ORDER BY tc.constraint_type)
                FROM user_constraints tc
                JOIN user_cons_columns cc
                    ON tc.constraint_name = cc.constraint_name
                WHERE tc.table_name = c.table_name
                AND cc.column_name = c.column_name
                AND tc.constraint_type IN ('P', 'U', 'C')
            ) AS constraints
        FROM user_tab_columns c
        WHERE c.table_name = :1
        ORDER BY c.column_id
        "#;
}

pub struct OracleDriver;

/// Run a blocking Oracle client call off the async runtime.
async fn run_blocking<T, F>(task: F) -> DbResult<T>
where
    F: FnOnce() -> DbResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| DbError::internal(format!("Oracle worker task failed: {}", e)))?
}

fn as_oracle(pool: &DbPool) -> DbResult<Arc<Pool>> {
    match pool {
        DbPool::Oracle(p) => Ok(Arc::clone(p)),
        other => Err(pool_mismatch(Dialect::Oracle, other)),
    }
}

/// Map one catalog constraint code to its tag. CHECK is dropped later.
fn constraint_tag(code: &str) -> &str {
    match code.trim() {
        "P" => PRIMARY_KEY,
        "U" => UNIQUE,
        "C" => CHECK,
        other => other,
    }
}

/// Build a column descriptor from the catalog fields of one column.
///
/// Tag order: NOT NULL, DEFAULT, then the key constraints.
fn column_from_parts(
    name: String,
    data_type: &str,
    nullable: &str,
    default: Option<&str>,
    constraints: Option<&str>,
) -> ColumnDescriptor {
    let mut column = ColumnDescriptor::new(name, data_type);
    if nullable == "N" {
        column.push_constraint(NOT_NULL);
    }
    if let Some(expr) = default.map(str::trim).filter(|d| !d.is_empty()) {
        column.push_constraint(default_tag(expr));
    }
    for code in constraints.unwrap_or_default().split(',') {
        let tag = constraint_tag(code);
        if tag == PRIMARY_KEY || tag == UNIQUE {
            column.push_constraint(tag);
        }
    }
    column.normalized()
}

fn fetch_columns(conn: &::oracle::Connection, table: &str) -> DbResult<Vec<ColumnDescriptor>> {
    let rows = conn.query(queries::DESCRIBE_COLUMNS, &[&table])?;
    let mut columns = Vec::new();
    for row in rows {
        let row = row?;
        let name: String = row.get(0)?;
        let data_type: String = row.get(1)?;
        let nullable: String = row.get(2)?;
        let default: Option<String> = row.get(3)?;
        let constraints: Option<String> = row.get(4)?;
        columns.push(column_from_parts(
            name,
            &data_type,
            &nullable,
            default.as_deref(),
            constraints.as_deref(),
        ));
    }
    Ok(columns)
}

fn fetch_limited(
    conn: &::oracle::Connection,
    sql: &str,
    binds: &[QueryParam],
    max_rows: u32,
) -> DbResult<QueryResult> {
    let values = oracle_bind_values(binds);
    let params: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
    let result_set = conn.query(sql, &params)?;

    let columns: Vec<String> = result_set
        .column_info()
        .iter()
        .map(|c| c.name().to_string())
        .collect();

    let limit = max_rows as usize;
    let mut rows = Vec::new();
    let mut truncated = false;
    for row in result_set {
        let row = row?;
        if rows.len() == limit {
            truncated = true;
            break;
        }
        rows.push(oracle_row_to_json(&row));
    }

    if truncated {
        warn!(limit = max_rows, "Query result truncated");
    }

    Ok(QueryResult {
        rows,
        columns,
        truncated,
    })
}

/// Session pool sizing and timeouts resolved from [`PoolOptions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PoolSettings {
    min_connections: u32,
    max_connections: u32,
    acquire_timeout: Duration,
    /// Idle sessions older than this are closed by the pool
    idle_timeout: Duration,
}

impl PoolSettings {
    fn from_options(options: &PoolOptions) -> Self {
        Self {
            min_connections: options.min_connections_or_default(),
            max_connections: options.max_connections_or_default(),
            acquire_timeout: Duration::from_secs(options.acquire_timeout_or_default()),
            idle_timeout: Duration::from_secs(options.idle_timeout_or_default(Dialect::Oracle)),
        }
    }
}

#[async_trait]
impl DialectDriver for OracleDriver {
    fn dialect(&self) -> Dialect {
        Dialect::Oracle
    }

    async fn build_pool(
        &self,
        info: &DatabaseConnectionInfo,
        options: &PoolOptions,
    ) -> DbResult<DbPool> {
        let username = info.username.clone();
        let password = info.password.clone();
        let connect_string = info.oracle_connect_string();
        let settings = PoolSettings::from_options(options);

        let built = run_blocking(move || {
            let mut pool = PoolBuilder::new(username, password, connect_string)
                .min_connections(settings.min_connections)
                .max_connections(settings.max_connections)
                .get_mode(GetMode::TimedWait(settings.acquire_timeout))
                .build()
                .map_err(|e| DbError::internal(e.to_string()))?;
            pool.set_timeout(settings.idle_timeout)
                .map_err(|e| DbError::internal(e.to_string()))?;
            Ok(pool)
        })
        .await;

        match built {
            Ok(pool) => Ok(DbPool::Oracle(Arc::new(pool))),
            Err(DbError::Internal { message }) => {
                Err(connect_error(Dialect::Oracle, info, message))
            }
            Err(other) => Err(other),
        }
    }

    async fn list_tables(
        &self,
        pool: &DbPool,
        _info: &DatabaseConnectionInfo,
    ) -> DbResult<Vec<String>> {
        let pool = as_oracle(pool)?;
        let tables = run_blocking(move || {
            let conn = pool.get()?;
            let mut tables = Vec::new();
            for row in conn.query(queries::LIST_TABLES, &[])? {
                let name: String = row?.get(0)?;
                tables.push(name);
            }
            Ok(tables)
        })
        .await?;
        debug!(count = tables.len(), "Listed Oracle tables");
        Ok(tables)
    }

    async fn describe_columns(
        &self,
        pool: &DbPool,
        _info: &DatabaseConnectionInfo,
        table: &str,
    ) -> DbResult<Vec<ColumnDescriptor>> {
        let pool = as_oracle(pool)?;
        let table = table.to_string();
        run_blocking(move || {
            let conn = pool.get()?;
            let columns = fetch_columns(&conn, &table)?;
            // Unquoted identifiers are stored upper-cased
            let upper = table.to_uppercase();
            if columns.is_empty() && upper != table {
                return fetch_columns(&conn, &upper);
            }
            Ok(columns)
        })
        .await
    }

    async fn fetch_rows(
        &self,
        pool: &DbPool,
        query: &BuiltQuery,
        max_rows: u32,
    ) -> DbResult<QueryResult> {
        let pool = as_oracle(pool)?;
        let sql = query.sql.clone();
        let binds = query.binds.clone();
        run_blocking(move || {
            let conn = pool.get()?;
            fetch_limited(&conn, &sql, &binds, max_rows)
        })
        .await
    }

    async fn probe(&self, info: &DatabaseConnectionInfo) -> DbResult<()> {
        let username = info.username.clone();
        let password = info.password.clone();
        let connect_string = info.oracle_connect_string();

        run_blocking(move || {
            let conn = ::oracle::Connection::connect(username, password, connect_string)
                .map_err(|e| DbError::internal(e.to_string()))?;
            conn.close().map_err(|e| DbError::internal(e.to_string()))
        })
        .await
        .map_err(|e| match e {
            DbError::Internal { message } => connect_error(Dialect::Oracle, info, message),
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_key_column() {
        let col = column_from_parts("ID".into(), "number", "N", None, Some("C,P"));
        assert_eq!(col.data_type, "NUMBER");
        assert_eq!(col.constraints, vec![PRIMARY_KEY]);
    }

    #[test]
    fn test_check_constraint_filtered() {
        let col = column_from_parts("AGE".into(), "NUMBER", "Y", None, Some("C"));
        assert!(col.constraints.is_empty());
    }

    #[test]
    fn test_default_is_trimmed() {
        let col = column_from_parts("CREATED".into(), "DATE", "N", Some("SYSDATE \n"), Some("U"));
        assert_eq!(
            col.constraints,
            vec![NOT_NULL.to_string(), "DEFAULT SYSDATE".to_string(), UNIQUE.to_string()]
        );
    }

    #[test]
    fn test_constraint_tag_mapping() {
        assert_eq!(constraint_tag("P"), PRIMARY_KEY);
        assert_eq!(constraint_tag(" U"), UNIQUE);
        assert_eq!(constraint_tag("C"), CHECK);
        assert_eq!(constraint_tag("R"), "R");
    }

    #[test]
    fn test_pool_settings_use_oracle_idle_default() {
        let settings = PoolSettings::from_options(&PoolOptions::default());
        assert_eq!(settings.idle_timeout, Duration::from_secs(60));
        assert_eq!(settings.acquire_timeout, Duration::from_secs(30));
        assert_eq!(settings.min_connections, 1);
        assert_eq!(settings.max_connections, 10);
    }

    #[test]
    fn test_pool_settings_honor_overrides() {
        let options = PoolOptions {
            idle_timeout_secs: Some(5),
            max_connections: Some(3),
            ..Default::default()
        };
        let settings = PoolSettings::from_options(&options);
        assert_eq!(settings.idle_timeout, Duration::from_secs(5));
        assert_eq!(settings.max_connections, 3);
    }
}
