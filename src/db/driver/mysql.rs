//! MySQL driver.

use super::{DialectDriver, connect_error, pool_mismatch, rows_to_result};
use crate::config::PoolOptions;
use crate::db::params::bind_mysql_param;
use crate::db::pool::DbPool;
use crate::error::DbResult;
use crate::models::schema::{AUTO_INCREMENT, NOT_NULL, PRIMARY_KEY, default_tag};
use crate::models::{BuiltQuery, ColumnDescriptor, DatabaseConnectionInfo, Dialect, QueryResult};
use async_trait::async_trait;
use futures_util::StreamExt;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlPoolOptions, MySqlRow};
use sqlx::{Column, Connection, Executor, MySqlPool, Row};
use std::time::Duration;
use tracing::debug;

mod queries {
    // information_schema columns are converted explicitly: depending on the server
    // charset they may otherwise arrive as VARBINARY.
    pub const LIST_TABLES: &str = r#"
        SELECT CONVERT(TABLE_NAME USING utf8mb4) AS TABLE_NAME
        FROM information_schema.tables
        WHERE TABLE_SCHEMA = ?
        ORDER BY TABLE_NAME
        "#;

    pub const DESCRIBE_COLUMNS: &str = r#"
        SELECT
            CONVERT(COLUMN_NAME USING utf8mb4) AS COLUMN_NAME,
            CONVERT(DATA_TYPE USING utf8mb4) AS DATA_TYPE,
            CONVERT(COLUMN_KEY USING utf8mb4) AS COLUMN_KEY,
            CONVERT(IS_NULLABLE USING utf8mb4) AS IS_NULLABLE,
            CONVERT(COLUMN_DEFAULT USING utf8mb4) AS COLUMN_DEFAULT,
            CONVERT(EXTRA USING utf8mb4) AS EXTRA
        FROM information_schema.columns
        WHERE TABLE_NAME = ? AND TABLE_SCHEMA = ?
        ORDER BY ORDINAL_POSITION
        "#;
}

pub struct MySqlDriver;

fn connect_options(info: &DatabaseConnectionInfo) -> MySqlConnectOptions {
    MySqlConnectOptions::new()
        .host(&info.host)
        .port(info.resolved_port(Dialect::MySQL))
        .database(&info.database_name)
        .username(&info.username)
        .password(&info.password)
        .charset("utf8mb4")
}

fn as_mysql(pool: &DbPool) -> DbResult<&MySqlPool> {
    match pool {
        DbPool::MySql(p) => Ok(p),
        other => Err(pool_mismatch(Dialect::MySQL, other)),
    }
}

/// Safely get a string from a MySQL row.
/// MySQL may return VARBINARY instead of VARCHAR depending on charset configuration.
fn get_string(row: &MySqlRow, column: &str) -> String {
    get_optional_string(row, column).unwrap_or_default()
}

/// Safely get an optional string from a MySQL row.
fn get_optional_string(row: &MySqlRow, column: &str) -> Option<String> {
    row.try_get::<Option<String>, _>(column)
        .ok()
        .flatten()
        .or_else(|| {
            row.try_get::<Option<Vec<u8>>, _>(column)
                .ok()
                .flatten()
                .and_then(|bytes| String::from_utf8(bytes).ok())
        })
}

/// Build a column descriptor from the catalog fields of one column.
///
/// Tag order: PRIMARY KEY, NOT NULL, AUTO_INCREMENT, DEFAULT.
fn column_from_parts(
    name: String,
    data_type: &str,
    column_key: &str,
    is_nullable: &str,
    default: Option<&str>,
    extra: &str,
) -> ColumnDescriptor {
    let mut column = ColumnDescriptor::new(name, data_type);
    if column_key == "PRI" {
        column.push_constraint(PRIMARY_KEY);
    }
    if is_nullable == "NO" {
        column.push_constraint(NOT_NULL);
    }
    if extra.to_lowercase().contains("auto_increment") {
        column.push_constraint(AUTO_INCREMENT);
    }
    if let Some(expr) = default.filter(|d| !d.is_empty()) {
        column.push_constraint(default_tag(expr));
    }
    column.normalized()
}

#[async_trait]
impl DialectDriver for MySqlDriver {
    fn dialect(&self) -> Dialect {
        Dialect::MySQL
    }

    async fn build_pool(
        &self,
        info: &DatabaseConnectionInfo,
        options: &PoolOptions,
    ) -> DbResult<DbPool> {
        let pool = MySqlPoolOptions::new()
            .min_connections(options.min_connections_or_default())
            .max_connections(options.max_connections_or_default())
            .acquire_timeout(Duration::from_secs(options.acquire_timeout_or_default()))
            .idle_timeout(Some(Duration::from_secs(
                options.idle_timeout_or_default(Dialect::MySQL),
            )))
            .test_before_acquire(options.test_before_acquire_or_default())
            .connect_with(connect_options(info))
            .await
            .map_err(|e| connect_error(Dialect::MySQL, info, e))?;
        Ok(DbPool::MySql(pool))
    }

    async fn list_tables(
        &self,
        pool: &DbPool,
        info: &DatabaseConnectionInfo,
    ) -> DbResult<Vec<String>> {
        let pool = as_mysql(pool)?;
        let rows = sqlx::query(queries::LIST_TABLES)
            .bind(&info.database_name)
            .fetch_all(pool)
            .await?;
        let tables: Vec<String> = rows
            .iter()
            .map(|row| get_string(row, "TABLE_NAME"))
            .filter(|name| !name.is_empty())
            .collect();
        debug!(count = tables.len(), "Listed MySQL tables");
        Ok(tables)
    }

    async fn describe_columns(
        &self,
        pool: &DbPool,
        info: &DatabaseConnectionInfo,
        table: &str,
    ) -> DbResult<Vec<ColumnDescriptor>> {
        let pool = as_mysql(pool)?;
        let rows = sqlx::query(queries::DESCRIBE_COLUMNS)
            .bind(table)
            .bind(&info.database_name)
            .fetch_all(pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                column_from_parts(
                    get_string(row, "COLUMN_NAME"),
                    &get_string(row, "DATA_TYPE"),
                    &get_string(row, "COLUMN_KEY"),
                    &get_string(row, "IS_NULLABLE"),
                    get_optional_string(row, "COLUMN_DEFAULT").as_deref(),
                    &get_string(row, "EXTRA"),
                )
            })
            .collect())
    }

    async fn fetch_rows(
        &self,
        pool: &DbPool,
        query: &BuiltQuery,
        max_rows: u32,
    ) -> DbResult<QueryResult> {
        let pool = as_mysql(pool)?;

        let mut sql_query = sqlx::query(&query.sql);
        for param in &query.binds {
            sql_query = bind_mysql_param(sql_query, param);
        }

        let fetch_limit = max_rows as usize + 1;
        let rows = sql_query
            .fetch(pool)
            .take(fetch_limit)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<Result<Vec<MySqlRow>, sqlx::Error>>()?;

        // Without a row there is no column metadata; ask the server for it
        let fallback_columns = if rows.is_empty() {
            match pool.describe(&query.sql).await {
                Ok(described) => described
                    .columns()
                    .iter()
                    .map(|c| c.name().to_string())
                    .collect(),
                Err(e) => {
                    debug!(error = %e, "Could not describe empty result");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        Ok(rows_to_result(rows, max_rows, fallback_columns))
    }

    async fn probe(&self, info: &DatabaseConnectionInfo) -> DbResult<()> {
        let conn = MySqlConnection::connect_with(&connect_options(info))
            .await
            .map_err(|e| connect_error(Dialect::MySQL, info, e))?;
        conn.close()
            .await
            .map_err(|e| connect_error(Dialect::MySQL, info, e))
    }
}
