//! PostgreSQL driver.
//!
//! Introspection is limited to the `public` schema.

use super::{DialectDriver, connect_error, pool_mismatch, rows_to_result};
use crate::config::PoolOptions;
use crate::db::params::{PgParamKind, bind_postgres_value, coerce_postgres_param};
use crate::db::pool::DbPool;
use crate::error::DbResult;
use crate::models::schema::{NOT_NULL, PRIMARY_KEY, UNIQUE, default_tag};
use crate::models::{BuiltQuery, ColumnDescriptor, DatabaseConnectionInfo, Dialect, QueryResult};
use async_trait::async_trait;
use futures_util::StreamExt;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgPoolOptions, PgRow};
use sqlx::{Column, Connection, Executor, PgPool, Row, TypeInfo};
use std::time::Duration;
use tracing::debug;

mod queries {
    pub const LIST_TABLES: &str = r#"
        SELECT table_name::text AS table_name
        FROM information_schema.tables
        WHERE table_schema = 'public'
        ORDER BY table_name
        "#;

    /// Constraint types are aggregated per column; only key constraints are kept.
    pub const DESCRIBE_COLUMNS: &str = r#"
        SELECT
            c.column_name::text AS column_name,
            c.data_type::text AS data_type,
            c.is_nullable::text AS is_nullable,
            c.column_default::text AS column_default,
            (
                SELECT array_agg(con.constraint_type::text ORDER BY con.constraint_type)
                FROM information_schema.table_constraints con
                JOIN information_schema.constraint_column_usage ccu
                    ON con.constraint_name = ccu.constraint_name
                    AND con.constraint_schema = ccu.constraint_schema
                WHERE con.table_name = c.table_name
                AND ccu.column_name = c.column_name
                AND con.table_schema = 'public'
                AND con.constraint_type IN ('PRIMARY KEY', 'UNIQUE')
            ) AS constraints
        FROM information_schema.columns c
        WHERE c.table_name = $1 AND c.table_schema = 'public'
        ORDER BY c.ordinal_position
        "#;
}

pub struct PostgresDriver;

fn connect_options(info: &DatabaseConnectionInfo) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&info.host)
        .port(info.resolved_port(Dialect::PostgreSQL))
        .database(&info.database_name)
        .username(&info.username)
        .password(&info.password)
}

fn as_pg(pool: &DbPool) -> DbResult<&PgPool> {
    match pool {
        DbPool::Postgres(p) => Ok(p),
        other => Err(pool_mismatch(Dialect::PostgreSQL, other)),
    }
}

/// Build a column descriptor from one DESCRIBE_COLUMNS row.
///
/// Tag order: NOT NULL, DEFAULT, then the key constraint types.
fn column_from_row(row: &PgRow) -> DbResult<ColumnDescriptor> {
    let name: String = row.try_get("column_name")?;
    let data_type: String = row.try_get("data_type")?;
    let is_nullable: String = row.try_get("is_nullable")?;
    let default: Option<String> = row.try_get("column_default")?;
    let constraints: Option<Vec<String>> = row.try_get("constraints")?;

    let mut column = ColumnDescriptor::new(name, &data_type);
    if is_nullable == "NO" {
        column.push_constraint(NOT_NULL);
    }
    if let Some(expr) = default.filter(|d| !d.trim().is_empty()) {
        column.push_constraint(default_tag(&expr));
    }
    for tag in constraints.unwrap_or_default() {
        if tag == PRIMARY_KEY || tag == UNIQUE {
            column.push_constraint(tag);
        }
    }
    Ok(column.normalized())
}

#[async_trait]
impl DialectDriver for PostgresDriver {
    fn dialect(&self) -> Dialect {
        Dialect::PostgreSQL
    }

    async fn build_pool(
        &self,
        info: &DatabaseConnectionInfo,
        options: &PoolOptions,
    ) -> DbResult<DbPool> {
        let pool = PgPoolOptions::new()
            .min_connections(options.min_connections_or_default())
            .max_connections(options.max_connections_or_default())
            .acquire_timeout(Duration::from_secs(options.acquire_timeout_or_default()))
            .idle_timeout(Some(Duration::from_secs(
                options.idle_timeout_or_default(Dialect::PostgreSQL),
            )))
            .test_before_acquire(options.test_before_acquire_or_default())
            .connect_with(connect_options(info))
            .await
            .map_err(|e| connect_error(Dialect::PostgreSQL, info, e))?;
        Ok(DbPool::Postgres(pool))
    }

    async fn list_tables(
        &self,
        pool: &DbPool,
        _info: &DatabaseConnectionInfo,
    ) -> DbResult<Vec<String>> {
        let pool = as_pg(pool)?;
        let tables: Vec<String> = sqlx::query_scalar(queries::LIST_TABLES)
            .fetch_all(pool)
            .await?;
        debug!(count = tables.len(), "Listed PostgreSQL tables");
        Ok(tables)
    }

    async fn describe_columns(
        &self,
        pool: &DbPool,
        _info: &DatabaseConnectionInfo,
        table: &str,
    ) -> DbResult<Vec<ColumnDescriptor>> {
        let pool = as_pg(pool)?;
        let rows = sqlx::query(queries::DESCRIBE_COLUMNS)
            .bind(table)
            .fetch_all(pool)
            .await?;
        rows.iter().map(column_from_row).collect()
    }

    async fn fetch_rows(
        &self,
        pool: &DbPool,
        query: &BuiltQuery,
        max_rows: u32,
    ) -> DbResult<QueryResult> {
        let pool = as_pg(pool)?;

        // Parameter types come from the server so text input can be coerced
        let described = pool.describe(&query.sql).await?;
        let kinds: Vec<PgParamKind> = described
            .parameters()
            .and_then(|params| params.left())
            .map(|types| {
                types
                    .iter()
                    .map(|t| PgParamKind::from_type_name(t.name()))
                    .collect()
            })
            .unwrap_or_default();
        let columns: Vec<String> = described
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        let mut sql_query = sqlx::query(&query.sql);
        for (idx, param) in query.binds.iter().enumerate() {
            let kind = kinds.get(idx).copied().unwrap_or(PgParamKind::Text);
            sql_query = bind_postgres_value(sql_query, coerce_postgres_param(param, kind));
        }

        let fetch_limit = max_rows as usize + 1;
        let rows = sql_query
            .fetch(pool)
            .take(fetch_limit)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<Result<Vec<PgRow>, sqlx::Error>>()?;

        Ok(rows_to_result(rows, max_rows, columns))
    }

    async fn probe(&self, info: &DatabaseConnectionInfo) -> DbResult<()> {
        let conn = PgConnection::connect_with(&connect_options(info))
            .await
            .map_err(|e| connect_error(Dialect::PostgreSQL, info, e))?;
        conn.close()
            .await
            .map_err(|e| connect_error(Dialect::PostgreSQL, info, e))
    }
}
