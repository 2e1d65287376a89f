//! Query execution engine.
//!
//! This module builds and runs the two data queries the bridge supports:
//! - Filtered queries: `SELECT * FROM <table> WHERE <col> <op> <placeholder> AND ...`
//! - Join traversals: `SELECT * FROM <table> WHERE <col> IN (<placeholders>)`
//!
//! # Architecture
//!
//! SQL text is built by pure functions (`build_filtered_query`, `build_in_list_query`)
//! so it can be checked without a database. Identifiers always go through dialect
//! quoting; values are always bind parameters. Execution is delegated to the
//! dialect driver, which streams rows and stops after the row cap.

use crate::db::driver::driver_for;
use crate::db::pool::PoolRegistry;
use crate::error::{DbError, DbResult};
use crate::models::{
    BuiltQuery, DEFAULT_MAX_ROWS, DatabaseConnectionInfo, Dialect, FilterCondition,
    MAX_ROW_LIMIT, QueryParam, QueryResult,
};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

fn require_identifier(kind: &str, name: &str) -> DbResult<()> {
    if name.trim().is_empty() {
        return Err(DbError::invalid_input(format!("{} name cannot be empty", kind)));
    }
    Ok(())
}

/// Build `SELECT * FROM <table> [WHERE <col> <op> <ph> AND ...]`.
///
/// Every condition value is bound as text.
pub fn build_filtered_query(
    dialect: Dialect,
    table: &str,
    conditions: &[FilterCondition],
) -> DbResult<BuiltQuery> {
    require_identifier("Table", table)?;

    let mut sql = format!("SELECT * FROM {}", dialect.quote_identifier(table));
    let mut binds = Vec::with_capacity(conditions.len());

    for (idx, condition) in conditions.iter().enumerate() {
        require_identifier("Column", &condition.column)?;
        sql.push_str(if idx == 0 { " WHERE " } else { " AND " });
        sql.push_str(&format!(
            "{} {} {}",
            dialect.quote_identifier(&condition.column),
            condition.operator.as_sql(),
            dialect.placeholder(idx + 1)
        ));
        binds.push(QueryParam::String(condition.value.clone()));
    }

    Ok(BuiltQuery { sql, binds })
}

/// Build `SELECT * FROM <table> WHERE <column> IN (<ph>, ...)` with one
/// placeholder per value.
pub fn build_in_list_query(
    dialect: Dialect,
    table: &str,
    column: &str,
    values: Vec<QueryParam>,
) -> DbResult<BuiltQuery> {
    require_identifier("Table", table)?;
    require_identifier("Column", column)?;
    if values.is_empty() {
        return Err(DbError::invalid_input(format!(
            "No values for column '{}'",
            column
        )));
    }
    if values.len() > dialect.max_in_list() {
        return Err(DbError::invalid_input(format!(
            "Too many values for column '{}': {} distinct values, {} allows at most {}",
            column,
            values.len(),
            dialect.display_name(),
            dialect.max_in_list()
        )));
    }

    let placeholders: Vec<String> = (1..=values.len())
        .map(|idx| dialect.placeholder(idx))
        .collect();
    let sql = format!(
        "SELECT * FROM {} WHERE {} IN ({})",
        dialect.quote_identifier(table),
        dialect.quote_identifier(column),
        placeholders.join(", ")
    );

    Ok(BuiltQuery { sql, binds: values })
}

/// Distinct non-null values of `column` across `rows`, in first-seen order.
///
/// Fails with `InvalidInput` naming the column when no row holds a value.
pub fn collect_join_values(
    rows: &[Map<String, JsonValue>],
    column: &str,
) -> DbResult<Vec<QueryParam>> {
    let mut seen = HashSet::new();
    let values: Vec<QueryParam> = rows
        .iter()
        .filter_map(|row| row.get(column))
        .filter(|value| !value.is_null())
        // 1 and "1" stay distinct: the JSON text is the identity
        .filter(|value| seen.insert(value.to_string()))
        .filter_map(QueryParam::from_json)
        .collect();

    if values.is_empty() {
        return Err(DbError::invalid_input(format!(
            "No values found for column '{}' in the source rows",
            column
        )));
    }
    Ok(values)
}

/// Query executor that handles database query execution.
pub struct QueryExecutor {
    registry: Arc<PoolRegistry>,
    max_rows: u32,
}

impl QueryExecutor {
    /// Create a new query executor with the default row cap.
    pub fn new(registry: Arc<PoolRegistry>) -> Self {
        Self::with_max_rows(registry, DEFAULT_MAX_ROWS)
    }

    /// Create a new query executor with a custom row cap, clamped to `1..=MAX_ROW_LIMIT`.
    pub fn with_max_rows(registry: Arc<PoolRegistry>, max_rows: u32) -> Self {
        Self {
            registry,
            max_rows: max_rows.clamp(1, MAX_ROW_LIMIT),
        }
    }

    pub fn max_rows(&self) -> u32 {
        self.max_rows
    }

    /// Select rows of `table` matching every condition.
    pub async fn execute_filtered_query(
        &self,
        info: &DatabaseConnectionInfo,
        table: &str,
        conditions: &[FilterCondition],
    ) -> DbResult<QueryResult> {
        let dialect = info.dialect()?;
        let query = build_filtered_query(dialect, table, conditions)?;
        self.run(info, dialect, &query).await
    }

    /// Select rows of `target_table` whose `target_column` equals any value of
    /// `source_column` in `source_rows`.
    ///
    /// No query is issued when the source rows hold no value for the column.
    pub async fn execute_join_traversal(
        &self,
        info: &DatabaseConnectionInfo,
        source_rows: &[Map<String, JsonValue>],
        source_column: &str,
        target_table: &str,
        target_column: &str,
    ) -> DbResult<QueryResult> {
        let dialect = info.dialect()?;
        let values = collect_join_values(source_rows, source_column)?;
        let query = build_in_list_query(dialect, target_table, target_column, values)?;
        self.run(info, dialect, &query).await
    }

    async fn run(
        &self,
        info: &DatabaseConnectionInfo,
        dialect: Dialect,
        query: &BuiltQuery,
    ) -> DbResult<QueryResult> {
        let start = Instant::now();
        debug!(
            dbms = %dialect,
            sql = %query.sql,
            params = query.binds.len(),
            limit = self.max_rows,
            "Executing query"
        );

        let pool = self.registry.get_pool(info).await?;
        let result = driver_for(dialect)
            .fetch_rows(&pool, query, self.max_rows)
            .await?;

        debug!(
            dbms = %dialect,
            rows = result.row_count(),
            truncated = result.truncated,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Query completed"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Operator;
    use serde_json::json;

    fn rows(values: Vec<JsonValue>) -> Vec<Map<String, JsonValue>> {
        values
            .into_iter()
            .map(|v| match v {
                JsonValue::Object(map) => map,
                other => panic!("expected object, got {other}"),
            })
            .collect()
    }

    #[test]
    fn test_filtered_query_postgres() {
        let query = build_filtered_query(
            Dialect::PostgreSQL,
            "users",
            &[FilterCondition::new("age", Operator::Gt, "18")],
        )
        .unwrap();
        assert_eq!(query.sql, "SELECT * FROM \"users\" WHERE \"age\" > $1");
        assert_eq!(query.binds, vec![QueryParam::String("18".into())]);
    }

    #[test]
    fn test_filtered_query_multiple_conditions_per_dialect() {
        let conditions = [
            FilterCondition::new("name", Operator::Like, "A%"),
            FilterCondition::new("status", Operator::NotEq, "closed"),
        ];

        let pg = build_filtered_query(Dialect::PostgreSQL, "t", &conditions).unwrap();
        assert_eq!(
            pg.sql,
            "SELECT * FROM \"t\" WHERE \"name\" LIKE $1 AND \"status\" != $2"
        );

        let my = build_filtered_query(Dialect::MySQL, "t", &conditions).unwrap();
        assert_eq!(my.sql, "SELECT * FROM `t` WHERE `name` LIKE ? AND `status` != ?");

        let ora = build_filtered_query(Dialect::Oracle, "t", &conditions).unwrap();
        assert_eq!(
            ora.sql,
            "SELECT * FROM \"T\" WHERE \"NAME\" LIKE :1 AND \"STATUS\" != :2"
        );
        assert_eq!(ora.binds.len(), 2);
    }

    #[test]
    fn test_filtered_query_without_conditions() {
        let query = build_filtered_query(Dialect::MySQL, "orders", &[]).unwrap();
        assert_eq!(query.sql, "SELECT * FROM `orders`");
        assert!(query.binds.is_empty());
    }

    #[test]
    fn test_values_never_reach_sql_text() {
        let query = build_filtered_query(
            Dialect::PostgreSQL,
            "users",
            &[FilterCondition::new("name", Operator::Eq, "x'; DROP TABLE users; --")],
        )
        .unwrap();
        assert!(!query.sql.contains("DROP"));
        assert_eq!(query.binds.len(), 1);
    }

    #[test]
    fn test_hostile_identifiers_are_quoted() {
        let query = build_filtered_query(
            Dialect::PostgreSQL,
            "users\" ; DROP TABLE x; --",
            &[],
        )
        .unwrap();
        assert_eq!(query.sql, "SELECT * FROM \"users\"\" ; DROP TABLE x; --\"");
    }

    #[test]
    fn test_empty_identifiers_rejected() {
        assert!(matches!(
            build_filtered_query(Dialect::MySQL, " ", &[]).unwrap_err(),
            DbError::InvalidInput { .. }
        ));
        let err = build_filtered_query(
            Dialect::MySQL,
            "t",
            &[FilterCondition::new("", Operator::Eq, "1")],
        )
        .unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
    }

    #[test]
    fn test_in_list_query_placeholders() {
        let values = vec![QueryParam::Int(1), QueryParam::Int(2), QueryParam::Int(3)];

        let pg = build_in_list_query(Dialect::PostgreSQL, "orders", "customer_id", values.clone())
            .unwrap();
        assert_eq!(
            pg.sql,
            "SELECT * FROM \"orders\" WHERE \"customer_id\" IN ($1, $2, $3)"
        );

        let my = build_in_list_query(Dialect::MySQL, "orders", "customer_id", values.clone())
            .unwrap();
        assert_eq!(my.sql, "SELECT * FROM `orders` WHERE `customer_id` IN (?, ?, ?)");

        let ora = build_in_list_query(Dialect::Oracle, "orders", "customer_id", values).unwrap();
        assert_eq!(
            ora.sql,
            "SELECT * FROM \"ORDERS\" WHERE \"CUSTOMER_ID\" IN (:1, :2, :3)"
        );
    }

    #[test]
    fn test_in_list_query_rejects_oversized_value_sets() {
        let ints = |n: i64| (0..n).map(QueryParam::Int).collect::<Vec<_>>();

        assert!(build_in_list_query(Dialect::Oracle, "orders", "id", ints(1_000)).is_ok());
        let err = build_in_list_query(Dialect::Oracle, "orders", "id", ints(1_001)).unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
        let message = err.to_string();
        assert!(message.contains("'id'"), "{message}");
        assert!(message.contains("1001"), "{message}");

        assert!(build_in_list_query(Dialect::PostgreSQL, "orders", "id", ints(65_535)).is_ok());
        let err = build_in_list_query(Dialect::PostgreSQL, "orders", "id", ints(70_000))
            .unwrap_err();
        assert!(err.to_string().contains("70000"));
        assert!(build_in_list_query(Dialect::MySQL, "orders", "id", ints(65_536)).is_err());
    }

    #[tokio::test]
    async fn test_oversized_traversal_issues_no_query() {
        let registry = Arc::new(PoolRegistry::default());
        let executor = QueryExecutor::new(Arc::clone(&registry));
        let info =
            DatabaseConnectionInfo::new("postgresql", "unreachable.invalid", None, "d", "u", "p");
        let source = rows((0..70_000).map(|i| json!({"id": i})).collect());

        let err = executor
            .execute_join_traversal(&info, &source, "id", "orders", "user_id")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
        assert!(err.to_string().contains("'user_id'"));
        assert_eq!(registry.pool_count().await, 0);
    }

    #[test]
    fn test_collect_join_values_distinct_non_null_in_order() {
        let source = rows(vec![
            json!({"customer_id": 7}),
            json!({"customer_id": 3}),
            json!({"customer_id": null}),
            json!({"customer_id": 7}),
            json!({"other": 1}),
            json!({"customer_id": "7"}),
        ]);
        let values = collect_join_values(&source, "customer_id").unwrap();
        assert_eq!(
            values,
            vec![
                QueryParam::Int(7),
                QueryParam::Int(3),
                QueryParam::String("7".into())
            ]
        );
    }

    #[test]
    fn test_collect_join_values_empty_names_column() {
        let source = rows(vec![json!({"id": 1}), json!({"customer_id": null})]);
        let err = collect_join_values(&source, "customer_id").unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
        assert!(err.to_string().contains("customer_id"));

        assert!(collect_join_values(&[], "customer_id").is_err());
    }

    #[tokio::test]
    async fn test_join_traversal_without_values_issues_no_query() {
        // The registry is empty: any query attempt would have to create a pool
        let registry = Arc::new(PoolRegistry::default());
        let executor = QueryExecutor::new(Arc::clone(&registry));
        let info = DatabaseConnectionInfo::new("mysql", "unreachable.invalid", None, "d", "u", "p");

        let err = executor
            .execute_join_traversal(&info, &[], "customer_id", "orders", "id")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
        assert!(err.to_string().contains("customer_id"));
        assert_eq!(registry.pool_count().await, 0);
    }

    #[tokio::test]
    async fn test_unsupported_dialect_rejected_before_query() {
        let executor = QueryExecutor::new(Arc::new(PoolRegistry::default()));
        let info = DatabaseConnectionInfo::new("sqlite", "h", None, "d", "u", "p");
        let err = executor
            .execute_filtered_query(&info, "users", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UnsupportedDialect { .. }));
    }

    #[test]
    fn test_max_rows_clamped() {
        let registry = Arc::new(PoolRegistry::default());
        assert_eq!(QueryExecutor::with_max_rows(Arc::clone(&registry), 0).max_rows(), 1);
        assert_eq!(
            QueryExecutor::with_max_rows(Arc::clone(&registry), u32::MAX).max_rows(),
            MAX_ROW_LIMIT
        );
        assert_eq!(QueryExecutor::new(registry).max_rows(), DEFAULT_MAX_ROWS);
    }
}
