//! Parameter binding utilities for database queries.
//!
//! This module binds `QueryParam` values to driver-specific query objects.
//! PostgreSQL receives typed values matching the parameter types the server
//! inferred for the statement; MySQL and Oracle take the scalar as given.

use crate::models::QueryParam;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::mysql::MySqlArguments;
use sqlx::postgres::PgArguments;
use sqlx::{MySql, Postgres};

/// Bind a parameter to a MySQL query.
pub(crate) fn bind_mysql_param<'q>(
    query: sqlx::query::Query<'q, MySql, MySqlArguments>,
    param: &'q QueryParam,
) -> sqlx::query::Query<'q, MySql, MySqlArguments> {
    match param {
        QueryParam::Null => query.bind(None::<String>),
        QueryParam::Bool(v) => query.bind(*v),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::Float(v) => query.bind(*v),
        QueryParam::String(v) => query.bind(v.as_str()),
    }
}

/// Target type of a PostgreSQL parameter, from the server's inferred type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PgParamKind {
    Integer,
    Float,
    Bool,
    Date,
    Timestamp,
    TimestampTz,
    Uuid,
    Text,
}

impl PgParamKind {
    pub(crate) fn from_type_name(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "INT2" | "INT4" | "INT8" | "SMALLINT" | "INTEGER" | "INT" | "BIGINT" => Self::Integer,
            "FLOAT4" | "FLOAT8" | "REAL" | "DOUBLE PRECISION" | "NUMERIC" => Self::Float,
            "BOOL" | "BOOLEAN" => Self::Bool,
            "DATE" => Self::Date,
            "TIMESTAMP" => Self::Timestamp,
            "TIMESTAMPTZ" => Self::TimestampTz,
            "UUID" => Self::Uuid,
            _ => Self::Text,
        }
    }
}

/// A value converted for a PostgreSQL parameter slot.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PgValue {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Uuid(uuid::Uuid),
    Text(String),
}

/// Convert `param` for a slot of type `kind`.
///
/// A value that does not parse as the target type falls back to text so the
/// server reports the mismatch.
pub(crate) fn coerce_postgres_param(param: &QueryParam, kind: PgParamKind) -> PgValue {
    let text = match param {
        QueryParam::Null => return PgValue::Null,
        QueryParam::Int(v) => match kind {
            PgParamKind::Integer => return PgValue::Int(*v),
            PgParamKind::Float => return PgValue::Float(*v as f64),
            _ => v.to_string(),
        },
        QueryParam::Float(v) => match kind {
            PgParamKind::Float => return PgValue::Float(*v),
            PgParamKind::Integer if v.fract() == 0.0 => return PgValue::Int(*v as i64),
            _ => v.to_string(),
        },
        QueryParam::Bool(v) => match kind {
            PgParamKind::Bool => return PgValue::Bool(*v),
            _ => v.to_string(),
        },
        QueryParam::String(s) => s.clone(),
    };

    let trimmed = text.trim();
    let parsed = match kind {
        PgParamKind::Integer => trimmed.parse().ok().map(PgValue::Int),
        PgParamKind::Float => trimmed.parse().ok().map(PgValue::Float),
        PgParamKind::Bool => parse_bool(trimmed).map(PgValue::Bool),
        PgParamKind::Date => NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
            .ok()
            .map(PgValue::Date),
        PgParamKind::Timestamp => parse_timestamp(trimmed).map(PgValue::Timestamp),
        PgParamKind::TimestampTz => DateTime::parse_from_rfc3339(trimmed)
            .ok()
            .map(|v| PgValue::TimestampTz(v.with_timezone(&Utc)))
            .or_else(|| parse_timestamp(trimmed).map(|v| PgValue::TimestampTz(v.and_utc()))),
        PgParamKind::Uuid => uuid::Uuid::parse_str(trimmed).ok().map(PgValue::Uuid),
        PgParamKind::Text => None,
    };
    parsed.unwrap_or(PgValue::Text(text))
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "on" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Bind a coerced value to a PostgreSQL query.
pub(crate) fn bind_postgres_value<'q>(
    query: sqlx::query::Query<'q, Postgres, PgArguments>,
    value: PgValue,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match value {
        PgValue::Null => query.bind(None::<String>),
        PgValue::Int(v) => query.bind(v),
        PgValue::Float(v) => query.bind(v),
        PgValue::Bool(v) => query.bind(v),
        PgValue::Date(v) => query.bind(v),
        PgValue::Timestamp(v) => query.bind(v),
        PgValue::TimestampTz(v) => query.bind(v),
        PgValue::Uuid(v) => query.bind(v),
        PgValue::Text(v) => query.bind(v),
    }
}

/// Owned Oracle bind values, built inside the blocking task that runs the query.
pub(crate) fn oracle_bind_values(params: &[QueryParam]) -> Vec<Box<dyn oracle::sql_type::ToSql>> {
    params
        .iter()
        .map(|param| -> Box<dyn oracle::sql_type::ToSql> {
            match param {
                QueryParam::Null => Box::new(None::<String>),
                // Oracle SQL has no boolean column type; NUMBER(1) flags are the convention
                QueryParam::Bool(v) => Box::new(i64::from(*v)),
                QueryParam::Int(v) => Box::new(*v),
                QueryParam::Float(v) => Box::new(*v),
                QueryParam::String(v) => Box::new(v.clone()),
            }
        })
        .collect()
}
