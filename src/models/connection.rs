//! Connection-related data models.
//!
//! This module defines the supported dialects and the credentials used to reach a
//! target database.

use crate::error::{DbError, DbResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Supported database dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[serde(alias = "postgres")]
    PostgreSQL,
    MySQL,
    Oracle,
}

impl Dialect {
    /// All supported dialects, in display order.
    pub const ALL: [Dialect; 3] = [Dialect::PostgreSQL, Dialect::MySQL, Dialect::Oracle];

    /// Parse a dbms tag, case-insensitively.
    pub fn parse(dbms: &str) -> DbResult<Self> {
        Self::from_tag(dbms).ok_or_else(|| DbError::unsupported_dialect(dbms))
    }

    /// Parse a dbms tag, returning `None` for anything unsupported.
    pub fn from_tag(dbms: &str) -> Option<Self> {
        match dbms.trim().to_ascii_lowercase().as_str() {
            "postgresql" | "postgres" => Some(Self::PostgreSQL),
            "mysql" => Some(Self::MySQL),
            "oracle" => Some(Self::Oracle),
            _ => None,
        }
    }

    /// Canonical lower-case tag, as used in pool keys.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "postgresql",
            Self::MySQL => "mysql",
            Self::Oracle => "oracle",
        }
    }

    /// Get the display name for this dialect.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "PostgreSQL",
            Self::MySQL => "MySQL",
            Self::Oracle => "Oracle",
        }
    }

    /// Port used when a connection does not specify one.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::PostgreSQL => 5432,
            Self::MySQL => 3306,
            Self::Oracle => 1521,
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Credentials and location of one target database.
///
/// `dbms` stays a raw tag so that unsupported values reach the operations that
/// report them (`UnsupportedDialect`, or a failed connection test).
#[derive(Clone, Serialize, Deserialize, JsonSchema)]
pub struct DatabaseConnectionInfo {
    /// "postgresql", "mysql" or "oracle" (case-insensitive)
    pub dbms: String,
    pub host: String,
    /// Dialect default (5432 / 3306 / 1521) when absent
    #[serde(default)]
    pub port: Option<u16>,
    /// Database name, or the Oracle service name
    #[serde(alias = "databaseName")]
    pub database_name: String,
    pub username: String,
    /// Never serialized back to clients
    #[serde(skip_serializing, default)]
    pub password: String,
}

impl DatabaseConnectionInfo {
    pub fn new(
        dbms: impl Into<String>,
        host: impl Into<String>,
        port: Option<u16>,
        database_name: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            dbms: dbms.into(),
            host: host.into(),
            port,
            database_name: database_name.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    /// Resolve the dbms tag.
    pub fn dialect(&self) -> DbResult<Dialect> {
        Dialect::parse(&self.dbms)
    }

    /// Port with the dialect default applied.
    pub fn resolved_port(&self, dialect: Dialect) -> u16 {
        self.port.unwrap_or_else(|| dialect.default_port())
    }

    /// Easy Connect string used by the Oracle client: `host:port/service`.
    pub fn oracle_connect_string(&self) -> String {
        format!(
            "{}:{}/{}",
            self.host,
            self.resolved_port(Dialect::Oracle),
            self.database_name
        )
    }
}

impl std::fmt::Debug for DatabaseConnectionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConnectionInfo")
            .field("dbms", &self.dbms)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_name", &self.database_name)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Connection information returned by list_databases (no secrets exposed).
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ConnectionSummary {
    /// Identifier to pass as `database_id` in other tool calls
    pub id: String,
    pub dbms: String,
    pub host: String,
    pub port: u16,
    pub database_name: String,
    pub username: String,
}

impl ConnectionSummary {
    pub fn from_info(id: impl Into<String>, info: &DatabaseConnectionInfo) -> Self {
        let port = info
            .dialect()
            .map(|d| info.resolved_port(d))
            .unwrap_or_else(|_| info.port.unwrap_or_default());
        Self {
            id: id.into(),
            dbms: info.dbms.clone(),
            host: info.host.clone(),
            port,
            database_name: info.database_name.clone(),
            username: info.username.clone(),
        }
    }
}
