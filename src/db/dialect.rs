//! Identifier quoting and bind placeholder rules per dialect.
//!
//! Everything here is pure: no I/O and no failure except for an unsupported
//! dialect tag in [`bind_placeholder`].

use crate::error::{DbError, DbResult};
use crate::models::Dialect;

impl Dialect {
    /// Quote character wrapping identifiers.
    pub fn quote_char(&self) -> char {
        match self {
            Dialect::PostgreSQL | Dialect::Oracle => '"',
            Dialect::MySQL => '`',
        }
    }

    /// Quote an identifier, doubling any embedded quote character.
    ///
    /// Oracle folds unquoted identifiers to upper case, so the name is upper-cased
    /// before quoting to match how the catalog stores it.
    pub fn quote_identifier(&self, name: &str) -> String {
        let q = self.quote_char();
        let folded = match self {
            Dialect::Oracle => name.to_uppercase(),
            _ => name.to_string(),
        };
        let escaped = folded.replace(q, &format!("{q}{q}"));
        format!("{q}{escaped}{q}")
    }

    /// Placeholder for the `index`-th bind value (1-based).
    ///
    /// MySQL placeholders are positional by occurrence, so the index is ignored.
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Dialect::PostgreSQL => format!("${index}"),
            Dialect::MySQL => "?".to_string(),
            Dialect::Oracle => format!(":{index}"),
        }
    }

    /// Most values a single `IN (...)` list may bind.
    ///
    /// PostgreSQL and MySQL cap a statement at 65535 parameters; Oracle caps an
    /// expression list at 1000 entries (ORA-01795).
    pub fn max_in_list(&self) -> usize {
        match self {
            Dialect::PostgreSQL | Dialect::MySQL => 65_535,
            Dialect::Oracle => 1_000,
        }
    }
}

/// Quote `name` for the dialect named by `dbms`.
///
/// An unknown or missing dialect returns the name unmodified.
pub fn sanitize_identifier(name: &str, dbms: Option<&str>) -> String {
    match dbms.and_then(Dialect::from_tag) {
        Some(dialect) => dialect.quote_identifier(name),
        None => name.to_string(),
    }
}

/// Bind placeholder for the dialect named by `dbms`.
pub fn bind_placeholder(index: usize, dbms: &str) -> DbResult<String> {
    Dialect::from_tag(dbms)
        .map(|d| d.placeholder(index))
        .ok_or_else(|| DbError::unsupported_dialect(dbms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_postgres_escapes_quotes() {
        assert_eq!(sanitize_identifier("a\"b", Some("postgresql")), "\"a\"\"b\"");
        assert_eq!(sanitize_identifier("users", Some("PostgreSQL")), "\"users\"");
    }

    #[test]
    fn test_sanitize_twice_doubles_wrapper() {
        let once = sanitize_identifier("users", Some("postgresql"));
        let twice = sanitize_identifier(&once, Some("postgresql"));
        assert_eq!(twice, "\"\"\"users\"\"\"");

        let once = sanitize_identifier("t", Some("mysql"));
        let twice = sanitize_identifier(&once, Some("mysql"));
        assert_eq!(twice, "```t```");
    }

    #[test]
    fn test_sanitize_mysql_backticks() {
        assert_eq!(sanitize_identifier("order", Some("mysql")), "`order`");
        assert_eq!(sanitize_identifier("we`ird", Some("mysql")), "`we``ird`");
        // Double quotes are ordinary characters for MySQL identifiers
        assert_eq!(sanitize_identifier("a\"b", Some("mysql")), "`a\"b`");
    }

    #[test]
    fn test_sanitize_oracle_upper_cases() {
        assert_eq!(sanitize_identifier("employees", Some("oracle")), "\"EMPLOYEES\"");
        assert_eq!(sanitize_identifier("a\"b", Some("Oracle")), "\"A\"\"B\"");
    }

    #[test]
    fn test_sanitize_unknown_dialect_passes_through() {
        assert_eq!(sanitize_identifier("a\"b", Some("sqlite")), "a\"b");
        assert_eq!(sanitize_identifier("users", None), "users");
        assert_eq!(sanitize_identifier("users", Some("")), "users");
    }

    #[test]
    fn test_bind_placeholder_table() {
        assert_eq!(bind_placeholder(3, "postgresql").unwrap(), "$3");
        assert_eq!(bind_placeholder(3, "mysql").unwrap(), "?");
        assert_eq!(bind_placeholder(1, "mysql").unwrap(), "?");
        assert_eq!(bind_placeholder(3, "oracle").unwrap(), ":3");
    }

    #[test]
    fn test_max_in_list_per_dialect() {
        assert_eq!(Dialect::PostgreSQL.max_in_list(), 65_535);
        assert_eq!(Dialect::MySQL.max_in_list(), 65_535);
        assert_eq!(Dialect::Oracle.max_in_list(), 1_000);
    }

    #[test]
    fn test_bind_placeholder_unsupported() {
        for dbms in ["sqlite", "mssql", "", "postgresqlx", "mariadb"] {
            let err = bind_placeholder(1, dbms).unwrap_err();
            assert!(
                matches!(err, DbError::UnsupportedDialect { .. }),
                "expected UnsupportedDialect for {:?}",
                dbms
            );
        }
    }
}
