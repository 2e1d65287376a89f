//! Randomized checks of identifier quoting and placeholder rules.

use erd_schema_bridge::db::{bind_placeholder, sanitize_identifier};
use erd_schema_bridge::error::DbError;
use rand::Rng;
use rand::seq::SliceRandom;

/// Random identifier mixing letters, digits, quotes, spaces and unicode.
fn random_identifier(rng: &mut impl Rng) -> String {
    const PIECES: &[&str] = &[
        "a", "Z", "_", "1", " ", "\"", "`", "'", ";", "--", "é", "表", "$", ".",
    ];
    let len = rng.gen_range(1..24);
    let mut name = String::new();
    for _ in 0..len {
        name.push_str(PIECES.choose(&mut *rng).copied().unwrap_or("a"));
    }
    name
}

/// Strip the wrapping quotes and undo the doubling of `q`.
fn unquote(quoted: &str, q: char) -> Option<String> {
    let inner = quoted.strip_prefix(q)?.strip_suffix(q)?;
    let doubled = format!("{q}{q}");
    // Every quote char inside must be part of a doubled pair
    let without_pairs = inner.replace(&doubled, "");
    if without_pairs.contains(q) {
        return None;
    }
    Some(inner.replace(&doubled, &q.to_string()))
}

#[test]
fn test_postgres_quoting_is_reversible() {
    let mut rng = rand::thread_rng();
    for _ in 0..500 {
        let name = random_identifier(&mut rng);
        let quoted = sanitize_identifier(&name, Some("postgresql"));
        assert_eq!(unquote(&quoted, '"').as_deref(), Some(name.as_str()), "{quoted}");
    }
}

#[test]
fn test_mysql_quoting_is_reversible() {
    let mut rng = rand::thread_rng();
    for _ in 0..500 {
        let name = random_identifier(&mut rng);
        let quoted = sanitize_identifier(&name, Some("MySQL"));
        assert_eq!(unquote(&quoted, '`').as_deref(), Some(name.as_str()), "{quoted}");
    }
}

#[test]
fn test_oracle_quoting_upper_cases() {
    let mut rng = rand::thread_rng();
    for _ in 0..500 {
        let name = random_identifier(&mut rng);
        let quoted = sanitize_identifier(&name, Some("oracle"));
        assert_eq!(
            unquote(&quoted, '"').as_deref(),
            Some(name.to_uppercase().as_str()),
            "{quoted}"
        );
    }
}

#[test]
fn test_unknown_dialect_passes_through() {
    let mut rng = rand::thread_rng();
    for _ in 0..100 {
        let name = random_identifier(&mut rng);
        assert_eq!(sanitize_identifier(&name, Some("sqlite")), name);
        assert_eq!(sanitize_identifier(&name, None), name);
    }
}

#[test]
fn test_placeholders_per_dialect() {
    let mut rng = rand::thread_rng();
    for _ in 0..100 {
        let index = rng.gen_range(1..10_000usize);
        assert_eq!(bind_placeholder(index, "postgresql").unwrap(), format!("${index}"));
        assert_eq!(bind_placeholder(index, "mysql").unwrap(), "?");
        assert_eq!(bind_placeholder(index, "oracle").unwrap(), format!(":{index}"));
    }
}

#[test]
fn test_placeholder_unknown_dialect() {
    for dbms in ["sqlite", "mssql", "", "db2"] {
        let err = bind_placeholder(1, dbms).unwrap_err();
        assert!(matches!(err, DbError::UnsupportedDialect { .. }), "{dbms}");
    }
}
