//! Connection pool registry.
//!
//! One pool exists per target, keyed by `dbms:host:port:databaseName`. Pools are
//! created lazily on first use and live until the process exits.
//!
//! # Concurrency Safety
//!
//! - `OnceCell` per key gives single-flight creation: concurrent first requests for
//!   the same target wait for one build instead of racing to create duplicates
//! - The map lock is never held across the pool build; only the cell is awaited
//! - A failed build leaves the cell empty so the next request retries

use crate::config::PoolOptions;
use crate::db::driver::driver_for;
use crate::error::DbResult;
use crate::models::{DatabaseConnectionInfo, Dialect};
use sqlx::{MySqlPool, PgPool};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock as TokioRwLock};
use tracing::{debug, info, warn};

/// Database-specific connection pool (avoids AnyPool limitations).
#[derive(Clone)]
pub enum DbPool {
    MySql(MySqlPool),
    Postgres(PgPool),
    /// Session pool of the blocking Oracle client
    Oracle(Arc<oracle::pool::Pool>),
}

impl DbPool {
    /// Get the dialect served by this pool.
    pub fn dialect(&self) -> Dialect {
        match self {
            DbPool::MySql(_) => Dialect::MySQL,
            DbPool::Postgres(_) => Dialect::PostgreSQL,
            DbPool::Oracle(_) => Dialect::Oracle,
        }
    }
}

impl std::fmt::Debug for DbPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DbPool::MySql(pool) => f.debug_tuple("MySql").field(pool).finish(),
            DbPool::Postgres(pool) => f.debug_tuple("Postgres").field(pool).finish(),
            DbPool::Oracle(_) => f.debug_tuple("Oracle").field(&"oracle::pool::Pool").finish(),
        }
    }
}

/// Identity of a pooled target. Credentials are deliberately not part of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolKey {
    pub dialect: Dialect,
    pub host: String,
    pub port: u16,
    pub database: String,
}

impl PoolKey {
    /// Build the key for `info`, applying the dialect default port.
    pub fn from_info(info: &DatabaseConnectionInfo) -> DbResult<Self> {
        let dialect = info.dialect()?;
        Ok(Self {
            dialect,
            host: info.host.trim().to_string(),
            port: info.resolved_port(dialect),
            database: info.database_name.clone(),
        })
    }
}

impl std::fmt::Display for PoolKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.dialect.tag(),
            self.host,
            self.port,
            self.database
        )
    }
}

/// A created pool and the account it was opened with.
#[derive(Debug)]
pub struct PoolEntry {
    pub pool: DbPool,
    pub username: String,
}

/// Process-wide registry of connection pools.
pub struct PoolRegistry {
    pools: TokioRwLock<HashMap<PoolKey, Arc<OnceCell<PoolEntry>>>>,
    default_options: PoolOptions,
    /// Per-target options registered from configuration
    overrides: std::sync::RwLock<HashMap<PoolKey, PoolOptions>>,
}

impl PoolRegistry {
    pub fn new(default_options: PoolOptions) -> Self {
        Self {
            pools: TokioRwLock::new(HashMap::new()),
            default_options,
            overrides: std::sync::RwLock::new(HashMap::new()),
        }
    }

    /// Use `options` instead of the defaults when the pool for `info` is built.
    ///
    /// Has no effect on a pool that already exists.
    pub fn register_options(
        &self,
        info: &DatabaseConnectionInfo,
        options: PoolOptions,
    ) -> DbResult<()> {
        let key = PoolKey::from_info(info)?;
        let mut overrides = self.overrides.write().unwrap_or_else(|poisoned| {
            warn!(pool_key = %key, "Pool options lock poisoned; recovering");
            poisoned.into_inner()
        });
        overrides.insert(key, options);
        Ok(())
    }

    fn options_for(&self, key: &PoolKey) -> PoolOptions {
        let overrides = self.overrides.read().unwrap_or_else(|poisoned| {
            warn!(pool_key = %key, "Pool options lock poisoned; recovering");
            poisoned.into_inner()
        });
        overrides
            .get(key)
            .cloned()
            .unwrap_or_else(|| self.default_options.clone())
    }

    /// Get the pool for `info`, creating it on first use.
    pub async fn get_pool(&self, info: &DatabaseConnectionInfo) -> DbResult<DbPool> {
        let key = PoolKey::from_info(info)?;
        let options = self.options_for(&key);
        let dialect = key.dialect;
        self.get_or_create_with(key, &info.username, || async move {
            driver_for(dialect).build_pool(info, &options).await
        })
        .await
    }

    /// Get the pool stored under `key`, running `init` if none exists yet.
    ///
    /// Concurrent callers with the same key share a single `init` run.
    pub async fn get_or_create_with<F, Fut>(
        &self,
        key: PoolKey,
        username: &str,
        init: F,
    ) -> DbResult<DbPool>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = DbResult<DbPool>>,
    {
        let cell = {
            let pools = self.pools.read().await;
            if let Some(cell) = pools.get(&key) {
                Arc::clone(cell)
            } else {
                drop(pools);
                let mut pools = self.pools.write().await;
                // Double-check after acquiring write lock
                if let Some(cell) = pools.get(&key) {
                    Arc::clone(cell)
                } else {
                    let cell = Arc::new(OnceCell::new());
                    pools.insert(key.clone(), Arc::clone(&cell));
                    cell
                }
            }
        };

        let entry = cell
            .get_or_try_init(|| async {
                debug!(pool_key = %key, "Creating connection pool");
                let pool = init().await?;
                info!(pool_key = %key, "Connection pool created");
                Ok::<_, crate::error::DbError>(PoolEntry {
                    pool,
                    username: username.to_string(),
                })
            })
            .await?;

        if entry.username != username {
            warn!(
                pool_key = %key,
                pool_user = %entry.username,
                requested_user = %username,
                "Reusing pool opened with a different account"
            );
        }

        Ok(entry.pool.clone())
    }

    /// Get the number of created pools.
    pub async fn pool_count(&self) -> usize {
        let pools = self.pools.read().await;
        pools.values().filter(|cell| cell.get().is_some()).count()
    }

    /// Keys of all created pools.
    pub async fn keys(&self) -> Vec<String> {
        let pools = self.pools.read().await;
        pools
            .iter()
            .filter(|(_, cell)| cell.get().is_some())
            .map(|(key, _)| key.to_string())
            .collect()
    }
}

impl Default for PoolRegistry {
    fn default() -> Self {
        Self::new(PoolOptions::default())
    }
}

impl std::fmt::Debug for PoolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolRegistry")
            .field("default_options", &self.default_options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn lazy_mysql_pool() -> DbPool {
        DbPool::MySql(sqlx::Pool::connect_lazy("mysql://localhost").unwrap())
    }

    fn info(db: &str, user: &str) -> DatabaseConnectionInfo {
        DatabaseConnectionInfo::new("mysql", "localhost", None, db, user, "pw")
    }

    #[test]
    fn test_pool_key_format_uses_resolved_port() {
        let key = PoolKey::from_info(&info("shop", "root")).unwrap();
        assert_eq!(key.to_string(), "mysql:localhost:3306:shop");

        let pg = DatabaseConnectionInfo::new("PostgreSQL", "pg", Some(6543), "crm", "u", "p");
        assert_eq!(
            PoolKey::from_info(&pg).unwrap().to_string(),
            "postgresql:pg:6543:crm"
        );
    }

    #[test]
    fn test_pool_key_rejects_unsupported_dialect() {
        let bad = DatabaseConnectionInfo::new("sqlite", "h", None, "d", "u", "p");
        assert!(matches!(
            PoolKey::from_info(&bad).unwrap_err(),
            DbError::UnsupportedDialect { .. }
        ));
    }

    #[tokio::test]
    async fn test_get_pool_unsupported_dialect_creates_nothing() {
        let registry = PoolRegistry::default();
        let bad = DatabaseConnectionInfo::new("db2", "h", None, "d", "u", "p");
        assert!(registry.get_pool(&bad).await.is_err());
        assert_eq!(registry.pool_count().await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_first_requests_build_once() {
        let registry = Arc::new(PoolRegistry::default());
        let builds = Arc::new(AtomicUsize::new(0));
        let key = PoolKey::from_info(&info("shop", "root")).unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let registry = Arc::clone(&registry);
            let builds = Arc::clone(&builds);
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                registry
                    .get_or_create_with(key, "root", || async move {
                        builds.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(lazy_mysql_pool())
                    })
                    .await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(registry.pool_count().await, 1);
    }

    #[tokio::test]
    async fn test_distinct_databases_get_distinct_pools() {
        let registry = PoolRegistry::default();
        for db in ["shop", "crm"] {
            let key = PoolKey::from_info(&info(db, "root")).unwrap();
            registry
                .get_or_create_with(key, "root", || async { Ok(lazy_mysql_pool()) })
                .await
                .unwrap();
        }
        assert_eq!(registry.pool_count().await, 2);
        let mut keys = registry.keys().await;
        keys.sort();
        assert_eq!(
            keys,
            vec!["mysql:localhost:3306:crm", "mysql:localhost:3306:shop"]
        );
    }

    #[tokio::test]
    async fn test_different_account_reuses_existing_pool() {
        let registry = PoolRegistry::default();
        let builds = AtomicUsize::new(0);
        for user in ["alice", "bob"] {
            let key = PoolKey::from_info(&info("shop", user)).unwrap();
            registry
                .get_or_create_with(key, user, || async {
                    builds.fetch_add(1, Ordering::SeqCst);
                    Ok(lazy_mysql_pool())
                })
                .await
                .unwrap();
        }
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(registry.pool_count().await, 1);
    }

    #[tokio::test]
    async fn test_failed_build_is_retried() {
        let registry = PoolRegistry::default();
        let key = PoolKey::from_info(&info("shop", "root")).unwrap();

        let first = registry
            .get_or_create_with(key.clone(), "root", || async {
                Err(DbError::connection("refused", "start the server"))
            })
            .await;
        assert!(first.is_err());
        assert_eq!(registry.pool_count().await, 0);

        let second = registry
            .get_or_create_with(key, "root", || async { Ok(lazy_mysql_pool()) })
            .await;
        assert!(second.is_ok());
        assert_eq!(registry.pool_count().await, 1);
    }

    #[test]
    fn test_registered_options_apply_per_target() {
        let registry = PoolRegistry::default();
        let opts = PoolOptions {
            max_connections: Some(3),
            ..PoolOptions::default()
        };
        registry.register_options(&info("shop", "root"), opts.clone()).unwrap();

        let shop = PoolKey::from_info(&info("shop", "root")).unwrap();
        let crm = PoolKey::from_info(&info("crm", "root")).unwrap();
        assert_eq!(registry.options_for(&shop), opts);
        assert_eq!(registry.options_for(&crm), PoolOptions::default());
    }

    #[test]
    fn test_registered_options_survive_poisoned_lock() {
        let registry = Arc::new(PoolRegistry::default());
        let poisoner = Arc::clone(&registry);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.overrides.write().unwrap();
            panic!("poison the overrides lock");
        })
        .join();
        assert!(registry.overrides.is_poisoned());

        let opts = PoolOptions {
            min_connections: Some(2),
            ..PoolOptions::default()
        };
        registry.register_options(&info("shop", "root"), opts.clone()).unwrap();
        let shop = PoolKey::from_info(&info("shop", "root")).unwrap();
        assert_eq!(registry.options_for(&shop), opts);
    }
}
