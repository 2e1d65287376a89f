//! Credential store.
//!
//! Resolves a `database_id` to the connection details of a target database.
//! Passwords never leave the store through [`CredentialStore::list`].

use crate::config::DatabaseConfig;
use crate::models::{ConnectionSummary, DatabaseConnectionInfo};
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

/// Lookup of target database credentials by id.
pub trait CredentialStore: Send + Sync {
    /// Connection details for `database_id`, if known.
    fn get(&self, database_id: &str) -> Option<DatabaseConnectionInfo>;

    /// Every known database, without secrets, ordered by id.
    fn list(&self) -> Vec<ConnectionSummary>;
}

/// Credential store held in memory, filled from configuration at startup.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    entries: RwLock<BTreeMap<String, DatabaseConnectionInfo>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Every write is a single map operation, so a poisoned guard is still consistent.
    fn read_entries(&self) -> RwLockReadGuard<'_, BTreeMap<String, DatabaseConnectionInfo>> {
        self.entries.read().unwrap_or_else(|poisoned| {
            warn!("Credential store lock poisoned; recovering");
            poisoned.into_inner()
        })
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, BTreeMap<String, DatabaseConnectionInfo>> {
        self.entries.write().unwrap_or_else(|poisoned| {
            warn!("Credential store lock poisoned; recovering");
            poisoned.into_inner()
        })
    }

    /// Build a store from `--database` entries.
    pub fn from_configs(configs: &[DatabaseConfig]) -> Self {
        let store = Self::new();
        for config in configs {
            store.insert(config.id.clone(), config.info.clone());
        }
        store
    }

    /// Add or replace the credentials for `id`.
    ///
    /// Returns true when an entry was replaced.
    pub fn insert(&self, id: impl Into<String>, info: DatabaseConnectionInfo) -> bool {
        let id = id.into();
        let mut entries = self.write_entries();
        debug!(id = %id, dbms = %info.dbms, host = %info.host, "Registered database credentials");
        entries.insert(id, info).is_some()
    }

    /// Add credentials unless `id` is already known.
    ///
    /// Returns false, leaving the existing entry, when `id` was taken.
    pub fn insert_if_absent(&self, id: impl Into<String>, info: DatabaseConnectionInfo) -> bool {
        let id = id.into();
        let mut entries = self.write_entries();
        if entries.contains_key(&id) {
            warn!(id = %id, "Database id already configured; keeping the existing entry");
            return false;
        }
        entries.insert(id, info);
        true
    }

    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn get(&self, database_id: &str) -> Option<DatabaseConnectionInfo> {
        self.read_entries().get(database_id.trim()).cloned()
    }

    fn list(&self) -> Vec<ConnectionSummary> {
        self.read_entries()
            .iter()
            .map(|(id, info)| ConnectionSummary::from_info(id, info))
            .collect()
    }
}
