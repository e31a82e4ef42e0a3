// ABOUTME: Key-value store trait shared by session-scoped and durable backends
// ABOUTME: Components receive a StorageBackends bundle instead of ambient globals

use std::sync::Arc;

use crate::error::StorageResult;
use crate::memory::MemoryStore;

/// String-keyed, string-valued store. Implementations must be safe to share.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Removing a missing key is not an error
    fn remove(&self, key: &str) -> StorageResult<()>;

    fn keys(&self) -> StorageResult<Vec<String>>;
}

pub type SharedStore = Arc<dyn KeyValueStore>;

/// Lifetime class of a stored value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageScope {
    /// Cleared when the client session ends
    Session,
    /// Survives restarts
    Durable,
}

/// The two stores every component works against
#[derive(Clone)]
pub struct StorageBackends {
    pub session: SharedStore,
    pub durable: SharedStore,
}

impl StorageBackends {
    pub fn new(session: SharedStore, durable: SharedStore) -> Self {
        Self { session, durable }
    }

    /// Both scopes backed by memory (tests, ephemeral demos)
    pub fn in_memory() -> Self {
        Self {
            session: Arc::new(MemoryStore::new()),
            durable: Arc::new(MemoryStore::new()),
        }
    }

    pub fn store(&self, scope: StorageScope) -> &SharedStore {
        match scope {
            StorageScope::Session => &self.session,
            StorageScope::Durable => &self.durable,
        }
    }
}

impl std::fmt::Debug for StorageBackends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageBackends").finish_non_exhaustive()
    }
}
