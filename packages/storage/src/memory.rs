// ABOUTME: In-memory key-value store used for session-scoped state
// ABOUTME: Supports a byte quota and failure injection to model platform storage errors

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use crate::error::{StorageError, StorageResult};
use crate::store::KeyValueStore;

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
    quota_bytes: Option<usize>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that rejects writes once keys plus values exceed `limit` bytes
    pub fn with_quota(limit: usize) -> Self {
        Self {
            quota_bytes: Some(limit),
            ..Self::default()
        }
    }

    /// Make every operation fail as if storage access were denied
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> StorageResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(
                "storage access denied".to_string(),
            ));
        }
        Ok(())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.check_available()?;
        let entries = self.entries.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.check_available()?;
        let mut entries = self.entries.write().map_err(|_| StorageError::LockPoisoned)?;

        if let Some(limit) = self.quota_bytes {
            let others: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let requested = others + key.len() + value.len();
            if requested > limit {
                return Err(StorageError::QuotaExceeded { requested, limit });
            }
        }

        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.check_available()?;
        let mut entries = self.entries.write().map_err(|_| StorageError::LockPoisoned)?;
        entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        self.check_available()?;
        let entries = self.entries.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(entries.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let store = MemoryStore::new();
        store.set("a", "1").unwrap();
        assert_eq!(store.get("a").unwrap(), Some("1".to_string()));

        store.remove("a").unwrap();
        assert_eq!(store.get("a").unwrap(), None);

        // Removing again is fine
        store.remove("a").unwrap();
    }

    #[test]
    fn test_quota_exceeded() {
        let store = MemoryStore::with_quota(10);
        store.set("k", "12345").unwrap();

        let result = store.set("other", "123456");
        assert!(matches!(result, Err(StorageError::QuotaExceeded { .. })));

        // Overwriting an existing key only counts the new value
        store.set("k", "123456789").unwrap();
    }

    #[test]
    fn test_unavailable_store_fails_every_operation() {
        let store = MemoryStore::new();
        store.set("a", "1").unwrap();
        store.set_unavailable(true);

        assert!(store.get("a").is_err());
        assert!(store.set("b", "2").is_err());
        assert!(store.remove("a").is_err());
        assert!(store.keys().is_err());

        store.set_unavailable(false);
        assert_eq!(store.get("a").unwrap(), Some("1".to_string()));
    }
}
