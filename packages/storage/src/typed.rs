// ABOUTME: Typed accessor for a single storage key
// ABOUTME: Explicit JSON (de)serialization so malformed entries surface as Tampered, never as panics

use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::error::{StorageError, StorageResult};
use crate::store::KeyValueStore;

/// A key whose value is always a JSON encoding of `T`
pub struct TypedSlot<T> {
    key: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedSlot<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Read and decode the value. Malformed content is `StorageError::Tampered`.
    pub fn read(&self, store: &dyn KeyValueStore) -> StorageResult<Option<T>> {
        match store.get(&self.key)? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|_| StorageError::Tampered {
                    key: self.key.clone(),
                }),
            None => Ok(None),
        }
    }

    /// Read the value, treating missing, malformed, or unreadable entries as absent
    pub fn read_or_absent(&self, store: &dyn KeyValueStore) -> Option<T> {
        match self.read(store) {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %self.key, error = %e, "Treating stored value as absent");
                None
            }
        }
    }

    pub fn write(&self, store: &dyn KeyValueStore, value: &T) -> StorageResult<()> {
        let encoded = serde_json::to_string(value)?;
        store.set(&self.key, &encoded)
    }

    pub fn remove(&self, store: &dyn KeyValueStore) -> StorageResult<()> {
        store.remove(&self.key)
    }
}

impl<T> fmt::Debug for TypedSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedSlot").field("key", &self.key).finish()
    }
}
