// ABOUTME: Tamper detection for values read back from durable storage
// ABOUTME: Checks that a stored entry still decodes to the JSON type it was written as

use serde_json::Value;
use tracing::warn;

use crate::store::KeyValueStore;

/// JSON shape a stored value is expected to have
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoredType {
    Boolean,
    Number,
    String,
    Array,
    Object,
}

impl StoredType {
    fn matches(self, value: &Value) -> bool {
        match self {
            StoredType::Boolean => value.is_boolean(),
            StoredType::Number => value.is_number(),
            StoredType::String => value.is_string(),
            StoredType::Array => value.is_array(),
            StoredType::Object => value.is_object(),
        }
    }
}

/// Returns `true` when the value under `key` exists but no longer decodes to
/// `expected`. A missing value is not tampering. A value that cannot be read
/// at all is reported as tampered, since it cannot be trusted either.
pub fn detect_storage_tampering(store: &dyn KeyValueStore, key: &str, expected: StoredType) -> bool {
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return false,
        Err(e) => {
            warn!(key = %key, error = %e, "Could not read stored value for tamper check");
            return true;
        }
    };

    let tampered = match serde_json::from_str::<Value>(&raw) {
        Ok(value) => !expected.matches(&value),
        Err(_) => true,
    };

    if tampered {
        warn!(
            key = %key,
            expected = ?expected,
            audit = true,
            "Stored value does not match its declared type"
        );
    }

    tampered
}
