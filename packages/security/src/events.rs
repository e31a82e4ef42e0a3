// ABOUTME: Capped FIFO log of security-relevant events with best-effort persistence
// ABOUTME: Never fails the caller; storage errors are logged and swallowed

use campus_core::SharedClock;
use campus_storage::{SharedStore, TypedSlot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

/// Durable storage key for the persisted event tail
pub const SECURITY_EVENTS_KEY: &str = "security_events";

pub const DEFAULT_EVENT_CAPACITY: usize = 100;
pub const DEFAULT_PERSISTED_EVENTS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub details: Map<String, Value>,
}

pub struct SecurityEventLog {
    events: Mutex<VecDeque<SecurityEvent>>,
    capacity: usize,
    persisted: usize,
    clock: SharedClock,
    store: Option<SharedStore>,
    slot: TypedSlot<Vec<SecurityEvent>>,
}

impl SecurityEventLog {
    /// Create a log backed by `store`, restoring any persisted tail
    pub fn new(clock: SharedClock, store: SharedStore, capacity: usize, persisted: usize) -> Self {
        let log = Self {
            events: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
            persisted: persisted.min(capacity),
            clock,
            store: Some(store),
            slot: TypedSlot::new(SECURITY_EVENTS_KEY),
        };
        log.restore();
        log
    }

    /// Create a log that is never persisted
    pub fn in_memory(clock: SharedClock, capacity: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
            persisted: 0,
            clock,
            store: None,
            slot: TypedSlot::new(SECURITY_EVENTS_KEY),
        }
    }

    /// Append an event, evicting the oldest once over capacity.
    ///
    /// `details` should be a JSON object; any other value is stored under `value`.
    pub fn log(&self, event_type: &str, severity: Severity, details: Value) {
        let details = match details {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };

        match severity {
            Severity::Low => debug!(audit = true, event_type, %severity, "Security event"),
            Severity::Medium => info!(audit = true, event_type, %severity, "Security event"),
            Severity::High => warn!(audit = true, event_type, %severity, "Security event"),
            Severity::Critical => error!(audit = true, event_type, %severity, "Security event"),
        }

        let event = SecurityEvent {
            event_type: event_type.to_string(),
            timestamp: self.clock.now(),
            severity,
            details,
        };

        let tail = {
            let mut events = self.lock_events();
            events.push_back(event);
            while events.len() > self.capacity {
                events.pop_front();
            }
            self.tail(&events)
        };

        self.persist(&tail);
    }

    /// Most recent `n` events, oldest first
    pub fn recent(&self, n: usize) -> Vec<SecurityEvent> {
        let events = self.lock_events();
        let skip = events.len().saturating_sub(n);
        events.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock_events().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_events().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every event, including the persisted tail
    pub fn clear(&self) {
        self.lock_events().clear();

        if let Some(store) = &self.store {
            if let Err(e) = self.slot.remove(store.as_ref()) {
                warn!(error = %e, "Failed to clear persisted security events");
            }
        }
    }

    /// Reload the persisted tail, replacing in-memory events
    pub fn restore(&self) {
        let store = match &self.store {
            Some(store) => store,
            None => return,
        };

        let restored = self.slot.read_or_absent(store.as_ref()).unwrap_or_default();
        let skip = restored.len().saturating_sub(self.capacity);

        let mut events = self.lock_events();
        events.clear();
        events.extend(restored.into_iter().skip(skip));
        debug!(count = events.len(), "Restored security events");
    }

    fn tail(&self, events: &VecDeque<SecurityEvent>) -> Vec<SecurityEvent> {
        let skip = events.len().saturating_sub(self.persisted);
        events.iter().skip(skip).cloned().collect()
    }

    fn persist(&self, tail: &Vec<SecurityEvent>) {
        let store = match &self.store {
            Some(store) if self.persisted > 0 => store,
            _ => return,
        };

        if let Err(e) = self.slot.write(store.as_ref(), tail) {
            debug!(error = %e, "Failed to persist security events");
        }
    }

    fn lock_events(&self) -> MutexGuard<'_, VecDeque<SecurityEvent>> {
        match self.events.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
