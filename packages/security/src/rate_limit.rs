// ABOUTME: Sliding-window attempt limiter persisted in durable storage
// ABOUTME: Advisory client-side throttle for login and registration; fails open on storage errors

use campus_core::SharedClock;
use campus_storage::{SharedStore, StorageError, TypedSlot};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::SecurityResult;

/// Prefix for per-key attempt lists in durable storage
pub const RATE_LIMIT_KEY_PREFIX: &str = "rate_limit_";

/// Storage key holding the attempt timestamps for `key`
pub fn storage_key(key: &str) -> String {
    format!("{}{}", RATE_LIMIT_KEY_PREFIX, key)
}

pub struct RateLimiter {
    store: SharedStore,
    clock: SharedClock,
}

impl RateLimiter {
    pub fn new(store: SharedStore, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    /// Record an attempt for `key` unless `max_attempts` already happened in `window`.
    ///
    /// Returns `true` when the caller is limited. The blocked attempt is not
    /// recorded. Storage failures allow the attempt.
    pub fn is_rate_limited(&self, key: &str, max_attempts: u32, window: Duration) -> bool {
        match self.check_and_record(key, max_attempts, window) {
            Ok(limited) => limited,
            Err(e) => {
                warn!(
                    audit = true,
                    key = %key,
                    error = %e,
                    "Rate limit storage failure, allowing attempt"
                );
                false
            }
        }
    }

    /// Attempts left in the current window without recording one
    pub fn remaining_attempts(&self, key: &str, max_attempts: u32, window: Duration) -> u32 {
        match self.attempts_in_window(key, window) {
            Ok(attempts) => max_attempts.saturating_sub(attempts.len() as u32),
            Err(e) => {
                debug!(key = %key, error = %e, "Could not read rate limit state");
                max_attempts
            }
        }
    }

    /// Forget every recorded attempt for `key`
    pub fn reset(&self, key: &str) -> SecurityResult<()> {
        TypedSlot::<Vec<i64>>::new(storage_key(key)).remove(self.store.as_ref())?;
        debug!(key = %key, "Rate limit reset");
        Ok(())
    }

    fn check_and_record(&self, key: &str, max_attempts: u32, window: Duration) -> SecurityResult<bool> {
        let slot = TypedSlot::<Vec<i64>>::new(storage_key(key));
        let mut attempts = self.attempts_in_window(key, window)?;

        if attempts.len() >= max_attempts as usize {
            // Persist the pruned list so stale entries do not accumulate
            slot.write(self.store.as_ref(), &attempts)?;
            warn!(
                audit = true,
                key = %key,
                attempts = attempts.len(),
                max_attempts,
                "Rate limit exceeded"
            );
            return Ok(true);
        }

        attempts.push(self.clock.now_millis());
        slot.write(self.store.as_ref(), &attempts)?;
        Ok(false)
    }

    fn attempts_in_window(&self, key: &str, window: Duration) -> SecurityResult<Vec<i64>> {
        let slot = TypedSlot::<Vec<i64>>::new(storage_key(key));
        let now = self.clock.now_millis();
        let window_ms = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);

        let stored = match slot.read(self.store.as_ref()) {
            Ok(stored) => stored.unwrap_or_default(),
            Err(StorageError::Tampered { .. }) => {
                warn!(audit = true, key = %key, "Malformed rate limit entry treated as empty");
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(stored
            .into_iter()
            // Future or unrepresentable timestamps are dropped, never trusted
            .filter(|&timestamp| {
                timestamp <= now
                    && now
                        .checked_sub(timestamp)
                        .is_some_and(|age| age < window_ms)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus_core::ManualClock;
    use campus_storage::{KeyValueStore, MemoryStore};
    use std::sync::Arc;

    fn limiter() -> (RateLimiter, Arc<MemoryStore>, Arc<ManualClock>) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(1_000_000));
        (
            RateLimiter::new(store.clone(), clock.clone()),
            store,
            clock,
        )
    }

    #[test]
    fn test_blocks_after_max_attempts() {
        let (limiter, _, _) = limiter();
        let window = Duration::from_secs(60);

        for _ in 0..3 {
            assert!(!limiter.is_rate_limited("login", 3, window));
        }
        assert!(limiter.is_rate_limited("login", 3, window));
        assert!(limiter.is_rate_limited("login", 3, window));
    }

    #[test]
    fn test_blocked_attempt_not_recorded() {
        let (limiter, store, _) = limiter();
        let window = Duration::from_secs(60);

        limiter.is_rate_limited("k", 1, window);
        limiter.is_rate_limited("k", 1, window);
        limiter.is_rate_limited("k", 1, window);

        let stored: Vec<i64> = serde_json::from_str(&store.get("rate_limit_k").unwrap().unwrap()).unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[test]
    fn test_window_slides() {
        let (limiter, _, clock) = limiter();
        let window = Duration::from_secs(60);

        assert!(!limiter.is_rate_limited("k", 2, window));
        clock.advance_millis(30_000);
        assert!(!limiter.is_rate_limited("k", 2, window));
        assert!(limiter.is_rate_limited("k", 2, window));

        // First attempt leaves the window
        clock.advance_millis(30_000);
        assert!(!limiter.is_rate_limited("k", 2, window));
        assert!(limiter.is_rate_limited("k", 2, window));
    }

    #[test]
    fn test_keys_are_independent() {
        let (limiter, _, _) = limiter();
        let window = Duration::from_secs(60);

        assert!(!limiter.is_rate_limited("a", 1, window));
        assert!(limiter.is_rate_limited("a", 1, window));
        assert!(!limiter.is_rate_limited("b", 1, window));
    }

    #[test]
    fn test_remaining_and_reset() {
        let (limiter, _, _) = limiter();
        let window = Duration::from_secs(60);

        assert_eq!(limiter.remaining_attempts("k", 3, window), 3);
        limiter.is_rate_limited("k", 3, window);
        assert_eq!(limiter.remaining_attempts("k", 3, window), 2);

        limiter.reset("k").unwrap();
        assert_eq!(limiter.remaining_attempts("k", 3, window), 3);
    }

    #[test]
    fn test_extreme_stored_timestamps_are_dropped() {
        let (limiter, store, _) = limiter();
        store
            .set(
                "rate_limit_k",
                &format!("[{}, {}, {}]", i64::MIN, i64::MAX, -1),
            )
            .unwrap();

        assert_eq!(limiter.remaining_attempts("k", 2, Duration::from_secs(60)), 2);
        assert!(!limiter.is_rate_limited("k", 1, Duration::from_secs(60)));
        assert!(limiter.is_rate_limited("k", 1, Duration::from_secs(60)));

        let stored: Vec<i64> = serde_json::from_str(&store.get("rate_limit_k").unwrap().unwrap()).unwrap();
        assert_eq!(stored, vec![1_000_000]);
    }

    #[test]
    fn test_malformed_entry_treated_as_empty() {
        let (limiter, store, _) = limiter();
        store.set("rate_limit_k", "{not a list").unwrap();

        assert!(!limiter.is_rate_limited("k", 1, Duration::from_secs(60)));
        assert!(limiter.is_rate_limited("k", 1, Duration::from_secs(60)));
    }
}
