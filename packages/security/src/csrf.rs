// ABOUTME: Anti-forgery token lifecycle kept in session-scoped storage
// ABOUTME: Issues, rotates, validates (constant-time), and clears the per-session CSRF token

use campus_core::SharedClock;
use campus_storage::{SharedStore, TypedSlot};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::crypto::CryptoPrimitives;
use crate::error::SecurityResult;

/// Header carrying the CSRF token on mutating requests
pub const CSRF_TOKEN_HEADER: &str = "X-CSRF-Token";

/// Form field carrying the CSRF token
pub const CSRF_FORM_FIELD: &str = "_csrf";

/// Session storage key for the current token
pub const CSRF_STATE_KEY: &str = "csrf_state";

/// Random bytes per token
const TOKEN_BYTES: usize = 32;

/// Token and issuance instant (epoch millis)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsrfState {
    pub token: String,
    pub issued_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsrfPhase {
    Uninitialized,
    Active,
    Expired,
    Rotated,
    Cleared,
}

pub struct CsrfGuard {
    store: SharedStore,
    clock: SharedClock,
    crypto: Arc<CryptoPrimitives>,
    slot: TypedSlot<CsrfState>,
    lifetime_ms: i64,
    rotation_ms: i64,
    phase: Mutex<CsrfPhase>,
}

impl CsrfGuard {
    pub fn new(
        store: SharedStore,
        clock: SharedClock,
        crypto: Arc<CryptoPrimitives>,
        lifetime: Duration,
        rotation_interval: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            crypto,
            slot: TypedSlot::new(CSRF_STATE_KEY),
            lifetime_ms: duration_millis(lifetime),
            rotation_ms: duration_millis(rotation_interval),
            phase: Mutex::new(CsrfPhase::Uninitialized),
        }
    }

    /// Reuse a live stored token or issue a new one
    pub fn initialize(&self) -> SecurityResult<String> {
        if let Some(state) = self.current_state() {
            if self.is_live(&state) {
                self.set_phase(CsrfPhase::Active);
                debug!("Reusing existing CSRF token");
                return Ok(state.token);
            }
        }

        let token = self.issue_token()?;
        self.set_phase(CsrfPhase::Active);
        info!("CSRF protection initialized");
        Ok(token)
    }

    /// Current token, if one is stored and still live
    pub fn get_token(&self) -> Option<String> {
        self.current_state()
            .filter(|state| self.is_live(state))
            .map(|state| state.token)
    }

    pub fn is_token_valid(&self) -> bool {
        self.current_state()
            .map(|state| self.is_live(&state))
            .unwrap_or(false)
    }

    pub fn should_rotate_token(&self) -> bool {
        match self.current_state() {
            Some(state) => self
                .age_millis(&state)
                .map_or(true, |age| age > self.rotation_ms),
            None => true,
        }
    }

    /// The token request builders should use: rotated when due, otherwise unchanged
    pub fn rotate_token_if_needed(&self) -> SecurityResult<String> {
        let existing = self.current_state();

        if let Some(state) = &existing {
            if self.is_live(state) && !self.should_rotate_token() {
                return Ok(state.token.clone());
            }
        }

        let token = self.issue_token()?;
        if existing.is_some() {
            self.set_phase(CsrfPhase::Rotated);
            info!("CSRF token rotated");
        } else {
            self.set_phase(CsrfPhase::Active);
        }
        Ok(token)
    }

    /// Compare `candidate` against the stored live token in constant time
    pub fn validate_token(&self, candidate: &str) -> bool {
        let state = match self.current_state() {
            Some(state) => state,
            None => {
                warn!(audit = true, "CSRF validation failed: no token issued");
                return false;
            }
        };

        if !self.is_live(&state) {
            warn!(audit = true, "CSRF validation failed: token expired");
            return false;
        }

        let valid = CryptoPrimitives::constant_time_eq(candidate.as_bytes(), state.token.as_bytes());
        if !valid {
            warn!(audit = true, "CSRF validation failed: token mismatch");
        }
        valid
    }

    /// Drop the token; `get_token` returns nothing until re-initialized
    pub fn clear_token(&self) -> SecurityResult<()> {
        self.slot.remove(self.store.as_ref())?;
        self.set_phase(CsrfPhase::Cleared);
        debug!("CSRF token cleared");
        Ok(())
    }

    /// Clear stored state and return to the uninitialized phase
    pub fn reset(&self) -> SecurityResult<()> {
        self.slot.remove(self.store.as_ref())?;
        self.set_phase(CsrfPhase::Uninitialized);
        Ok(())
    }

    pub fn phase(&self) -> CsrfPhase {
        let phase = self.read_phase();
        match phase {
            CsrfPhase::Active | CsrfPhase::Rotated if !self.is_token_valid() => CsrfPhase::Expired,
            other => other,
        }
    }

    /// Add the (possibly rotated) token to outgoing request headers
    pub fn attach_to_headers(&self, headers: &mut HashMap<String, String>) -> SecurityResult<()> {
        let token = self.rotate_token_if_needed()?;
        headers.insert(CSRF_TOKEN_HEADER.to_string(), token);
        Ok(())
    }

    /// Add the (possibly rotated) token to a form payload
    pub fn attach_to_form(&self, form: &mut Map<String, Value>) -> SecurityResult<()> {
        let token = self.rotate_token_if_needed()?;
        form.insert(CSRF_FORM_FIELD.to_string(), Value::String(token));
        Ok(())
    }

    pub fn csrf_headers(&self) -> SecurityResult<HashMap<String, String>> {
        let mut headers = HashMap::new();
        self.attach_to_headers(&mut headers)?;
        Ok(headers)
    }

    fn issue_token(&self) -> SecurityResult<String> {
        let state = CsrfState {
            token: self.crypto.random_token(TOKEN_BYTES)?,
            issued_at: self.clock.now_millis(),
        };
        self.slot.write(self.store.as_ref(), &state)?;
        Ok(state.token)
    }

    fn current_state(&self) -> Option<CsrfState> {
        self.slot.read_or_absent(self.store.as_ref())
    }

    fn is_live(&self, state: &CsrfState) -> bool {
        self.age_millis(state)
            .is_some_and(|age| age < self.lifetime_ms)
    }

    /// Age of `state`; `None` when it claims to be issued in the future
    fn age_millis(&self, state: &CsrfState) -> Option<i64> {
        self.clock
            .now_millis()
            .checked_sub(state.issued_at)
            .filter(|age| *age >= 0)
    }

    fn read_phase(&self) -> CsrfPhase {
        match self.phase.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn set_phase(&self, phase: CsrfPhase) {
        match self.phase.lock() {
            Ok(mut guard) => *guard = phase,
            Err(poisoned) => *poisoned.into_inner() = phase,
        }
    }
}

fn duration_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
