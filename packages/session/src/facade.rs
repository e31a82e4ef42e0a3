// ABOUTME: Security facade composing the token vault, CSRF guard, validator, and rate limiter
// ABOUTME: The only entry points the UI layer uses; converts every failure into UI-shaped results

use campus_auth::{
    AuthBackend, AuthError, AuthGrant, AuthToken, Credentials, RefreshScheduler, Registration,
    SecureAuthUser, SessionStatus, SimulatedBackend, TeardownHook, TokenVault, AUTH_SESSION_KEY,
    AUTH_USER_KEY, REFRESH_TOKEN_KEY,
};
use campus_config::SecurityConfig;
use campus_core::{SharedClock, SystemClock};
use campus_security::{
    csrf::CSRF_STATE_KEY, detect_storage_tampering, events::SECURITY_EVENTS_KEY, CryptoPrimitives,
    CsrfGuard, KeyChord, RateLimiter, SecurityEvent, SecurityEventLog, Severity, ShortcutGuard,
    StoredType, ValidationResult, ValidationRules, Validator,
};
use campus_storage::{FileStore, MemoryStore, StorageBackends, StorageScope};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{SessionError, SessionResult};

/// Authorization header set when a live access token exists
pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// File name of the durable store inside the data directory
pub const DURABLE_STORE_NAME: &str = "durable";

/// Stored values checked for tampering at startup
const WATCHED_KEYS: &[(StorageScope, &str, StoredType)] = &[
    (StorageScope::Session, AUTH_SESSION_KEY, StoredType::Object),
    (StorageScope::Session, AUTH_USER_KEY, StoredType::Object),
    (StorageScope::Session, CSRF_STATE_KEY, StoredType::Object),
    (StorageScope::Durable, REFRESH_TOKEN_KEY, StoredType::Object),
    (StorageScope::Durable, SECURITY_EVENTS_KEY, StoredType::Array),
];

pub struct SecurityFacade {
    config: SecurityConfig,
    clock: SharedClock,
    backends: StorageBackends,
    backend: Arc<dyn AuthBackend>,
    vault: Arc<TokenVault>,
    csrf: Arc<CsrfGuard>,
    limiter: RateLimiter,
    validator: Validator,
    events: Arc<SecurityEventLog>,
    shortcuts: ShortcutGuard,
    status: Arc<watch::Sender<SessionStatus>>,
    scheduler: Mutex<Option<RefreshScheduler>>,
    initialized: AtomicBool,
}

impl SecurityFacade {
    /// Compose the facade over explicit stores, clock, and backend
    pub fn new(
        config: SecurityConfig,
        backends: StorageBackends,
        clock: SharedClock,
        backend: Arc<dyn AuthBackend>,
    ) -> SessionResult<Self> {
        let crypto = Arc::new(CryptoPrimitives::new()?);

        let vault = Arc::new(TokenVault::new(
            backends.clone(),
            clock.clone(),
            crypto.clone(),
            backend.clone(),
            config.token_expiry_buffer,
        ));

        let csrf = Arc::new(CsrfGuard::new(
            backends.session.clone(),
            clock.clone(),
            crypto,
            config.csrf_token_lifetime,
            config.csrf_rotation_interval,
        ));

        let events = Arc::new(SecurityEventLog::new(
            clock.clone(),
            backends.durable.clone(),
            config.event_log_capacity,
            config.event_log_persisted,
        ));

        let initial_status = if vault.is_authenticated() {
            SessionStatus::LoggedIn
        } else {
            SessionStatus::LoggedOut
        };
        let (status, _) = watch::channel(initial_status);

        Ok(Self {
            limiter: RateLimiter::new(backends.durable.clone(), clock.clone()),
            validator: Validator::new(config.max_input_length),
            shortcuts: ShortcutGuard::new(config.dev_mode),
            status: Arc::new(status),
            scheduler: Mutex::new(None),
            initialized: AtomicBool::new(false),
            config,
            clock,
            backends,
            backend,
            vault,
            csrf,
            events,
        })
    }

    /// Durable file store in `config.data_dir`, in-memory session store,
    /// wall clock, and the simulated backend
    pub fn with_defaults(config: SecurityConfig) -> SessionResult<Self> {
        let durable = FileStore::open(&config.data_dir, DURABLE_STORE_NAME)?;
        let backends = StorageBackends::new(Arc::new(MemoryStore::new()), Arc::new(durable));

        let backend = Arc::new(SimulatedBackend::new(
            Arc::new(CryptoPrimitives::new()?),
            config.access_token_lifetime,
        ));

        Self::new(config, backends, Arc::new(SystemClock), backend)
    }

    pub fn config(&self) -> &SecurityConfig {
        &self.config
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn vault(&self) -> &TokenVault {
        &self.vault
    }

    pub fn csrf(&self) -> &CsrfGuard {
        &self.csrf
    }

    pub fn events(&self) -> &SecurityEventLog {
        &self.events
    }

    /// One-time process-wide setup. Repeated calls are no-ops.
    pub fn initialize_application_security(&self) {
        if self.initialized.swap(true, Ordering::SeqCst) {
            debug!("Application security already initialized");
            return;
        }

        self.quarantine_tampered_entries();

        if let Err(e) = self.csrf.initialize() {
            error!(error = %e, "Failed to initialize CSRF protection");
            self.events.log(
                "csrf_initialization_failed",
                Severity::High,
                json!({ "error": e.to_string() }),
            );
        }

        let shortcut_guard = self.shortcuts.install();

        self.events.log(
            "security_initialized",
            Severity::Low,
            json!({
                "dev_mode": self.config.dev_mode,
                "shortcut_guard": shortcut_guard,
            }),
        );
        info!(dev_mode = self.config.dev_mode, "Application security initialized");
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn is_authenticated(&self) -> bool {
        self.vault.is_authenticated()
    }

    pub fn get_current_user(&self) -> Option<SecureAuthUser> {
        self.vault.get_current_user()
    }

    /// Bearer authorization (when a live token exists) plus the CSRF header
    pub fn get_secure_headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();

        if let Some(token) = self.vault.get_access_token() {
            headers.insert(AUTHORIZATION_HEADER.to_string(), format!("Bearer {}", token));
        }

        if let Err(e) = self.csrf.attach_to_headers(&mut headers) {
            warn!(audit = true, error = %e, "Could not attach CSRF token to headers");
            self.events.log(
                "csrf_header_failed",
                Severity::High,
                json!({ "error": e.to_string() }),
            );
        }

        headers
    }

    pub fn sanitize_input(&self, raw: &str) -> String {
        self.validator.sanitizer().sanitize(raw).value
    }

    pub fn validate_input(&self, raw: &str, rules: &ValidationRules) -> ValidationResult {
        self.validator.validate_input(raw, rules)
    }

    pub fn is_rate_limited(&self, key: &str, max_attempts: u32, window: Duration) -> bool {
        let limited = self.limiter.is_rate_limited(key, max_attempts, window);
        if limited {
            self.events.log(
                "rate_limit_exceeded",
                Severity::Medium,
                json!({ "key": key, "max_attempts": max_attempts }),
            );
        }
        limited
    }

    /// Sign in with email and password
    pub async fn sign_in(&self, email: &str, password: &str) -> SessionResult<SecureAuthUser> {
        let limit_key = format!("login:{}", email.trim().to_lowercase());
        if self.is_rate_limited(
            &limit_key,
            self.config.login_max_attempts,
            self.config.login_window,
        ) {
            return Err(SessionError::RateLimited);
        }

        let email_check = self.validator.validate_email(email);
        let password_check = self
            .validator
            .validate_input(password, &ValidationRules::new().required());
        let errors = collect_errors(&[&email_check, &password_check]);
        if !errors.is_empty() {
            self.events.log(
                "login_validation_failed",
                Severity::Low,
                json!({ "errors": errors.len() }),
            );
            return Err(SessionError::Validation(errors));
        }

        let credentials = Credentials {
            email: email_check.sanitized_value,
            password: password.to_string(),
        };

        let grant = match self.backend.login(&credentials).await {
            Ok(grant) => grant,
            Err(e) => {
                self.events.log(
                    "login_failed",
                    Severity::Medium,
                    json!({ "reason": e.to_string() }),
                );
                return Err(e.into());
            }
        };

        let user = self.establish_session(grant)?;
        if let Err(e) = self.limiter.reset(&limit_key) {
            debug!(error = %e, "Could not reset login rate limit");
        }

        self.events
            .log("login_success", Severity::Low, json!({ "user_id": user.id }));
        Ok(user)
    }

    /// Create an account and sign in
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> SessionResult<SecureAuthUser> {
        let limit_key = format!("register:{}", email.trim().to_lowercase());
        if self.is_rate_limited(
            &limit_key,
            self.config.registration_max_attempts,
            self.config.registration_window,
        ) {
            return Err(SessionError::RateLimited);
        }

        let name_check = self.validator.validate_name(name);
        let email_check = self.validator.validate_email(email);
        let password_check = self.validator.validate_password(password);
        let errors = collect_errors(&[&name_check, &email_check, &password_check]);
        if !errors.is_empty() {
            self.events.log(
                "registration_validation_failed",
                Severity::Low,
                json!({ "errors": errors.len() }),
            );
            return Err(SessionError::Validation(errors));
        }

        let registration = Registration {
            name: name_check.sanitized_value,
            email: email_check.sanitized_value,
            password: password.to_string(),
        };

        let grant = match self.backend.register(&registration).await {
            Ok(grant) => grant,
            Err(e) => {
                self.events.log(
                    "registration_failed",
                    Severity::Medium,
                    json!({ "reason": e.to_string() }),
                );
                return Err(e.into());
            }
        };

        let user = self.establish_session(grant)?;
        self.events.log(
            "registration_success",
            Severity::Low,
            json!({ "user_id": user.id }),
        );
        Ok(user)
    }

    /// Refresh tokens now; a failure tears the session down
    pub async fn refresh_session(&self) -> bool {
        match self.vault.refresh_tokens().await {
            Ok(_) => {
                self.events.log("token_refreshed", Severity::Low, json!({}));
                // Resuming from a durable refresh token after a restart
                let logged_out = *self.status.borrow() == SessionStatus::LoggedOut;
                if logged_out {
                    self.status.send_replace(SessionStatus::LoggedIn);
                }
                if !self.is_refresh_running() {
                    self.start_scheduler();
                }
                true
            }
            Err(e) => {
                self.stop_scheduler();
                teardown(&self.csrf, &self.events, &e.to_string());
                self.status.send_replace(SessionStatus::LoggedOut);
                false
            }
        }
    }

    /// End the session: stop refreshing and clear auth and CSRF state
    pub fn logout(&self) {
        self.stop_scheduler();

        if let Err(e) = self.vault.clear_auth() {
            error!(error = %e, "Failed to clear auth state on logout");
        }
        if let Err(e) = self.csrf.clear_token() {
            error!(error = %e, "Failed to clear CSRF token on logout");
        }

        self.status.send_replace(SessionStatus::LoggedOut);
        self.events.log("logout", Severity::Low, json!({}));
        info!("User logged out");
    }

    /// Receiver that observes logins, logouts, and forced logouts
    pub fn session_status(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    pub fn is_refresh_running(&self) -> bool {
        self.lock_scheduler()
            .as_ref()
            .map(RefreshScheduler::is_running)
            .unwrap_or(false)
    }

    /// Stop background work when the owning UI context goes away
    pub fn shutdown(&self) {
        self.stop_scheduler();
        debug!("Security facade shut down");
    }

    pub fn should_block_shortcut(&self, chord: &KeyChord) -> bool {
        let blocked = self.shortcuts.should_block(chord);
        if blocked {
            self.events.log(
                "inspection_shortcut_blocked",
                Severity::Low,
                json!({ "key": chord.key }),
            );
        }
        blocked
    }

    pub fn recent_events(&self, n: usize) -> Vec<SecurityEvent> {
        self.events.recent(n)
    }

    /// Drop in-memory state so the next initialize starts fresh.
    ///
    /// Persisted data (session, refresh token, rate limits) is kept.
    pub fn reset(&self) {
        self.stop_scheduler();
        if let Err(e) = self.csrf.reset() {
            warn!(error = %e, "Failed to reset CSRF state");
        }
        self.shortcuts.uninstall();
        self.events.restore();
        self.initialized.store(false, Ordering::SeqCst);

        let status = if self.vault.is_authenticated() {
            SessionStatus::LoggedIn
        } else {
            SessionStatus::LoggedOut
        };
        self.status.send_replace(status);
        debug!("Security facade reset");
    }

    fn establish_session(&self, grant: AuthGrant) -> SessionResult<SecureAuthUser> {
        let refresh_token = grant.tokens.refresh_token.ok_or_else(|| {
            AuthError::TokenNotFound("Backend did not issue a refresh token".to_string())
        })?;

        let token = AuthToken {
            access_token: grant.tokens.access_token,
            refresh_token,
            expires_at: self.clock.now_millis() + grant.tokens.expires_in.saturating_mul(1000),
            user_id: grant.user.id.clone(),
        };

        self.vault.store_tokens(&token)?;

        // Fail closed: nothing after the tokens may leave a half-built session
        if let Err(e) = self.complete_session(&grant.user) {
            error!(error = %e, "Failed to complete session setup, clearing auth state");
            if let Err(clear_err) = self.vault.clear_auth() {
                error!(error = %clear_err, "Failed to clear partial session");
            }
            if let Err(csrf_err) = self.csrf.clear_token() {
                error!(error = %csrf_err, "Failed to clear CSRF token of partial session");
            }
            return Err(e);
        }

        self.status.send_replace(SessionStatus::LoggedIn);
        self.start_scheduler();

        Ok(grant.user)
    }

    fn complete_session(&self, user: &SecureAuthUser) -> SessionResult<()> {
        self.vault.store_user_data(user)?;

        // A new session gets a fresh anti-forgery token
        self.csrf.clear_token()?;
        self.csrf.initialize()?;
        Ok(())
    }

    fn start_scheduler(&self) {
        let csrf = self.csrf.clone();
        let events = self.events.clone();
        let hook: TeardownHook = Arc::new(move || {
            teardown(&csrf, &events, "scheduled refresh failed");
        });

        let scheduler = RefreshScheduler::start(
            self.vault.clone(),
            self.config.token_refresh_interval,
            self.status.clone(),
            CancellationToken::new(),
            Some(hook),
        );

        // Replacing drops (and so cancels) any previous scheduler
        *self.lock_scheduler() = Some(scheduler);
    }

    fn stop_scheduler(&self) {
        if let Some(scheduler) = self.lock_scheduler().take() {
            scheduler.cancel();
        }
    }

    fn lock_scheduler(&self) -> MutexGuard<'_, Option<RefreshScheduler>> {
        match self.scheduler.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Remove stored values that no longer have their expected shape
    fn quarantine_tampered_entries(&self) {
        for (scope, key, expected) in WATCHED_KEYS {
            let store = self.backends.store(*scope);
            if detect_storage_tampering(store.as_ref(), key, *expected) {
                self.events.log(
                    "storage_tampering_detected",
                    Severity::High,
                    json!({ "key": key }),
                );
                if let Err(e) = store.remove(key) {
                    error!(key, error = %e, "Failed to remove tampered entry");
                }
            }
        }
    }
}

impl Drop for SecurityFacade {
    fn drop(&mut self) {
        self.stop_scheduler();
    }
}

/// Clear CSRF state and record a forced logout
fn teardown(csrf: &CsrfGuard, events: &SecurityEventLog, reason: &str) {
    if let Err(e) = csrf.clear_token() {
        error!(error = %e, "Failed to clear CSRF token during teardown");
    }
    events.log(
        "session_expired",
        Severity::High,
        json!({ "reason": reason }),
    );
}

fn collect_errors(results: &[&ValidationResult]) -> Vec<String> {
    results
        .iter()
        .flat_map(|result| result.errors.iter().cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus_core::ManualClock;
    use campus_security::CSRF_TOKEN_HEADER;

    fn facade() -> SecurityFacade {
        let crypto = Arc::new(CryptoPrimitives::new().unwrap());
        let backend = Arc::new(SimulatedBackend::new(crypto, Duration::from_secs(3600)));
        SecurityFacade::new(
            SecurityConfig::default(),
            StorageBackends::in_memory(),
            Arc::new(ManualClock::new(1_700_000_000_000)),
            backend,
        )
        .unwrap()
    }

    #[test]
    fn test_logged_out_headers_carry_only_csrf() {
        let facade = facade();
        let headers = facade.get_secure_headers();

        assert!(!headers.contains_key(AUTHORIZATION_HEADER));
        assert!(headers.contains_key(CSRF_TOKEN_HEADER));
        assert_eq!(*facade.session_status().borrow(), SessionStatus::LoggedOut);
    }

    #[test]
    fn test_collect_errors_flattens_in_order() {
        let facade = facade();
        let email = facade.validator().validate_email("");
        let name = facade.validator().validate_name("");

        let errors = collect_errors(&[&email, &name]);
        assert_eq!(errors.len(), email.errors.len() + name.errors.len());
        assert_eq!(errors.first(), email.errors.first());
    }

    #[test]
    fn test_sanitize_input_strips_markup() {
        let facade = facade();
        assert_eq!(facade.sanitize_input("<b>hi</b><script>x</script>"), "<b>hi</b>");
    }
}
