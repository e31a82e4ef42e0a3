// ABOUTME: Integration tests for the security facade's session lifecycle
// ABOUTME: Sign-in, registration, rate limiting, logout, forced logout, and startup checks

use campus_auth::{SimulatedBackend, AUTH_SESSION_KEY, REFRESH_TOKEN_KEY};
use campus_config::SecurityConfig;
use campus_core::ManualClock;
use campus_security::{CryptoPrimitives, KeyChord, CSRF_TOKEN_HEADER};
use campus_session::{
    SecurityFacade, SessionError, SessionStatus, ValidationRules, AUTHORIZATION_HEADER,
};
use campus_storage::{KeyValueStore, MemoryStore, StorageBackends, StorageScope};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

const NOW: i64 = 1_700_000_000_000;
const EMAIL: &str = "ada@example.com";
const PASSWORD: &str = "Tr0ub4dor&3xyz";

struct Harness {
    facade: SecurityFacade,
    backend: Arc<SimulatedBackend>,
    backends: StorageBackends,
    clock: Arc<ManualClock>,
}

fn harness(config: SecurityConfig) -> Harness {
    harness_with(config, StorageBackends::in_memory())
}

fn harness_with(config: SecurityConfig, backends: StorageBackends) -> Harness {
    let crypto = Arc::new(CryptoPrimitives::new().unwrap());
    let backend = Arc::new(SimulatedBackend::new(crypto, Duration::from_secs(3600)));
    let clock = Arc::new(ManualClock::new(NOW));

    let facade =
        SecurityFacade::new(config, backends.clone(), clock.clone(), backend.clone()).unwrap();

    Harness {
        facade,
        backend,
        backends,
        clock,
    }
}

fn event_types(facade: &SecurityFacade) -> Vec<String> {
    facade
        .recent_events(100)
        .into_iter()
        .map(|event| event.event_type)
        .collect()
}

#[tokio::test]
async fn sign_in_establishes_session() {
    let h = harness(SecurityConfig::default());
    h.facade.initialize_application_security();

    let user = h.facade.sign_in(EMAIL, PASSWORD).await.unwrap();
    assert_eq!(user.email, EMAIL);
    assert!(!user.is_first_time_user);

    assert!(h.facade.is_authenticated());
    assert_eq!(h.facade.get_current_user(), Some(user));
    assert_eq!(*h.facade.session_status().borrow(), SessionStatus::LoggedIn);
    assert!(h.facade.is_refresh_running());

    let headers = h.facade.get_secure_headers();
    let bearer = headers.get(AUTHORIZATION_HEADER).unwrap();
    assert!(bearer.starts_with("Bearer at_"));
    assert_eq!(headers.get(CSRF_TOKEN_HEADER), h.facade.csrf().get_token().as_ref());

    assert!(event_types(&h.facade).contains(&"login_success".to_string()));
}

#[tokio::test]
async fn sign_in_rejects_invalid_email_without_session() {
    let h = harness(SecurityConfig::default());

    let err = h.facade.sign_in("a@b..com", PASSWORD).await.unwrap_err();
    assert!(matches!(err, SessionError::Validation(ref errors) if !errors.is_empty()));
    assert!(!h.facade.is_authenticated());
    assert!(!h.facade.is_refresh_running());
}

#[tokio::test]
async fn repeated_sign_in_attempts_are_rate_limited() {
    let h = harness(SecurityConfig::default());

    for _ in 0..5 {
        let err = h.facade.sign_in("nobody", "x").await.unwrap_err();
        assert!(matches!(err, SessionError::Validation(_)));
    }

    let err = h.facade.sign_in("nobody", "x").await.unwrap_err();
    assert!(matches!(err, SessionError::RateLimited));
    assert!(event_types(&h.facade).contains(&"rate_limit_exceeded".to_string()));

    // Other accounts are unaffected
    assert!(h.facade.sign_in(EMAIL, PASSWORD).await.is_ok());

    h.clock.advance(chrono::Duration::minutes(16));
    assert!(matches!(
        h.facade.sign_in("nobody", "x").await,
        Err(SessionError::Validation(_))
    ));
}

#[tokio::test]
async fn successful_sign_in_resets_attempts() {
    let mut config = SecurityConfig::default();
    config.login_max_attempts = 2;
    let h = harness(config);

    h.facade.sign_in(EMAIL, PASSWORD).await.unwrap();
    h.facade.logout();
    h.facade.sign_in(EMAIL, PASSWORD).await.unwrap();
    h.facade.logout();
    h.facade.sign_in(EMAIL, PASSWORD).await.unwrap();
}

#[tokio::test]
async fn register_validates_every_field() {
    let h = harness(SecurityConfig::default());

    let err = h.facade.register("A", EMAIL, "aaaAAA111!!!").await.unwrap_err();
    match err {
        SessionError::Validation(errors) => {
            assert!(errors.iter().any(|e| e.contains("at least 2")));
            assert!(errors
                .iter()
                .any(|e| e.contains("3 or more repeated characters")));
        }
        other => panic!("unexpected error: {other}"),
    }

    let user = h.facade.register("Ada Lovelace", EMAIL, PASSWORD).await.unwrap();
    assert_eq!(user.name, "Ada Lovelace");
    assert!(user.is_first_time_user);
    assert!(h.facade.is_authenticated());
}

#[tokio::test]
async fn logout_clears_everything_and_stops_refresh() {
    let h = harness(SecurityConfig::default());
    h.facade.sign_in(EMAIL, PASSWORD).await.unwrap();

    h.facade.logout();

    assert!(!h.facade.is_authenticated());
    assert!(h.facade.get_current_user().is_none());
    assert!(h.facade.csrf().get_token().is_none());
    assert!(!h.facade.is_refresh_running());
    assert_eq!(*h.facade.session_status().borrow(), SessionStatus::LoggedOut);
    assert!(h
        .backends
        .store(StorageScope::Durable)
        .get(REFRESH_TOKEN_KEY)
        .unwrap()
        .is_none());

    // Repeat logout is harmless
    h.facade.logout();
    assert!(!h.facade.is_authenticated());
}

#[tokio::test(start_paused = true)]
async fn failed_scheduled_refresh_forces_logout() {
    let h = harness(SecurityConfig::default());
    h.facade.sign_in(EMAIL, PASSWORD).await.unwrap();
    let mut status = h.facade.session_status();

    h.backend.set_fail_refresh(true);

    let interval = h.facade.config().token_refresh_interval;
    tokio::time::timeout(
        interval * 2,
        status.wait_for(|s| *s == SessionStatus::LoggedOut),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(h.backend.refresh_calls(), 1);
    assert!(!h.facade.is_authenticated());
    assert!(h.facade.csrf().get_token().is_none());
    assert!(event_types(&h.facade).contains(&"session_expired".to_string()));
}

#[tokio::test(start_paused = true)]
async fn scheduled_refresh_keeps_session_alive() {
    let h = harness(SecurityConfig::default());
    h.facade.sign_in(EMAIL, PASSWORD).await.unwrap();
    let before = h.facade.vault().get_access_token().unwrap();

    let interval = h.facade.config().token_refresh_interval;
    tokio::time::sleep(interval + Duration::from_secs(1)).await;

    assert_eq!(h.backend.refresh_calls(), 1);
    let after = h.facade.vault().get_access_token().unwrap();
    assert_ne!(before, after);
    assert!(h.facade.is_refresh_running());
}

#[tokio::test]
async fn manual_refresh_failure_tears_down() {
    let h = harness(SecurityConfig::default());
    h.facade.sign_in(EMAIL, PASSWORD).await.unwrap();

    assert!(h.facade.refresh_session().await);

    h.backend.set_fail_refresh(true);
    assert!(!h.facade.refresh_session().await);
    assert!(!h.facade.is_authenticated());
    assert!(!h.facade.is_refresh_running());
    assert!(h.facade.csrf().get_token().is_none());
    assert_eq!(*h.facade.session_status().borrow(), SessionStatus::LoggedOut);
}

#[test]
fn initialization_is_idempotent() {
    let h = harness(SecurityConfig::default());

    h.facade.initialize_application_security();
    let token = h.facade.csrf().get_token();
    h.facade.initialize_application_security();

    assert!(h.facade.is_initialized());
    assert_eq!(h.facade.csrf().get_token(), token);
    let initialized = event_types(&h.facade)
        .into_iter()
        .filter(|t| t == "security_initialized")
        .count();
    assert_eq!(initialized, 1);
}

#[test]
fn initialization_removes_tampered_entries() {
    let h = harness(SecurityConfig::default());
    let session = h.backends.store(StorageScope::Session);
    session.set(AUTH_SESSION_KEY, "[1,2,3]").unwrap();

    h.facade.initialize_application_security();

    assert!(session.get(AUTH_SESSION_KEY).unwrap().is_none());
    assert!(event_types(&h.facade).contains(&"storage_tampering_detected".to_string()));
}

#[test]
fn shortcut_guard_follows_dev_mode() {
    let chord = KeyChord::new("F12");

    let h = harness(SecurityConfig::default());
    h.facade.initialize_application_security();
    assert!(h.facade.should_block_shortcut(&chord));
    assert!(!h.facade.should_block_shortcut(&KeyChord::new("a")));

    let mut config = SecurityConfig::default();
    config.dev_mode = true;
    let dev = harness(config);
    dev.facade.initialize_application_security();
    assert!(!dev.facade.should_block_shortcut(&chord));
}

#[test]
fn validate_input_enforces_global_cap() {
    let mut config = SecurityConfig::default();
    config.max_input_length = 10;
    let h = harness(config);

    let result = h
        .facade
        .validate_input("abcdefghijklmnop", &ValidationRules::new().max_length(100));
    assert!(!result.is_valid);
}

#[tokio::test]
async fn default_facade_persists_events_across_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = SecurityConfig::default().with_data_dir(dir.path());

    {
        let facade = SecurityFacade::with_defaults(config.clone()).unwrap();
        facade.sign_in(EMAIL, PASSWORD).await.unwrap();
        facade.shutdown();
    }

    let facade = SecurityFacade::with_defaults(config).unwrap();
    // Session storage does not outlive the process
    assert!(!facade.is_authenticated());
    assert!(event_types(&facade).contains(&"login_success".to_string()));
}

#[tokio::test]
async fn durable_storage_failure_leaves_user_logged_out() {
    let backends = StorageBackends::new(
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryStore::with_quota(10)),
    );
    let h = harness_with(SecurityConfig::default(), backends);

    let err = h.facade.sign_in(EMAIL, PASSWORD).await.unwrap_err();
    assert!(matches!(err, SessionError::Auth(_)));
    assert!(!h.facade.is_authenticated());
    assert!(!h.facade.is_refresh_running());
    assert_eq!(*h.facade.session_status().borrow(), SessionStatus::LoggedOut);
}

#[tokio::test]
async fn csrf_storage_failure_rolls_back_session() {
    // Room for the session and user records, not for the CSRF state
    let backends = StorageBackends::new(
        Arc::new(MemoryStore::with_quota(300)),
        Arc::new(MemoryStore::new()),
    );
    let h = harness_with(SecurityConfig::default(), backends);

    let err = h.facade.sign_in(EMAIL, PASSWORD).await.unwrap_err();
    assert!(matches!(err, SessionError::Security(_)));
    assert!(!h.facade.is_authenticated());
    assert!(h.facade.get_current_user().is_none());
    assert!(!h.facade.is_refresh_running());
    assert!(h
        .backends
        .store(StorageScope::Durable)
        .get(REFRESH_TOKEN_KEY)
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn refresh_session_resumes_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = SecurityConfig::default().with_data_dir(dir.path());

    {
        let facade = SecurityFacade::with_defaults(config.clone()).unwrap();
        facade.sign_in(EMAIL, PASSWORD).await.unwrap();
        facade.shutdown();
    }

    let facade = SecurityFacade::with_defaults(config).unwrap();
    assert!(!facade.is_authenticated());
    assert!(facade.refresh_session().await);
    assert!(facade.is_authenticated());
    assert_eq!(*facade.session_status().borrow(), SessionStatus::LoggedIn);
    assert!(facade.is_refresh_running());
}
