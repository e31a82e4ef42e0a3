// ABOUTME: Background task that refreshes auth tokens on a fixed interval
// ABOUTME: Cancellable via CancellationToken; publishes LoggedOut and stops when a refresh fails

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{types::SessionStatus, vault::TokenVault};

/// Invoked after a failed refresh has cleared the vault
pub type TeardownHook = Arc<dyn Fn() + Send + Sync>;

pub struct RefreshScheduler {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl RefreshScheduler {
    /// Spawn the refresh loop. The first refresh happens one `period` after start.
    pub fn start(
        vault: Arc<TokenVault>,
        period: Duration,
        status: Arc<watch::Sender<SessionStatus>>,
        cancel: CancellationToken,
        on_failure: Option<TeardownHook>,
    ) -> Self {
        let task_cancel = cancel.clone();

        info!(period_secs = period.as_secs(), "Starting token refresh scheduler");

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            // First tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => {
                        debug!("Token refresh scheduler cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        match vault.refresh_tokens().await {
                            Ok(_) => debug!("Scheduled token refresh succeeded"),
                            Err(e) => {
                                warn!(audit = true, error = %e, "Scheduled token refresh failed, ending session");
                                if let Some(hook) = &on_failure {
                                    hook();
                                }
                                status.send_replace(SessionStatus::LoggedOut);
                                break;
                            }
                        }
                    }
                }
            }
        });

        Self {
            cancel,
            handle: Some(handle),
        }
    }

    /// Request the loop to stop without waiting for it
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Cancel and wait for the loop to exit
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "Token refresh scheduler task failed");
            }
        }
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
