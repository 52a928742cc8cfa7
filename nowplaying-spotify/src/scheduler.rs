//! Renewal timing for the access credential.

use crate::credential::Credential;
use crate::error::{Result, SpotifyError};
use nowplaying_core::DurationExt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Renew this long before the credential lapses.
pub const DEFAULT_SAFETY_MARGIN: Duration = Duration::from_secs(10);

/// Time until the credential should be renewed.
///
/// Returns `expires_at - now - safety_margin`, clamped at zero so an already
/// expiring credential is renewed immediately.
///
/// # Errors
///
/// Returns [`SpotifyError::MissingExpiry`] when the credential has no expiry.
/// Callers must rebuild the session rather than arm a timer.
pub fn compute_delay(
    credential: &Credential,
    now_epoch_ms: i64,
    safety_margin: Duration,
) -> Result<Duration> {
    let expires_at = credential
        .expires_at_epoch_ms
        .ok_or(SpotifyError::MissingExpiry)?;

    let remaining_ms = expires_at
        .saturating_sub(now_epoch_ms)
        .saturating_sub(safety_margin.as_millis_i64());

    Ok(Duration::from_millis(u64::try_from(remaining_ms).unwrap_or(0)))
}

/// A fired renewal timer, tagged with the session generation that armed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenewalRequest {
    pub generation: u64,
}

/// Keeps at most one pending renewal timer.
///
/// When a timer fires it sends a [`RenewalRequest`] on the channel given at
/// construction; the session's renewal task performs the actual refresh.
pub struct RefreshScheduler {
    tx: mpsc::UnboundedSender<RenewalRequest>,
    pending: Option<JoinHandle<()>>,
}

impl RefreshScheduler {
    #[must_use]
    pub const fn new(tx: mpsc::UnboundedSender<RenewalRequest>) -> Self {
        Self { tx, pending: None }
    }

    /// Cancel any pending timer, then schedule a new one after `delay`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn arm(&mut self, delay: Duration, generation: u64) {
        self.cancel();

        debug!(
            "Arming token renewal in {}s (generation {})",
            delay.as_secs(),
            generation
        );

        let tx = self.tx.clone();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The receiver is gone only when the session has shut down
            let _ = tx.send(RenewalRequest { generation });
        }));
    }

    /// Abort the pending timer, if any.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    /// Whether a timer is still waiting to fire.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
