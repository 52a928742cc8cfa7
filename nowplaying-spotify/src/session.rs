//! The authenticated Spotify session and its renewal loop.
//!
//! [`AuthSession`] is the only writer of the credential. It runs the
//! authorization handshake through an [`Authorizer`], keeps the access token
//! fresh with a [`RefreshScheduler`] and publishes its lifecycle on a
//! `watch` channel.
//!
//! State transitions only happen while `inner` is locked. The lock is never
//! held across a call to the authorizer.

use crate::authorizer::Authorizer;
use crate::credential::{Credential, CredentialStore, TokenResponse};
use crate::error::Result;
use crate::scheduler::{compute_delay, RefreshScheduler, RenewalRequest};
use nowplaying_core::now_epoch_ms;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const LOG_TARGET: &str = "nowplaying::spotify::session";

/// How long the host should wait before restarting after a stale verifier.
pub const STALE_VERIFIER_RELOAD_DELAY: Duration = Duration::from_millis(500);

/// Signal for the host: this session is unusable, start a fresh one after
/// `delay`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FatalRecovery {
    pub delay: Duration,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticating,
    Live,
    Refreshing,
    /// Handshake failed. `Some` asks the host to restart; terminal.
    Failed(Option<FatalRecovery>),
}

impl SessionState {
    #[must_use]
    pub const fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }
}

/// What a call to [`AuthSession::build`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// The session is live, either from this call or an earlier one.
    Live,
    /// Another build or a refresh is running; nothing was done.
    InFlight,
    /// The handshake failed and was logged. Not retried.
    Failed,
    /// The handshake hit a stale verifier; the host must restart.
    Recover(FatalRecovery),
    /// The session was torn down while the handshake was running.
    Superseded,
}

/// What a call to [`AuthSession::refresh`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed,
    /// Not live, or a refresh is already running.
    Skipped,
    /// The request belonged to a session generation that was torn down.
    Stale,
    /// The refresh failed and the session was rebuilt.
    Rebuilt(BuildOutcome),
}

struct SessionInner {
    store: CredentialStore,
    scheduler: RefreshScheduler,
    /// Bumped on every teardown; timers and in-flight calls from an older
    /// generation are discarded.
    generation: u64,
}

pub struct AuthSession {
    authorizer: Arc<dyn Authorizer>,
    safety_margin: Duration,
    inner: Mutex<SessionInner>,
    state: watch::Sender<SessionState>,
    shutdown: CancellationToken,
}

impl AuthSession {
    /// Create an unauthenticated session and start its renewal task.
    ///
    /// Construct one per process and share the `Arc`. Must be called from
    /// within a Tokio runtime.
    pub fn new(authorizer: Arc<dyn Authorizer>, safety_margin: Duration) -> Arc<Self> {
        let (renewal_tx, renewal_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(SessionState::Unauthenticated);

        let session = Arc::new(Self {
            authorizer,
            safety_margin,
            inner: Mutex::new(SessionInner {
                store: CredentialStore::new(),
                scheduler: RefreshScheduler::new(renewal_tx),
                generation: 0,
            }),
            state,
            shutdown: CancellationToken::new(),
        });

        tokio::spawn(Self::run_renewals(
            Arc::downgrade(&session),
            renewal_rx,
            session.shutdown.clone(),
        ));

        session
    }

    async fn run_renewals(
        session: Weak<Self>,
        mut rx: mpsc::UnboundedReceiver<RenewalRequest>,
        shutdown: CancellationToken,
    ) {
        loop {
            let request = tokio::select! {
                () = shutdown.cancelled() => break,
                request = rx.recv() => match request {
                    Some(request) => request,
                    None => break,
                },
            };

            let Some(session) = session.upgrade() else {
                break;
            };
            let outcome = session.refresh_generation(Some(request.generation)).await;
            debug!(target: LOG_TARGET, "Scheduled renewal finished: {:?}", outcome);
        }

        debug!(target: LOG_TARGET, "Renewal task stopped");
    }

    /// Run the authorization handshake and go live.
    ///
    /// A no-op while a build or refresh is running, or when already live.
    pub async fn build(&self) -> BuildOutcome {
        let generation = {
            let inner = self.inner.lock().await;
            match self.state() {
                SessionState::Authenticating | SessionState::Refreshing => {
                    return BuildOutcome::InFlight
                }
                SessionState::Live => return BuildOutcome::Live,
                SessionState::Failed(Some(recovery)) => return BuildOutcome::Recover(recovery),
                SessionState::Unauthenticated | SessionState::Failed(None) => {}
            }
            self.state.send_replace(SessionState::Authenticating);
            inner.generation
        };

        info!(target: LOG_TARGET, "Starting Spotify authorization");
        let result = self.authorizer.authorize().await;
        let now = now_epoch_ms();

        let mut inner = self.inner.lock().await;
        if inner.generation != generation {
            debug!(target: LOG_TARGET, "Discarding handshake result from a torn-down session");
            return BuildOutcome::Superseded;
        }

        match self.accept(result, None, now) {
            Ok((credential, delay)) => {
                inner.store.replace(credential);
                inner.scheduler.arm(delay, generation);
                self.state.send_replace(SessionState::Live);
                info!(
                    target: LOG_TARGET,
                    "Spotify session is live, renewing in {}s",
                    delay.as_secs()
                );
                BuildOutcome::Live
            }
            Err(e) if e.is_stale_verifier() => {
                warn!(
                    target: LOG_TARGET,
                    "Authorization used a stale verifier, restart required: {}", e
                );
                let recovery = FatalRecovery {
                    delay: STALE_VERIFIER_RELOAD_DELAY,
                    reason: e.to_string(),
                };
                self.state
                    .send_replace(SessionState::Failed(Some(recovery.clone())));
                BuildOutcome::Recover(recovery)
            }
            Err(e) => {
                error!(target: LOG_TARGET, "Spotify authorization failed: {}", e);
                self.state.send_replace(SessionState::Failed(None));
                BuildOutcome::Failed
            }
        }
    }

    /// Exchange the refresh token for a new credential.
    ///
    /// Any failure rebuilds the session instead of retrying the refresh.
    pub async fn refresh(&self) -> RefreshOutcome {
        self.refresh_generation(None).await
    }

    async fn refresh_generation(&self, expected: Option<u64>) -> RefreshOutcome {
        let (generation, refresh_token) = {
            let inner = self.inner.lock().await;
            if expected.is_some_and(|g| g != inner.generation) {
                debug!(target: LOG_TARGET, "Ignoring renewal from generation {:?}", expected);
                return RefreshOutcome::Stale;
            }
            if !self.state().is_live() {
                return RefreshOutcome::Skipped;
            }
            let Some(credential) = inner.store.current() else {
                return RefreshOutcome::Skipped;
            };
            self.state.send_replace(SessionState::Refreshing);
            (inner.generation, credential.refresh_token.clone())
        };

        debug!(target: LOG_TARGET, "Refreshing Spotify access token");
        let result = self.authorizer.refresh(&refresh_token).await;
        let now = now_epoch_ms();

        let failure = {
            let mut inner = self.inner.lock().await;
            if inner.generation != generation {
                return RefreshOutcome::Stale;
            }

            match self.accept(result, Some(&refresh_token), now) {
                Ok((credential, delay)) => {
                    inner.store.replace(credential);
                    inner.scheduler.arm(delay, generation);
                    self.state.send_replace(SessionState::Live);
                    info!(
                        target: LOG_TARGET,
                        "Access token refreshed, next renewal in {}s",
                        delay.as_secs()
                    );
                    return RefreshOutcome::Refreshed;
                }
                Err(e) => {
                    // Still Refreshing, so only this call may tear down
                    self.teardown_locked(&mut inner);
                    e
                }
            }
        };

        warn!(target: LOG_TARGET, "Token refresh failed, rebuilding session: {}", failure);
        RefreshOutcome::Rebuilt(self.build().await)
    }

    /// Validate a token endpoint result and compute when to renew it.
    fn accept(
        &self,
        result: Result<TokenResponse>,
        previous_refresh_token: Option<&str>,
        now: i64,
    ) -> Result<(Credential, Duration)> {
        let credential = Credential::from_token_response(result?, previous_refresh_token, now)?;
        let delay = compute_delay(&credential, now, self.safety_margin)?;
        Ok((credential, delay))
    }

    /// Tear down and run the handshake again.
    ///
    /// A no-op while a handshake or refresh is running.
    pub async fn rebuild(&self) -> BuildOutcome {
        {
            let mut inner = self.inner.lock().await;
            if matches!(
                self.state(),
                SessionState::Authenticating | SessionState::Refreshing
            ) {
                return BuildOutcome::InFlight;
            }
            self.teardown_locked(&mut inner);
        }
        self.build().await
    }

    /// Cancel the renewal timer and forget the credential.
    pub async fn teardown(&self) {
        let mut inner = self.inner.lock().await;
        self.teardown_locked(&mut inner);
    }

    fn teardown_locked(&self, inner: &mut SessionInner) {
        inner.scheduler.cancel();
        inner.store.clear();
        inner.generation = inner.generation.wrapping_add(1);

        if !matches!(self.state(), SessionState::Failed(Some(_))) {
            self.state.send_replace(SessionState::Unauthenticated);
        }
        debug!(target: LOG_TARGET, "Session torn down (generation {})", inner.generation);
    }

    /// The live access token, waiting out a refresh that is in flight.
    ///
    /// Returns `None` when no session is live.
    pub async fn access_token(&self) -> Option<String> {
        loop {
            {
                let mut rx = self.state.subscribe();
                if rx
                    .wait_for(|s| !matches!(s, SessionState::Refreshing))
                    .await
                    .is_err()
                {
                    return None;
                }
            }

            let inner = self.inner.lock().await;
            match self.state() {
                SessionState::Live => return inner.store.access_token().map(str::to_owned),
                // Another refresh started between the wait and the lock
                SessionState::Refreshing => {}
                _ => return None,
            }
        }
    }

    /// The access token only if the session is live right now.
    pub async fn live_access_token(&self) -> Option<String> {
        let inner = self.inner.lock().await;
        if self.state().is_live() {
            inner.store.access_token().map(str::to_owned)
        } else {
            None
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub async fn credential(&self) -> Option<Arc<Credential>> {
        self.inner.lock().await.store.current()
    }

    /// Whether a renewal timer is pending.
    pub async fn renewal_armed(&self) -> bool {
        self.inner.lock().await.scheduler.is_armed()
    }

    /// Stop the renewal task and tear the session down.
    ///
    /// A refresh or handshake still running when this is called finds a newer
    /// generation and drops its result.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.teardown().await;
        info!(target: LOG_TARGET, "Spotify session shut down");
    }
}

impl Drop for AuthSession {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
