//! Session lifecycle and the poll loop.
//!
//! The host owns the cadence: a fixed interval ticker calls
//! [`PlaybackSource::fetch_snapshot`] one tick at a time. A stale-verifier
//! failure ends the session and a fresh one is built after the requested
//! delay.

use crate::commands::{self, Command, HELP};
use crate::display::{DisplayEvent, StatusDisplay};
use crate::error::AppError;
use nowplaying_core::{format_clock, CommandOutcome, DurationExt, PlaybackSource};
use nowplaying_spotify::{
    AuthSession, Authorizer, BrowserAuthorizer, BuildOutcome, FatalRecovery, PlaybackPoller,
    PlayerApi, SessionState, SpotifyProviderConfig, WebPlayerApi,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    Shutdown,
    Restart(FatalRecovery),
    Failed,
}

/// Build sessions and poll them until shutdown or an unrecoverable failure.
///
/// # Errors
///
/// Returns an error if the HTTP clients cannot be created or authorization
/// fails for a reason other than a stale verifier.
pub async fn run(
    spotify: SpotifyProviderConfig,
    poll_interval: Duration,
    mut commands: mpsc::Receiver<Command>,
    cancel: CancellationToken,
) -> Result<(), AppError> {
    let authorizer: Arc<dyn Authorizer> = Arc::new(BrowserAuthorizer::new(&spotify)?);
    let player: Arc<dyn PlayerApi> = Arc::new(WebPlayerApi::new(spotify.request_timeout())?);

    let controls_enabled = spotify.can_control_playback();
    if !controls_enabled {
        info!("user-modify-playback-state not requested, transport commands will be refused");
    }

    loop {
        let session = AuthSession::new(Arc::clone(&authorizer), spotify.refresh_margin());
        let end = run_session(
            &session,
            Arc::clone(&player),
            poll_interval,
            controls_enabled,
            &mut commands,
            &cancel,
        )
        .await;
        session.shutdown().await;

        match end {
            SessionEnd::Shutdown => return Ok(()),
            SessionEnd::Failed => return Err(AppError::AuthorizationFailed),
            SessionEnd::Restart(recovery) => {
                warn!(
                    "Restarting authorization in {}ms: {}",
                    recovery.delay.as_millis_u64(),
                    recovery.reason
                );
                tokio::select! {
                    () = cancel.cancelled() => return Ok(()),
                    () = tokio::time::sleep(recovery.delay) => {}
                }
            }
        }
    }
}

async fn run_session(
    session: &Arc<AuthSession>,
    player: Arc<dyn PlayerApi>,
    poll_interval: Duration,
    controls_enabled: bool,
    commands: &mut mpsc::Receiver<Command>,
    cancel: &CancellationToken,
) -> SessionEnd {
    let outcome = tokio::select! {
        () = cancel.cancelled() => return SessionEnd::Shutdown,
        outcome = session.build() => outcome,
    };

    match outcome {
        BuildOutcome::Live => {}
        BuildOutcome::Recover(recovery) => return SessionEnd::Restart(recovery),
        BuildOutcome::Failed | BuildOutcome::InFlight | BuildOutcome::Superseded => {
            return SessionEnd::Failed
        }
    }

    let poller = PlaybackPoller::new(Arc::clone(session), player);
    info!(
        "Polling {} every {}ms. {HELP}",
        poller.name(),
        poll_interval.as_millis_u64()
    );
    let driver = Driver {
        source: &poller,
        poll_interval,
        controls_enabled,
    };
    driver.run(session.subscribe(), commands, cancel).await
}

struct Driver<'a> {
    source: &'a dyn PlaybackSource,
    poll_interval: Duration,
    /// Whether transport commands are forwarded to the source.
    controls_enabled: bool,
}

impl Driver<'_> {
    async fn run(
        &self,
        mut states: watch::Receiver<SessionState>,
        commands: &mut mpsc::Receiver<Command>,
        cancel: &CancellationToken,
    ) -> SessionEnd {
        let source = self.source;
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut status = StatusDisplay::default();

        loop {
            tokio::select! {
                () = cancel.cancelled() => return SessionEnd::Shutdown,
                _ = ticker.tick() => {
                    if let Some(event) = status.update(source.fetch_snapshot().await) {
                        log_event(event, &status);
                    }
                    let line = status.status_line();
                    debug!("{line}");
                }
                Some(command) = commands.recv() => {
                    if self.controls_enabled || !command.is_transport() {
                        handle_command(source, command, &status).await;
                    } else {
                        warn!("{:?} refused, user-modify-playback-state was not granted", command);
                    }
                }
                changed = states.changed() => {
                    if changed.is_err() {
                        return SessionEnd::Failed;
                    }
                    let state = states.borrow_and_update().clone();
                    match state {
                        SessionState::Failed(Some(recovery)) => return SessionEnd::Restart(recovery),
                        SessionState::Failed(None) => return SessionEnd::Failed,
                        other => debug!("Session state: {:?}", other),
                    }
                }
            }
        }
    }
}

async fn handle_command(source: &dyn PlaybackSource, command: Command, status: &StatusDisplay) {
    match commands::execute(source, command).await {
        Some(CommandOutcome::Sent) => debug!("{:?} sent", command),
        Some(CommandOutcome::NoSession) => warn!("{:?} ignored, no live Spotify session", command),
        Some(CommandOutcome::Failed) => warn!("{:?} failed", command),
        None if command == Command::Status => {
            let line = status.status_line();
            info!("{line}");
        }
        None => info!("{HELP}"),
    }
}

fn log_event(event: DisplayEvent, status: &StatusDisplay) {
    let position = format_clock(status.current().track_position_ms);
    match event {
        DisplayEvent::Started | DisplayEvent::TrackChanged => {
            let line = status.status_line();
            info!("Now playing: {line}");
        }
        DisplayEvent::Paused => info!("Playback paused at {position}"),
        DisplayEvent::Resumed => info!("Playback resumed at {position}"),
        DisplayEvent::Stopped => info!("Playback stopped"),
    }
}
