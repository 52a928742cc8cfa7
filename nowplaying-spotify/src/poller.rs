//! Spotify implementation of [`PlaybackSource`].

use crate::api::{PlayerApi, PlayerCommand};
use crate::projector::project;
use crate::session::AuthSession;
use async_trait::async_trait;
use nowplaying_core::{CommandOutcome, CurrentTrack, PlaybackSource};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

const LOG_TARGET: &str = "nowplaying::spotify::poller";

/// Reads playback state and forwards transport commands through a shared
/// [`AuthSession`].
///
/// Holds no timer of its own: the host decides how often to call
/// [`PlaybackSource::fetch_snapshot`].
pub struct PlaybackPoller {
    session: Arc<AuthSession>,
    player: Arc<dyn PlayerApi>,
}

impl PlaybackPoller {
    pub fn new(session: Arc<AuthSession>, player: Arc<dyn PlayerApi>) -> Self {
        Self { session, player }
    }

    #[must_use]
    pub fn session(&self) -> &Arc<AuthSession> {
        &self.session
    }

    async fn command(&self, command: PlayerCommand) -> CommandOutcome {
        let Some(token) = self.session.access_token().await else {
            debug!(target: LOG_TARGET, "Dropping {:?}, no live session", command);
            return CommandOutcome::NoSession;
        };

        match self.player.send(&token, command).await {
            Ok(()) => CommandOutcome::Sent,
            Err(e) => {
                warn!(target: LOG_TARGET, "Player command {:?} failed: {}", command, e);
                CommandOutcome::Failed
            }
        }
    }
}

/// Clamp a requested volume to the range the API accepts.
fn clamp_volume(percent: i32) -> u8 {
    u8::try_from(percent.clamp(0, 100)).unwrap_or(100)
}

#[async_trait]
impl PlaybackSource for PlaybackPoller {
    fn name(&self) -> &'static str {
        "spotify"
    }

    async fn fetch_snapshot(&self) -> CurrentTrack {
        // Never wait on a handshake or refresh from the poll tick
        let Some(token) = self.session.live_access_token().await else {
            return CurrentTrack::NONE;
        };

        let request_start = Instant::now();
        match self.player.current_playback(&token).await {
            Ok(playback) => {
                let track = project(playback.as_ref());
                debug!(
                    target: LOG_TARGET,
                    "Polled Spotify in {:?}: playing={}, track={:?}",
                    request_start.elapsed(),
                    track.is_playing,
                    track.track_name
                );
                track
            }
            Err(e) => {
                warn!(target: LOG_TARGET, "Failed to fetch playback state: {}", e);
                CurrentTrack::NONE
            }
        }
    }

    async fn play(&self) -> CommandOutcome {
        self.command(PlayerCommand::Play).await
    }

    async fn pause(&self) -> CommandOutcome {
        self.command(PlayerCommand::Pause).await
    }

    async fn toggle_play(&self) -> CommandOutcome {
        let Some(token) = self.session.access_token().await else {
            return CommandOutcome::NoSession;
        };

        let is_playing = match self.player.current_playback(&token).await {
            Ok(playback) => playback.is_some_and(|p| p.is_playing),
            Err(e) => {
                warn!(target: LOG_TARGET, "Could not read play state for toggle: {}", e);
                return CommandOutcome::Failed;
            }
        };

        if is_playing {
            self.command(PlayerCommand::Pause).await
        } else {
            self.command(PlayerCommand::Play).await
        }
    }

    async fn skip(&self) -> CommandOutcome {
        self.command(PlayerCommand::Next).await
    }

    async fn rewind(&self) -> CommandOutcome {
        self.command(PlayerCommand::Previous).await
    }

    async fn set_volume(&self, percent: i32) -> CommandOutcome {
        self.command(PlayerCommand::Volume(clamp_volume(percent)))
            .await
    }
}
