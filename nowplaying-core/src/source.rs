//! Playback source trait implemented by streaming-service integrations.

use crate::track::CurrentTrack;
use async_trait::async_trait;

/// Result of a best-effort transport command.
///
/// Commands never fail past their boundary; this value only tells the caller
/// (and tests) what happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The command was delivered to the remote.
    Sent,
    /// There was no live session, nothing was sent.
    NoSession,
    /// The remote call failed. The failure has already been logged.
    Failed,
}

/// A remote player the display can read from and send commands to.
///
/// Implementations should:
///
/// - Return [`CurrentTrack::NONE`] instead of an error when nothing can be shown
/// - Never block a snapshot waiting for authentication
/// - Swallow transport errors on commands and report them via [`CommandOutcome`]
///
/// The polling cadence belongs to the caller. Implementations must not start
/// their own poll loop.
#[async_trait]
pub trait PlaybackSource: Send + Sync {
    /// Returns a human-readable name for this source.
    fn name(&self) -> &'static str;

    /// Produce one snapshot of the current playback state.
    async fn fetch_snapshot(&self) -> CurrentTrack;

    /// Resume playback.
    async fn play(&self) -> CommandOutcome;

    /// Pause playback.
    async fn pause(&self) -> CommandOutcome;

    /// Pause if the remote reports playing, resume otherwise.
    async fn toggle_play(&self) -> CommandOutcome;

    /// Skip to the next track.
    async fn skip(&self) -> CommandOutcome;

    /// Go back to the previous track.
    async fn rewind(&self) -> CommandOutcome;

    /// Set the volume, clamped to `0..=100`.
    async fn set_volume(&self, percent: i32) -> CommandOutcome;
}
