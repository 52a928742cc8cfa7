use nowplaying_spotify::SpotifyError;
use thiserror::Error;

/// Reasons the binary stops with a failure exit code.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Spotify(#[from] SpotifyError),

    #[error("Spotify authorization failed")]
    AuthorizationFailed,

    #[error("Failed to create tokio runtime: {0}")]
    Runtime(#[source] std::io::Error),
}
