use thiserror::Error;

/// Unified error type for all Spotify-related operations.
///
/// Errors stay inside the crate: the session and the poller convert them
/// into state transitions, default snapshots or command outcomes.
#[derive(Debug, Error)]
pub enum SpotifyError {
    /// Authentication failed during the authorization flow.
    #[error("Spotify authentication failed: {reason}")]
    AuthFailed { reason: String },

    /// The authorization code belongs to a different PKCE verifier, typically a
    /// stale callback page from an earlier attempt being reloaded.
    #[error("Stale authorization verifier: {reason}")]
    StaleVerifier { reason: String },

    /// The token endpoint answered with an error object.
    #[error("Spotify token endpoint rejected the request: {error}{}", description_suffix(.description.as_deref()))]
    TokenRejected {
        error: String,
        description: Option<String>,
    },

    /// A token response carried no usable expiry.
    #[error("Spotify token response has no usable expiry")]
    MissingExpiry,

    /// Spotify returned an unexpected HTTP status.
    #[error("Spotify API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Transport-level failure talking to Spotify.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Failed to parse or serialize JSON data.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to bind the callback server or perform other I/O.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpotifyError {
    /// Whether this failure is the stale-verifier artifact of the redirect
    /// flow, which is recovered by restarting the authorization context.
    #[must_use]
    pub fn is_stale_verifier(&self) -> bool {
        match self {
            Self::StaleVerifier { .. } => true,
            Self::TokenRejected { error, description } => {
                error == "invalid_grant"
                    && description
                        .as_deref()
                        .is_some_and(|d| d.to_ascii_lowercase().contains("code_verifier"))
            }
            _ => false,
        }
    }
}

fn description_suffix(description: Option<&str>) -> String {
    description.map(|d| format!(" ({d})")).unwrap_or_default()
}

/// Convenience type alias for Results with `SpotifyError`.
pub type Result<T> = std::result::Result<T, SpotifyError>;
