//! Spotify provider configuration.

use const_format::concatcp;
use nowplaying_core::{CoreError, ProvidersConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Provider name used in config file
pub const PROVIDER_NAME: &str = "spotify";

/// Default OAuth redirect URI, must match the app registered on the dashboard
pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8888/callback";

pub const SCOPE_READ_CURRENTLY_PLAYING: &str = "user-read-currently-playing";
pub const SCOPE_READ_PLAYBACK_STATE: &str = "user-read-playback-state";
pub const SCOPE_MODIFY_PLAYBACK_STATE: &str = "user-modify-playback-state";

/// Spotify-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyProviderConfig {
    /// Spotify OAuth client ID (PKCE flow, no secret needed)
    pub client_id: String,
    /// OAuth redirect URI
    #[serde(default = "default_redirect_uri")]
    pub oauth_redirect_uri: String,
    /// Requested permission scopes
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    /// How long before expiry the access token is renewed, in seconds
    #[serde(default = "default_refresh_margin")]
    pub refresh_margin_secs: u64,
    /// Upper bound for every request to Spotify, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_redirect_uri() -> String {
    DEFAULT_REDIRECT_URI.into()
}

fn default_scopes() -> Vec<String> {
    vec![
        SCOPE_READ_CURRENTLY_PLAYING.into(),
        SCOPE_READ_PLAYBACK_STATE.into(),
        SCOPE_MODIFY_PLAYBACK_STATE.into(),
    ]
}

const fn default_refresh_margin() -> u64 {
    10
}

const fn default_request_timeout() -> u64 {
    10
}

impl SpotifyProviderConfig {
    /// Minimal config with defaults for everything but the client id.
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            oauth_redirect_uri: default_redirect_uri(),
            scopes: default_scopes(),
            refresh_margin_secs: default_refresh_margin(),
            request_timeout_secs: default_request_timeout(),
        }
    }

    /// Extract Spotify config from the dynamic providers config.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be parsed.
    pub fn from_providers(providers: &ProvidersConfig) -> Result<Option<Self>, CoreError> {
        providers.get(PROVIDER_NAME)
    }

    /// Validate that required fields are present and well-formed.
    ///
    /// # Errors
    ///
    /// Returns an error if required fields are missing, empty or invalid.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.client_id.is_empty() {
            return Err(CoreError::ConfigMissingField {
                field: "providers.spotify.client_id".into(),
            });
        }
        if let Err(e) = url::Url::parse(&self.oauth_redirect_uri) {
            return Err(CoreError::ConfigInvalid {
                message: format!("providers.spotify.oauth_redirect_uri: {e}"),
            });
        }
        if self.scopes.is_empty() {
            return Err(CoreError::ConfigMissingField {
                field: "providers.spotify.scopes".into(),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "providers.spotify.request_timeout_secs must be greater than zero".into(),
            });
        }
        Ok(())
    }

    /// Safety margin subtracted from the token lifetime when scheduling renewal.
    #[must_use]
    pub const fn refresh_margin(&self) -> Duration {
        Duration::from_secs(self.refresh_margin_secs)
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Whether transport commands were granted.
    #[must_use]
    pub fn can_control_playback(&self) -> bool {
        self.scopes.iter().any(|s| s == SCOPE_MODIFY_PLAYBACK_STATE)
    }
}

/// Config template for Spotify provider.
/// This is appended to the base config template when creating a new config file.
pub const CONFIG_TEMPLATE: &str = concatcp!(
    r#"[providers.spotify]
# Required: create an app at https://developer.spotify.com/dashboard
# and register the redirect URI below
client_id = ""
oauth_redirect_uri = ""#,
    DEFAULT_REDIRECT_URI,
    r#""
# Drop "user-modify-playback-state" for a read-only display
scopes = [""#,
    SCOPE_READ_CURRENTLY_PLAYING,
    r#"", ""#,
    SCOPE_READ_PLAYBACK_STATE,
    r#"", ""#,
    SCOPE_MODIFY_PLAYBACK_STATE,
    r#""]
# Renew the access token this many seconds before it expires
refresh_margin_secs = 10
request_timeout_secs = 10
"#
);
