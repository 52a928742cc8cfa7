pub mod api;
pub mod authorizer;
pub mod config;
pub mod credential;
pub mod error;
pub mod pkce;
pub mod poller;
pub mod projector;
pub mod scheduler;
pub mod session;

#[cfg(test)]
mod testing;

pub use api::{PlayerApi, PlayerCommand, WebPlayerApi};
pub use authorizer::{Authorizer, BrowserAuthorizer};
pub use config::{SpotifyProviderConfig, CONFIG_TEMPLATE as SPOTIFY_CONFIG_TEMPLATE};
pub use credential::{Credential, CredentialStore, TokenResponse};
pub use error::SpotifyError;
pub use poller::PlaybackPoller;
pub use projector::project;
pub use scheduler::{compute_delay, RefreshScheduler, DEFAULT_SAFETY_MARGIN};
pub use session::{
    AuthSession, BuildOutcome, FatalRecovery, RefreshOutcome, SessionState,
    STALE_VERIFIER_RELOAD_DELAY,
};
