//! Access credential and the store the session keeps it in.

use crate::error::{Result, SpotifyError};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

/// Raw body of the token endpoint, success or error.
///
/// Every field is optional: the same shape covers the token object and the
/// `{error, error_description}` object, and deciding which one arrived is
/// left to [`Credential::from_token_response`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
    /// Lifetime in seconds
    pub expires_in: Option<i64>,
    pub refresh_token: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// An access token with its refresh token and absolute expiry.
///
/// Never mutated in place: a refresh produces a new value that replaces the
/// old one in the [`CredentialStore`].
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    /// Expiry as milliseconds since the Unix epoch. `None` only for malformed
    /// token responses, which the session refuses to store.
    pub expires_at_epoch_ms: Option<i64>,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at_epoch_ms", &self.expires_at_epoch_ms)
            .finish()
    }
}

impl Credential {
    /// Turn a token endpoint response into a credential.
    ///
    /// When the response omits a refresh token (allowed on refresh), the
    /// previous one is carried over. A missing or non-positive `expires_in`
    /// yields a credential without expiry; scheduling rejects it.
    ///
    /// # Errors
    ///
    /// Returns [`SpotifyError::TokenRejected`] for an error object, or
    /// [`SpotifyError::AuthFailed`] when a token is missing.
    pub fn from_token_response(
        response: TokenResponse,
        previous_refresh_token: Option<&str>,
        now_epoch_ms: i64,
    ) -> Result<Self> {
        if let Some(error) = response.error {
            return Err(SpotifyError::TokenRejected {
                error,
                description: response.error_description,
            });
        }

        let access_token = response
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SpotifyError::AuthFailed {
                reason: "token response has no access_token".into(),
            })?;

        let refresh_token = response
            .refresh_token
            .filter(|t| !t.is_empty())
            .or_else(|| previous_refresh_token.map(str::to_owned))
            .ok_or_else(|| SpotifyError::AuthFailed {
                reason: "token response has no refresh_token".into(),
            })?;

        let expires_at_epoch_ms = response
            .expires_in
            .filter(|secs| *secs > 0)
            .map(|secs| now_epoch_ms.saturating_add(secs.saturating_mul(1000)));

        Ok(Self {
            access_token,
            refresh_token,
            expires_at_epoch_ms,
        })
    }
}

/// Holds the one live credential. No behavior beyond storage.
#[derive(Debug, Default)]
pub struct CredentialStore {
    current: Option<Arc<Credential>>,
}

impl CredentialStore {
    #[must_use]
    pub const fn new() -> Self {
        Self { current: None }
    }

    /// Swap in a new credential, returning the shared handle to it.
    pub fn replace(&mut self, credential: Credential) -> Arc<Credential> {
        let credential = Arc::new(credential);
        self.current = Some(Arc::clone(&credential));
        credential
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    #[must_use]
    pub fn current(&self) -> Option<Arc<Credential>> {
        self.current.clone()
    }

    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.current.as_deref().map(|c| c.access_token.as_str())
    }
}
