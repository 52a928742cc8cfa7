//! Authorization-code (PKCE) handshake and token endpoint access.

use crate::config::SpotifyProviderConfig;
use crate::credential::TokenResponse;
use crate::error::{Result, SpotifyError};
use crate::pkce::{self, PkcePair};
use async_trait::async_trait;
use axum::{extract::Query, response::Html, routing::get, Router};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info, warn};
use url::Url;

pub const AUTHORIZE_URL: &str = "https://accounts.spotify.com/authorize";
pub const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// How long the handshake waits for the browser to come back.
const OAUTH_CALLBACK_TIMEOUT: Duration = Duration::from_secs(600);

/// The remote side of the session's credential lifecycle.
///
/// Both methods return the raw token endpoint body. Error objects come back
/// as `Ok` so the session can decide how to treat them; `Err` is reserved for
/// transport failures and for handshakes that never produced a code.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Run the interactive handshake and exchange the code for tokens.
    async fn authorize(&self) -> Result<TokenResponse>;

    /// Exchange a refresh token for a fresh token response.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse>;
}

type CallbackSender = Arc<Mutex<Option<oneshot::Sender<CallbackParams>>>>;

/// Opens the user's browser, catches the redirect on a local axum server and
/// talks to the Spotify accounts service.
pub struct BrowserAuthorizer {
    client_id: String,
    redirect_uri: String,
    scopes: Vec<String>,
    authorize_url: String,
    token_url: String,
    http: reqwest::Client,
}

impl BrowserAuthorizer {
    /// Create an authorizer for the configured client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &SpotifyProviderConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client_id: config.client_id.clone(),
            redirect_uri: config.oauth_redirect_uri.clone(),
            scopes: config.scopes.clone(),
            authorize_url: AUTHORIZE_URL.into(),
            token_url: TOKEN_URL.into(),
            http,
        })
    }

    /// Point the authorizer at different accounts endpoints.
    #[must_use]
    pub fn with_endpoints(
        mut self,
        authorize_url: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        self.authorize_url = authorize_url.into();
        self.token_url = token_url.into();
        self
    }

    #[must_use]
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Build the URL the user visits to grant access.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured authorize endpoint is not a URL.
    pub fn authorize_url(&self, pkce: &PkcePair, state: &str) -> Result<Url> {
        let mut url = Url::parse(&self.authorize_url).map_err(|e| SpotifyError::AuthFailed {
            reason: format!("Invalid authorize URL: {e}"),
        })?;

        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("code_challenge_method", "S256")
            .append_pair("code_challenge", &pkce.challenge)
            .append_pair("state", state)
            .append_pair("scope", &self.scopes.join(" "));

        Ok(url)
    }

    async fn exchange_code(&self, code: &str, verifier: &str) -> Result<TokenResponse> {
        self.post_token_form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", &self.redirect_uri),
            ("client_id", &self.client_id),
            ("code_verifier", verifier),
        ])
        .await
    }

    /// POST a form to the token endpoint and decode whatever object comes back.
    async fn post_token_form(&self, form: &[(&str, &str)]) -> Result<TokenResponse> {
        let response = self.http.post(&self.token_url).form(form).send().await?;
        let status = response.status();
        let body = response.text().await?;

        match serde_json::from_str::<TokenResponse>(&body) {
            Ok(token) => {
                if !status.is_success() {
                    debug!("Token endpoint answered HTTP {}", status);
                }
                Ok(token)
            }
            Err(_) if !status.is_success() => Err(SpotifyError::Status {
                status: status.as_u16(),
                body,
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Loopback address and path the redirect URI points at.
    fn callback_target(&self) -> Result<(SocketAddr, String)> {
        let redirect = Url::parse(&self.redirect_uri).map_err(|e| SpotifyError::AuthFailed {
            reason: format!("redirect_uri {} is not a URL: {e}", self.redirect_uri),
        })?;

        let host = match redirect.host_str() {
            None | Some("localhost") => "127.0.0.1",
            Some(host) => host,
        };
        let port = redirect.port().unwrap_or(8888);
        let addr = format!("{host}:{port}")
            .parse::<SocketAddr>()
            .map_err(|e| SpotifyError::AuthFailed {
                reason: format!("redirect_uri host {host} is not a loopback address: {e}"),
            })?;

        Ok((addr, redirect.path().to_owned()))
    }

    fn build_callback_router(callback_path: &str, tx: CallbackSender) -> Router {
        Router::new().route(
            callback_path,
            get(move |Query(params): Query<CallbackParams>| {
                let tx = tx.clone();
                async move { Self::handle_callback_request(params, tx).await }
            }),
        )
    }

    /// Forward the first callback carrying a code or an error to the waiting
    /// handshake. Later hits only get a page back.
    async fn handle_callback_request(params: CallbackParams, tx: CallbackSender) -> Html<String> {
        if params.code.is_none() && params.error.is_none() {
            return Html(callback_page(
                "Authorization Failed",
                "No authorization code received.",
            ));
        }

        let page = params.error.as_ref().map_or_else(
            || callback_page("Authorization Successful", "You can close this window."),
            |error| callback_page("Authorization Failed", &format!("Error: {error}")),
        );

        match tx.lock().await.take() {
            Some(sender) => {
                let _ = sender.send(params);
            }
            None => debug!("Ignoring repeated OAuth callback"),
        }

        Html(page)
    }

    async fn bind_callback(addr: SocketAddr) -> Result<TcpListener> {
        TcpListener::bind(addr)
            .await
            .map_err(|e| SpotifyError::AuthFailed {
                reason: format!("cannot listen for the redirect on {addr}: {e}"),
            })
    }

    fn prompt_authorization(auth_url: &Url, addr: SocketAddr, callback_path: &str) {
        info!("Spotify login required, opening the browser");

        if let Err(e) = open::that(auth_url.as_str()) {
            warn!("Browser did not open ({e}), visit this URL instead:\n{auth_url}");
        }

        debug!("Expecting the redirect at http://{addr}{callback_path}");
    }

    async fn wait_for_callback(
        rx: oneshot::Receiver<CallbackParams>,
        listener: TcpListener,
        app: Router,
    ) -> Result<CallbackParams> {
        let reason = tokio::select! {
            params = rx => match params {
                Ok(params) => return Ok(params),
                Err(_) => "redirect handler went away".to_owned(),
            },
            _ = axum::serve(listener, app) => "redirect listener exited".to_owned(),
            () = tokio::time::sleep(OAUTH_CALLBACK_TIMEOUT) => format!(
                "no redirect within {}s",
                OAUTH_CALLBACK_TIMEOUT.as_secs()
            ),
        };
        Err(SpotifyError::AuthFailed { reason })
    }
}

#[async_trait]
impl Authorizer for BrowserAuthorizer {
    async fn authorize(&self) -> Result<TokenResponse> {
        let (addr, callback_path) = self.callback_target()?;
        let listener = Self::bind_callback(addr).await?;

        let (tx, rx) = oneshot::channel::<CallbackParams>();
        let app = Self::build_callback_router(&callback_path, Arc::new(Mutex::new(Some(tx))));

        let pkce = PkcePair::generate();
        let state = pkce::generate_state();
        let auth_url = self.authorize_url(&pkce, &state)?;
        Self::prompt_authorization(&auth_url, addr, &callback_path);

        // The callback server is dropped here, releasing the port for a rebuild
        let code = Self::wait_for_callback(rx, listener, app)
            .await?
            .into_code(&state)?;

        debug!("Redirect accepted, redeeming the authorization code");
        self.exchange_code(&code, &pkce.verifier).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse> {
        self.post_token_form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", &self.client_id),
        ])
        .await
    }
}

/// What Spotify appends to the redirect URI.
#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

impl CallbackParams {
    /// Validate the callback against the attempt that is waiting for it.
    ///
    /// A `state` from another attempt means the code was issued for a
    /// different verifier and can never be exchanged.
    fn into_code(self, expected_state: &str) -> Result<String> {
        if let Some(error) = self.error {
            return Err(SpotifyError::AuthFailed {
                reason: format!("Authorization denied: {error}"),
            });
        }

        if self.state.as_deref() != Some(expected_state) {
            return Err(SpotifyError::StaleVerifier {
                reason: "callback state does not belong to this authorization attempt".into(),
            });
        }

        self.code.ok_or_else(|| SpotifyError::AuthFailed {
            reason: "No authorization code received".into(),
        })
    }
}

fn callback_page(title: &str, message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>{title}</title></head>
<body style="font-family: sans-serif; text-align: center; padding: 50px;">
    <h1>{title}</h1>
    <p>{message}</p>
</body>
</html>"#
    )
}
