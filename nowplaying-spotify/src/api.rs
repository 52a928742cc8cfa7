//! Spotify Web API player endpoints and their wire model.

use crate::error::{Result, SpotifyError};
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

pub const API_BASE_URL: &str = "https://api.spotify.com/v1";

/// A transport command understood by `/v1/me/player`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerCommand {
    Play,
    Pause,
    Next,
    Previous,
    /// Volume in percent, already clamped to `0..=100`
    Volume(u8),
}

impl PlayerCommand {
    fn method(self) -> Method {
        match self {
            Self::Play | Self::Pause | Self::Volume(_) => Method::PUT,
            Self::Next | Self::Previous => Method::POST,
        }
    }

    fn path(self) -> String {
        match self {
            Self::Play => "/me/player/play".into(),
            Self::Pause => "/me/player/pause".into(),
            Self::Next => "/me/player/next".into(),
            Self::Previous => "/me/player/previous".into(),
            Self::Volume(percent) => format!("/me/player/volume?volume_percent={percent}"),
        }
    }
}

/// Authenticated access to the player endpoints.
///
/// The access token is passed per call; implementations never hold one.
#[async_trait]
pub trait PlayerApi: Send + Sync {
    /// Fetch the current playback state. `None` when nothing is playing.
    async fn current_playback(&self, access_token: &str) -> Result<Option<PlaybackResponse>>;

    /// Send one transport command.
    async fn send(&self, access_token: &str, command: PlayerCommand) -> Result<()>;
}

/// reqwest-backed [`PlayerApi`].
pub struct WebPlayerApi {
    http: reqwest::Client,
    base_url: String,
}

impl WebPlayerApi {
    /// Create a client whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            http,
            base_url: API_BASE_URL.into(),
        })
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }
}

async fn status_error(response: reqwest::Response) -> SpotifyError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    SpotifyError::Status { status, body }
}

#[async_trait]
impl PlayerApi for WebPlayerApi {
    async fn current_playback(&self, access_token: &str) -> Result<Option<PlaybackResponse>> {
        let response = self
            .http
            .get(format!("{}/me/player", self.base_url))
            .bearer_auth(access_token)
            .send()
            .await?;

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        // An empty 200 shows up occasionally between devices
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(None);
        }

        Ok(Some(serde_json::from_str(&body)?))
    }

    async fn send(&self, access_token: &str, command: PlayerCommand) -> Result<()> {
        debug!("Sending player command {:?}", command);

        let response = self
            .http
            .request(command.method(), format!("{}{}", self.base_url, command.path()))
            .bearer_auth(access_token)
            .header(reqwest::header::CONTENT_LENGTH, "0")
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(status_error(response).await)
        }
    }
}

/// Body of `GET /v1/me/player`.
///
/// Only the fields the display uses are modelled; serde ignores the rest.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackResponse {
    #[serde(default)]
    pub is_playing: bool,
    pub progress_ms: Option<i64>,
    pub currently_playing_type: Option<String>,
    pub item: Option<PlaybackItem>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PlaybackItem {
    Track(TrackItem),
    Episode(EpisodeItem),
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackItem {
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub duration_ms: i64,
    pub album: Option<AlbumRef>,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
    #[serde(default)]
    pub external_urls: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EpisodeItem {
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub duration_ms: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlbumRef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub images: Vec<ImageRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtistRef {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageRef {
    pub url: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::{
        http::{HeaderMap, StatusCode as AxumStatus, Uri},
        routing::{any, get},
        Router,
    };
    use std::sync::Arc;
    use tokio::sync::Mutex;

    pub(crate) const TRACK_JSON: &str = r#"{
        "device": {"id": "d1", "name": "Desk", "volume_percent": 40},
        "progress_ms": 42000,
        "is_playing": true,
        "currently_playing_type": "track",
        "item": {
            "type": "track",
            "id": "4uLU6hMCjMI75M1A2tKUQC",
            "name": "Never Gonna Give You Up",
            "duration_ms": 213573,
            "album": {
                "name": "Whenever You Need Somebody",
                "images": [
                    {"url": "https://i.scdn.co/image/large", "width": 640, "height": 640},
                    {"url": "https://i.scdn.co/image/small", "width": 64, "height": 64}
                ]
            },
            "artists": [{"name": "Rick Astley"}],
            "external_urls": {"spotify": "https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC"}
        }
    }"#;

    type Seen = Arc<Mutex<Vec<(String, String, Option<String>)>>>;

    async fn spawn_player(status: AxumStatus, body: &'static str) -> (WebPlayerApi, Seen) {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&seen);

        let app = Router::new()
            .route("/v1/me/player", get(move || async move { (status, body) }))
            .route(
                "/v1/me/player/{*rest}",
                any(
                    move |method: axum::http::Method, uri: Uri, headers: HeaderMap| {
                        let recorded = Arc::clone(&recorded);
                        async move {
                            let auth = headers
                                .get("authorization")
                                .and_then(|v| v.to_str().ok())
                                .map(str::to_owned);
                            recorded
                                .lock()
                                .await
                                .push((method.to_string(), uri.to_string(), auth));
                            AxumStatus::NO_CONTENT
                        }
                    },
                ),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let api = WebPlayerApi::new(Duration::from_secs(5))
            .unwrap()
            .with_http_client(reqwest::Client::builder().no_proxy().build().unwrap())
            .with_base_url(format!("http://{addr}/v1"));
        (api, seen)
    }

    #[test]
    fn test_parse_track_playback() {
        let playback: PlaybackResponse = serde_json::from_str(TRACK_JSON).unwrap();
        assert!(playback.is_playing);
        assert_eq!(playback.progress_ms, Some(42_000));

        let Some(PlaybackItem::Track(track)) = playback.item else {
            unreachable!("expected a track item");
        };
        assert_eq!(track.name, "Never Gonna Give You Up");
        assert_eq!(track.artists[0].name, "Rick Astley");
        assert_eq!(track.album.unwrap().images.len(), 2);
    }

    #[test]
    fn test_parse_episode_and_unknown_items() {
        let episode: PlaybackResponse = serde_json::from_str(
            r#"{"is_playing":true,"progress_ms":1,"item":{"type":"episode","id":"e1","name":"Ep","duration_ms":5}}"#,
        )
        .unwrap();
        assert!(matches!(episode.item, Some(PlaybackItem::Episode(_))));

        let unknown: PlaybackResponse =
            serde_json::from_str(r#"{"is_playing":false,"item":{"type":"audiobook","id":"x"}}"#)
                .unwrap();
        assert!(matches!(unknown.item, Some(PlaybackItem::Unsupported)));

        let ad: PlaybackResponse =
            serde_json::from_str(r#"{"currently_playing_type":"ad","item":null}"#).unwrap();
        assert!(ad.item.is_none());
        assert!(!ad.is_playing);
    }

    #[test]
    fn test_command_routes() {
        assert_eq!(PlayerCommand::Play.method(), Method::PUT);
        assert_eq!(PlayerCommand::Next.method(), Method::POST);
        assert_eq!(PlayerCommand::Previous.path(), "/me/player/previous");
        assert_eq!(
            PlayerCommand::Volume(55).path(),
            "/me/player/volume?volume_percent=55"
        );
    }

    #[tokio::test]
    async fn test_current_playback_ok() {
        let (api, _) = spawn_player(AxumStatus::OK, TRACK_JSON).await;
        let playback = api.current_playback("token").await.unwrap().unwrap();
        assert!(matches!(playback.item, Some(PlaybackItem::Track(_))));
    }

    #[tokio::test]
    async fn test_no_content_means_nothing_playing() {
        let (api, _) = spawn_player(AxumStatus::NO_CONTENT, "").await;
        assert!(api.current_playback("token").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unauthorized_is_status_error() {
        let (api, _) = spawn_player(
            AxumStatus::UNAUTHORIZED,
            r#"{"error":{"status":401,"message":"The access token expired"}}"#,
        )
        .await;
        let err = api.current_playback("token").await.unwrap_err();
        assert!(matches!(err, SpotifyError::Status { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_send_commands() {
        let (api, seen) = spawn_player(AxumStatus::OK, "").await;

        api.send("token-1", PlayerCommand::Pause).await.unwrap();
        api.send("token-1", PlayerCommand::Next).await.unwrap();
        api.send("token-1", PlayerCommand::Volume(30)).await.unwrap();

        let seen = seen.lock().await;
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].0, "PUT");
        assert_eq!(seen[0].1, "/v1/me/player/pause");
        assert_eq!(seen[0].2.as_deref(), Some("Bearer token-1"));
        assert_eq!(seen[1].0, "POST");
        assert_eq!(seen[1].1, "/v1/me/player/next");
        assert_eq!(seen[2].1, "/v1/me/player/volume?volume_percent=30");
    }
}
