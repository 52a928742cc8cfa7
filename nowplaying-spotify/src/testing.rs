//! In-memory fakes for the authorizer and the player API.

use crate::api::{PlaybackResponse, PlayerApi, PlayerCommand};
use crate::authorizer::Authorizer;
use crate::credential::TokenResponse;
use crate::error::{Result, SpotifyError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn token(access: &str, refresh: Option<&str>, expires_in: Option<i64>) -> TokenResponse {
    TokenResponse {
        access_token: Some(access.into()),
        token_type: Some("Bearer".into()),
        refresh_token: refresh.map(Into::into),
        expires_in,
        ..TokenResponse::default()
    }
}

pub fn rejected(error: &str, description: Option<&str>) -> TokenResponse {
    TokenResponse {
        error: Some(error.into()),
        error_description: description.map(Into::into),
        ..TokenResponse::default()
    }
}

/// Scripted [`Authorizer`].
///
/// Queued responses are used first. Once a queue is empty, `authorize` issues
/// `access-N`/`refresh-N` and `refresh` issues `access-N` without a new
/// refresh token, both valid for an hour.
#[derive(Default)]
pub struct FakeAuthorizer {
    authorize_queue: Mutex<VecDeque<Result<TokenResponse>>>,
    refresh_queue: Mutex<VecDeque<Result<TokenResponse>>>,
    authorize_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    issued: AtomicUsize,
    refresh_tokens_seen: Mutex<Vec<String>>,
    latency: Duration,
}

impl FakeAuthorizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn push_authorize(&self, response: Result<TokenResponse>) {
        self.authorize_queue.lock().unwrap().push_back(response);
    }

    pub fn push_refresh(&self, response: Result<TokenResponse>) {
        self.refresh_queue.lock().unwrap().push_back(response);
    }

    pub fn authorize_calls(&self) -> usize {
        self.authorize_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_tokens_seen(&self) -> Vec<String> {
        self.refresh_tokens_seen.lock().unwrap().clone()
    }

    fn next_serial(&self) -> usize {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn delay(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl Authorizer for FakeAuthorizer {
    async fn authorize(&self) -> Result<TokenResponse> {
        self.authorize_calls.fetch_add(1, Ordering::SeqCst);
        self.delay().await;

        let queued = self.authorize_queue.lock().unwrap().pop_front();
        queued.unwrap_or_else(|| {
            let n = self.next_serial();
            Ok(token(
                &format!("access-{n}"),
                Some(&format!("refresh-{n}")),
                Some(3600),
            ))
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.refresh_tokens_seen
            .lock()
            .unwrap()
            .push(refresh_token.to_owned());
        self.delay().await;

        let queued = self.refresh_queue.lock().unwrap().pop_front();
        queued.unwrap_or_else(|| {
            let n = self.next_serial();
            Ok(token(&format!("access-{n}"), None, Some(3600)))
        })
    }
}

/// [`PlayerApi`] that serves a fixed playback body and records commands.
#[derive(Default)]
pub struct FakePlayer {
    playback: Mutex<Option<PlaybackResponse>>,
    fail_with: Mutex<Option<u16>>,
    commands: Mutex<Vec<(String, PlayerCommand)>>,
    fetches: AtomicUsize,
}

impl FakePlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_playback_json(&self, json: &str) {
        *self.playback.lock().unwrap() = Some(serde_json::from_str(json).unwrap());
    }

    /// Make every call fail with this HTTP status.
    pub fn fail_with(&self, status: u16) {
        *self.fail_with.lock().unwrap() = Some(status);
    }

    pub fn commands(&self) -> Vec<PlayerCommand> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .map(|(_, command)| *command)
            .collect()
    }

    pub fn tokens_used(&self) -> Vec<String> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .map(|(token, _)| token.clone())
            .collect()
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn failure(&self) -> Result<()> {
        match *self.fail_with.lock().unwrap() {
            Some(status) => Err(SpotifyError::Status {
                status,
                body: String::new(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PlayerApi for FakePlayer {
    async fn current_playback(&self, _access_token: &str) -> Result<Option<PlaybackResponse>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.failure()?;
        Ok(self.playback.lock().unwrap().clone())
    }

    async fn send(&self, access_token: &str, command: PlayerCommand) -> Result<()> {
        self.failure()?;
        self.commands
            .lock()
            .unwrap()
            .push((access_token.to_owned(), command));
        Ok(())
    }
}
