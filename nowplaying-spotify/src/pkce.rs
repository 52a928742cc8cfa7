//! PKCE (RFC 7636) verifier/challenge pairs and OAuth `state` values.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::{distr::Alphanumeric, Rng};
use sha2::{Digest, Sha256};

/// Verifier length; RFC 7636 allows 43..=128
const VERIFIER_LEN: usize = 128;

const STATE_LEN: usize = 16;

/// A code verifier and the S256 challenge derived from it.
#[derive(Debug, Clone)]
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
}

impl PkcePair {
    #[must_use]
    pub fn generate() -> Self {
        let verifier = random_alphanumeric(VERIFIER_LEN);
        let challenge = code_challenge(&verifier);
        Self {
            verifier,
            challenge,
        }
    }
}

/// `BASE64URL(SHA256(verifier))` without padding.
#[must_use]
pub fn code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Random value for the OAuth `state` parameter.
#[must_use]
pub fn generate_state() -> String {
    random_alphanumeric(STATE_LEN)
}

fn random_alphanumeric(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
