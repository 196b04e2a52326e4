//! Confirmation and recovery token generation
//!
//! Raw tokens are handed to the user once (by email); only their keyed
//! digest is stored.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// Result of generating a new token
#[derive(Clone)]
pub struct GeneratedToken {
    /// The raw token (only sent to the user)
    pub raw: String,
    /// The digest for storage
    pub digest: String,
}

impl fmt::Debug for GeneratedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedToken")
            .field("raw", &"<redacted>")
            .field("digest", &self.digest)
            .finish()
    }
}

/// Generator for single-use account tokens
#[derive(Clone)]
pub struct TokenGenerator {
    secret: Vec<u8>,
    token_bytes: usize,
}

impl TokenGenerator {
    /// Create a generator keyed with `secret`
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
            token_bytes: 32,
        }
    }

    /// Set the number of random bytes
    pub fn with_token_bytes(mut self, bytes: usize) -> Self {
        self.token_bytes = bytes;
        self
    }

    /// Generate a new token
    pub fn generate(&self) -> GeneratedToken {
        let mut random_bytes = vec![0u8; self.token_bytes];
        rand::thread_rng().fill_bytes(&mut random_bytes);

        let raw = URL_SAFE_NO_PAD.encode(&random_bytes);
        let digest = self.digest(&raw);

        GeneratedToken { raw, digest }
    }

    /// Digest of a raw token, used to look up the stored token
    pub fn digest(&self, raw: &str) -> String {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC can take key of any size");
        mac.update(raw.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

impl fmt::Debug for TokenGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGenerator")
            .field("token_bytes", &self.token_bytes)
            .finish_non_exhaustive()
    }
}
