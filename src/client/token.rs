use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use base64::Engine;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Client id/secret pair. Held in memory only; identified across caches and
/// webhook subscriptions by a stable hash rather than the secret itself.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    client_secret: String,
}

impl Credentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    pub fn auth_hash(&self) -> String {
        let digest = Sha256::digest(format!("{}:{}", self.client_id, self.client_secret));
        hex::encode(digest)
    }

    pub(crate) fn basic_auth(&self) -> String {
        base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", self.client_id, self.client_secret))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct CachedToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Pluggable token cache keyed by the templated credential-hash key. The
/// in-memory store suffices for a single process; a distributed backend can
/// implement the same trait.
pub trait TokenCache: Send + Sync {
    fn get(&self, key: &str) -> Option<CachedToken>;
    fn put(&self, key: &str, token: CachedToken);
}

#[derive(Default)]
pub struct InMemoryTokenCache {
    entries: Mutex<HashMap<String, CachedToken>>,
}

impl TokenCache for InMemoryTokenCache {
    fn get(&self, key: &str) -> Option<CachedToken> {
        let entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        entries
            .get(key)
            .filter(|token| token.expires_at > Utc::now())
            .cloned()
    }

    fn put(&self, key: &str, token: CachedToken) {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), token);
    }
}
