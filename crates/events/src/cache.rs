//! Auth token cache.
//!
//! The HTTP channel keeps the bearer token returned by the login endpoint in
//! a [`TokenCache`] under a key derived from the tenant id. Entries never
//! expire; the channel forgets a token only when the bus rejects it.
//!
//! The cache is the only state shared between channel instances, so it is
//! passed in explicitly rather than reached through a global.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

/// Key-value store holding auth tokens.
///
/// Implementations must make each operation atomic on its own. Two callers
/// racing on the same key may both log in; the later write simply wins.
#[async_trait]
pub trait TokenCache: Send + Sync {
    /// Return the token stored under `key`, if any.
    async fn get(&self, key: &str) -> Option<String>;

    /// Store `token` under `key` with no expiry.
    async fn put_forever(&self, key: &str, token: &str);

    /// Remove the token stored under `key`.
    async fn forget(&self, key: &str);
}

/// Process-local [`TokenCache`].
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared by every channel in the process.
#[derive(Debug, Default)]
pub struct InMemoryTokenCache {
    tokens: RwLock<HashMap<String, String>>,
}

impl InMemoryTokenCache {
    /// Create a new, empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached tokens.
    pub async fn len(&self) -> usize {
        self.tokens.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tokens.read().await.is_empty()
    }
}

#[async_trait]
impl TokenCache for InMemoryTokenCache {
    async fn get(&self, key: &str) -> Option<String> {
        self.tokens.read().await.get(key).cloned()
    }

    async fn put_forever(&self, key: &str, token: &str) {
        self.tokens
            .write()
            .await
            .insert(key.to_string(), token.to_string());
    }

    async fn forget(&self, key: &str) {
        self.tokens.write().await.remove(key);
    }
}
