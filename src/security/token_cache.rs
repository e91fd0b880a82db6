use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Environment variable holding the control API bearer token.
pub const DEFAULT_TOKEN_ENV: &str = "OP_FW_TOKEN";

/// In-memory token shared between clones, swapped atomically on rotation.
#[derive(Debug, Clone, Default)]
pub struct TokenCache {
    token: Arc<RwLock<Option<String>>>,
}

impl TokenCache {
    /// Create a cache holding an initial token.
    pub fn new(initial_token: String) -> Self {
        Self {
            token: Arc::new(RwLock::new(Some(initial_token))),
        }
    }

    /// A cache with no token configured.
    pub fn empty() -> Self {
        Self::default()
    }

    pub async fn get(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    /// Atomically swap the token.
    pub async fn swap(&self, new_token: String) {
        let mut token = self.token.write().await;
        if token.as_deref() != Some(new_token.as_str()) {
            *token = Some(new_token);
            debug!("Token rotated");
        }
    }
}

/// Where the executor obtains its bearer token on every call.
#[derive(Debug, Clone)]
pub enum TokenSource {
    /// Read the named environment variable each time.
    Env(String),
    /// Shared in-memory cache.
    Cached(TokenCache),
}

impl Default for TokenSource {
    fn default() -> Self {
        TokenSource::Env(DEFAULT_TOKEN_ENV.to_string())
    }
}

impl TokenSource {
    pub fn env(var: impl Into<String>) -> Self {
        TokenSource::Env(var.into())
    }

    pub fn fixed(token: impl Into<String>) -> Self {
        TokenSource::Cached(TokenCache::new(token.into()))
    }

    /// Current token; empty values count as missing.
    pub async fn current(&self) -> Option<String> {
        let token = match self {
            TokenSource::Env(var) => std::env::var(var).ok(),
            TokenSource::Cached(cache) => cache.get().await,
        };
        token.filter(|t| !t.trim().is_empty())
    }
}
