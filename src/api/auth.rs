use async_trait::async_trait;
use tokio::sync::RwLock;

/// Source of the signed-in user's bearer token.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// `None` when signed out. Callers must not fall back to a stale token.
    async fn token(&self) -> Option<String>;
}

/// Token held in memory, swapped when the user signs in or out.
#[derive(Debug, Default)]
pub struct StaticTokenProvider {
    token: RwLock<Option<String>>,
}

impl StaticTokenProvider {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: RwLock::new(token.filter(|t| !t.is_empty())),
        }
    }

    pub async fn set(&self, token: Option<String>) {
        *self.token.write().await = token.filter(|t| !t.is_empty());
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn token(&self) -> Option<String> {
        self.token.read().await.clone()
    }
}
