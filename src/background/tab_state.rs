use std::{collections::HashMap, sync::Arc};

use tokio::sync::Mutex;

use crate::{
    models::{TabId, TabSkipSession},
    storage::SessionStorage,
};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

pub fn storage_key(tab_id: TabId) -> String {
    format!("tab_state_{tab_id}")
}

/// Two-tier per-tab session store.
///
/// The background can be evicted between any two messages, so every write
/// goes to the in-memory map and to [`SessionStorage`]; reads that miss the
/// map fall back to storage and promote the hit.
#[derive(Clone)]
pub struct TabStateStore {
    memory: Arc<Mutex<HashMap<TabId, TabSkipSession>>>,
    storage: Arc<dyn SessionStorage>,
}

impl TabStateStore {
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            memory: Arc::new(Mutex::new(HashMap::new())),
            storage,
        }
    }

    pub async fn get(&self, tab_id: TabId) -> Option<TabSkipSession> {
        if let Some(session) = self.memory.lock().await.get(&tab_id) {
            return Some(session.clone());
        }

        let stored = match self.storage.get(&storage_key(tab_id)).await {
            Ok(stored) => stored?,
            Err(err) => {
                log_warn!("[Background] failed to read state for tab {}: {}", tab_id, err);
                return None;
            }
        };

        let session: TabSkipSession = match serde_json::from_value(stored) {
            Ok(session) => session,
            Err(err) => {
                log_warn!("[Background] dropping unreadable state for tab {}: {}", tab_id, err);
                return None;
            }
        };

        log_info!("[Background] restored tab {} state from session storage", tab_id);
        self.memory.lock().await.insert(tab_id, session.clone());
        Some(session)
    }

    /// Storage failures are logged; the in-memory copy is always updated.
    pub async fn set(&self, session: TabSkipSession) {
        let tab_id = session.tab_id;
        match serde_json::to_value(&session) {
            Ok(value) => {
                if let Err(err) = self.storage.set(&storage_key(tab_id), value).await {
                    log_warn!("[Background] failed to persist state for tab {}: {}", tab_id, err);
                }
            }
            Err(err) => {
                log_warn!("[Background] failed to serialize state for tab {}: {}", tab_id, err);
            }
        }
        self.memory.lock().await.insert(tab_id, session);
    }

    pub async fn clear(&self, tab_id: TabId) {
        self.memory.lock().await.remove(&tab_id);
        if let Err(err) = self.storage.remove(&storage_key(tab_id)).await {
            log_warn!("[Background] failed to clear state for tab {}: {}", tab_id, err);
        }
    }

    /// Drop the in-memory tier, as happens when the background is evicted.
    #[cfg(test)]
    pub(crate) async fn forget_memory(&self) {
        self.memory.lock().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::SkipResult,
        models::{ContentKind, SkipCategory, SkipTimestamp, VideoIdentity},
        storage::SessionDatabase,
    };
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingStorage {
        inner: SessionDatabase,
        reads: AtomicUsize,
    }

    #[async_trait]
    impl SessionStorage for CountingStorage {
        async fn get(&self, key: &str) -> SkipResult<Option<Value>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: Value) -> SkipResult<()> {
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> SkipResult<()> {
            self.inner.remove(key).await
        }
    }

    fn session(tab_id: TabId) -> TabSkipSession {
        TabSkipSession {
            tab_id,
            video_identity: VideoIdentity::new("555"),
            is_active: true,
            content_kind: ContentKind::Movie,
            content_id: 949,
            content_title: "Heat".into(),
            timestamps: vec![SkipTimestamp::new(0, 1000, SkipCategory::Nudity)],
            season_number: None,
            episode_number: None,
            preferences: None,
            activated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn eviction_recovers_from_storage_and_promotes() {
        let storage = Arc::new(CountingStorage {
            inner: SessionDatabase::in_memory().unwrap(),
            reads: AtomicUsize::new(0),
        });
        let store = TabStateStore::new(storage.clone());

        store.set(session(3)).await;
        store.forget_memory().await;

        let recovered = store.get(3).await.unwrap();
        assert_eq!(recovered.content_title, "Heat");
        assert_eq!(storage.reads.load(Ordering::SeqCst), 1);

        assert!(store.get(3).await.is_some());
        assert_eq!(storage.reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn clear_removes_both_tiers() {
        let storage = Arc::new(SessionDatabase::in_memory().unwrap());
        let store = TabStateStore::new(storage.clone());

        store.set(session(4)).await;
        store.clear(4).await;

        assert!(store.get(4).await.is_none());
        assert_eq!(storage.get(&storage_key(4)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn unreadable_entry_is_ignored() {
        let storage = Arc::new(SessionDatabase::in_memory().unwrap());
        storage
            .set(&storage_key(5), serde_json::json!({ "tabId": "five" }))
            .await
            .unwrap();
        let store = TabStateStore::new(storage);

        assert!(store.get(5).await.is_none());
    }
}
