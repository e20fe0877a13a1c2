use tokio::time::{Duration, Instant};

use crate::{api::TimestampCounts, models::ContentDescriptor};

use super::protocol::DetectedContent;

pub const MATCH_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
struct Entry<K, V> {
    key: K,
    value: V,
    stored_at: Instant,
}

/// Last catalog match for the page, so the mark overlay and the FAB do not
/// re-query the catalog for the same playback. One slot each; a new key
/// replaces the old one.
#[derive(Debug, Clone)]
pub struct MatchCache {
    ttl: Duration,
    content: Option<Entry<String, DetectedContent>>,
    counts: Option<Entry<u64, TimestampCounts>>,
}

impl Default for MatchCache {
    fn default() -> Self {
        Self::new(MATCH_CACHE_TTL)
    }
}

impl MatchCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            content: None,
            counts: None,
        }
    }

    /// Cached match for the playback in `metadata`, with season and episode
    /// taken from `metadata` since the user may have moved on to another
    /// episode of the same show.
    pub fn content_for(&mut self, metadata: &ContentDescriptor) -> Option<DetectedContent> {
        let ttl = self.ttl;
        let entry = self.content.as_ref()?;
        if entry.key != metadata.stable_session_id {
            return None;
        }
        if entry.stored_at.elapsed() > ttl {
            self.content = None;
            return None;
        }

        let mut content = entry.value.clone();
        content.season_number = metadata.season_number;
        content.episode_number = metadata.episode_number;
        Some(content)
    }

    pub fn store_content(&mut self, session_id: &str, content: DetectedContent) {
        self.content = Some(Entry {
            key: session_id.to_string(),
            value: content,
            stored_at: Instant::now(),
        });
    }

    pub fn counts_for(&mut self, tmdb_id: u64) -> Option<TimestampCounts> {
        let ttl = self.ttl;
        let entry = self.counts.as_ref()?;
        if entry.key != tmdb_id {
            return None;
        }
        if entry.stored_at.elapsed() > ttl {
            self.counts = None;
            return None;
        }
        Some(entry.value)
    }

    pub fn store_counts(&mut self, tmdb_id: u64, counts: TimestampCounts) {
        self.counts = Some(Entry {
            key: tmdb_id,
            value: counts,
            stored_at: Instant::now(),
        });
    }

    pub fn clear(&mut self) {
        self.content = None;
        self.counts = None;
    }
}
