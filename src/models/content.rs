use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Movie,
    Episode,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Movie => "movie",
            ContentKind::Episode => "episode",
        }
    }

    pub fn media_type(&self) -> MediaType {
        match self {
            ContentKind::Movie => MediaType::Movie,
            ContentKind::Episode => MediaType::Tv,
        }
    }
}

/// Catalog-side media type (`movie` / `tv`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Tv,
}

impl MediaType {
    pub fn content_kind(&self) -> ContentKind {
        match self {
            MediaType::Movie => ContentKind::Movie,
            MediaType::Tv => ContentKind::Episode,
        }
    }
}

/// What the player says is playing right now. Rebuilt on every read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContentDescriptor {
    pub title: String,
    #[serde(rename = "type")]
    pub content_kind: ContentKind,
    pub season_number: Option<u32>,
    pub episode_number: Option<u32>,
    pub episode_title: Option<String>,
    /// Player-internal per-playback session key.
    #[serde(rename = "netflixId")]
    pub stable_session_id: String,
}

static WATCH_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/watch/(\d+)").unwrap_or_else(|err| panic!("invalid watch path pattern: {err}"))
});

/// The `/watch/{id}` segment of the page URL.
///
/// Navigation decisions key off this, never off the player's session id,
/// because the URL changes synchronously while player state lags.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct VideoIdentity(String);

impl VideoIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Accepts a full URL or a bare path.
    pub fn from_url(url: &str) -> Option<Self> {
        WATCH_PATH
            .captures(url)
            .and_then(|caps| caps.get(1))
            .map(|m| Self(m.as_str().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VideoIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
