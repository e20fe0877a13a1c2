use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ContentKind, SkipCategory, SkipTimestamp, VideoIdentity};

pub type TabId = u32;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SkipPreferences {
    pub skip_nudity: bool,
    pub skip_sex: bool,
    pub skip_gore: bool,
}

impl SkipPreferences {
    pub fn all() -> Self {
        Self {
            skip_nudity: true,
            skip_sex: true,
            skip_gore: true,
        }
    }

    pub fn only(category: SkipCategory) -> Self {
        Self {
            skip_nudity: category == SkipCategory::Nudity,
            skip_sex: category == SkipCategory::Sex,
            skip_gore: category == SkipCategory::Gore,
        }
    }

    pub fn includes(&self, category: SkipCategory) -> bool {
        match category {
            SkipCategory::Nudity => self.skip_nudity,
            SkipCategory::Sex => self.skip_sex,
            SkipCategory::Gore => self.skip_gore,
        }
    }
}

impl Default for SkipPreferences {
    fn default() -> Self {
        Self::all()
    }
}

/// Background-owned record of an active skip activation for one tab.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TabSkipSession {
    pub tab_id: TabId,
    #[serde(rename = "netflixVideoId")]
    pub video_identity: VideoIdentity,
    pub is_active: bool,
    #[serde(rename = "contentType")]
    pub content_kind: ContentKind,
    pub content_id: u64,
    pub content_title: String,
    pub timestamps: Vec<SkipTimestamp>,
    pub season_number: Option<u32>,
    pub episode_number: Option<u32>,
    #[serde(default)]
    pub preferences: Option<SkipPreferences>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub activated_at: DateTime<Utc>,
}

impl TabSkipSession {
    /// True when the stored session can be replayed onto a page showing `identity`.
    pub fn restorable_for(&self, identity: &VideoIdentity) -> bool {
        self.is_active && &self.video_identity == identity
    }
}
