use serde::{Deserialize, Serialize};

use crate::models::{MediaType, SkipCategory, SkipPreferences, SkipTimestamp};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchResult {
    pub id: u64,
    pub title: String,
    pub poster_path: Option<String>,
    pub release_date: Option<String>,
    pub media_type: MediaType,
    #[serde(default)]
    pub timestamp_count: u32,
}

/// `GET /timestamps/{kind}/{id}` body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TimestampSet {
    pub timestamps: Vec<SkipTimestamp>,
    #[serde(default, rename = "isClean")]
    pub is_clean: bool,
}

impl TimestampSet {
    /// Distinct categories in first-seen order.
    pub fn categories(&self) -> Vec<SkipCategory> {
        let mut seen = Vec::new();
        for ts in &self.timestamps {
            if !seen.contains(&ts.category) {
                seen.push(ts.category);
            }
        }
        seen
    }
}

/// Filters for a timestamp fetch. `None` preferences means every category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimestampQuery {
    pub preferences: Option<SkipPreferences>,
    pub season_number: Option<u32>,
    pub episode_number: Option<u32>,
}

impl TimestampQuery {
    pub fn all_categories(season_number: Option<u32>, episode_number: Option<u32>) -> Self {
        Self {
            preferences: Some(SkipPreferences::all()),
            season_number,
            episode_number,
        }
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("source", "extension".to_string())];
        if let Some(prefs) = &self.preferences {
            pairs.push(("skip_nudity", prefs.skip_nudity.to_string()));
            pairs.push(("skip_sex", prefs.skip_sex.to_string()));
            pairs.push(("skip_gore", prefs.skip_gore.to_string()));
        }
        if let Some(season) = self.season_number {
            pairs.push(("seasonNumber", season.to_string()));
        }
        if let Some(episode) = self.episode_number {
            pairs.push(("episodeNumber", episode.to_string()));
        }
        pairs
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TimestampCounts {
    pub nudity: u32,
    pub sex: u32,
    pub gore: u32,
    pub total: u32,
}

impl TimestampCounts {
    pub fn from_timestamps(timestamps: &[SkipTimestamp]) -> Self {
        let mut counts = Self::default();
        for ts in timestamps {
            match ts.category {
                SkipCategory::Nudity => counts.nudity += 1,
                SkipCategory::Sex => counts.sex += 1,
                SkipCategory::Gore => counts.gore += 1,
            }
        }
        counts.total = counts.nudity + counts.sex + counts.gore;
        counts
    }
}

/// Account-level category defaults, snake_case on the wire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct UserPreferences {
    #[serde(default)]
    pub skip_nudity: bool,
    #[serde(default)]
    pub skip_sex: bool,
    #[serde(default)]
    pub skip_gore: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    pub id: u64,
    pub episode_number: u32,
    pub title: String,
    #[serde(default)]
    pub duration: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Season {
    pub season_number: u32,
    pub episode_count: u32,
    pub episodes: Vec<Episode>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EpisodeSource {
    Database,
    Tmdb,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EpisodesResponse {
    pub tv_id: u64,
    pub number_of_seasons: u32,
    pub seasons: Vec<Season>,
    pub source: EpisodeSource,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VoteResponse {
    pub new_confidence: f64,
    pub new_status: String,
}

/// `POST /timestamps/{kind}/{id}` body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewTimestamp {
    pub start: u64,
    pub finish: u64,
    #[serde(rename = "type")]
    pub category: SkipCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode_number: Option<u32>,
}
