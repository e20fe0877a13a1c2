//! Remote catalog API. The background consumes it through [`SkipApi`] so the
//! coordinator can be driven by fakes in tests.

mod auth;
mod client;
mod types;

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::{
    error::SkipResult,
    models::{ContentKind, PendingSkip, VoteDirection},
};

pub use auth::{StaticTokenProvider, TokenProvider};
pub use client::HttpSkipApi;
pub use types::{
    Episode, EpisodeSource, EpisodesResponse, NewTimestamp, SearchResult, Season, TimestampCounts,
    TimestampQuery, TimestampSet, UserPreferences, VoteResponse,
};

#[async_trait]
pub trait SkipApi: Send + Sync {
    /// Movies and shows only; people are dropped.
    async fn search_content(&self, query: &str, token: &str) -> SkipResult<Vec<SearchResult>>;

    async fn get_timestamps(
        &self,
        kind: ContentKind,
        content_id: u64,
        query: &TimestampQuery,
        token: &str,
    ) -> SkipResult<TimestampSet>;

    async fn get_user_preferences(&self, token: &str) -> SkipResult<UserPreferences>;

    async fn save_user_preferences(
        &self,
        preferences: &BTreeMap<String, bool>,
        token: &str,
    ) -> SkipResult<UserPreferences>;

    async fn get_episodes(
        &self,
        tv_show_id: u64,
        source: EpisodeSource,
        token: &str,
    ) -> SkipResult<EpisodesResponse>;

    async fn fetch_pending_skips(
        &self,
        kind: ContentKind,
        content_id: u64,
        season_number: Option<u32>,
        episode_number: Option<u32>,
        token: &str,
    ) -> SkipResult<Vec<PendingSkip>>;

    async fn vote(
        &self,
        skip_group_id: u64,
        direction: VoteDirection,
        token: &str,
    ) -> SkipResult<VoteResponse>;

    async fn save_timestamp(
        &self,
        kind: ContentKind,
        content_id: u64,
        body: &NewTimestamp,
        token: &str,
    ) -> SkipResult<serde_json::Value>;
}
