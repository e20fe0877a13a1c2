use std::{collections::BTreeMap, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, Method, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

use crate::{
    error::{SkipError, SkipResult},
    models::{ContentKind, MediaType, PendingSkip, VoteDirection},
};

use super::{
    EpisodeSource, EpisodesResponse, NewTimestamp, SearchResult, SkipApi, TimestampQuery,
    TimestampSet, UserPreferences, VoteResponse,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// [`SkipApi`] over HTTPS with bearer auth.
#[derive(Clone)]
pub struct HttpSkipApi {
    client: Client,
    base_url: String,
}

impl std::fmt::Debug for HttpSkipApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSkipApi")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Deserialize)]
struct TmdbSearchItem {
    id: u64,
    media_type: String,
    title: Option<String>,
    name: Option<String>,
    poster_path: Option<String>,
    release_date: Option<String>,
    first_air_date: Option<String>,
}

#[derive(Deserialize)]
struct TmdbSearchResponse {
    #[serde(default)]
    results: Vec<TmdbSearchItem>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PendingSkipsResponse {
    #[serde(default)]
    pending_skips: Vec<PendingSkip>,
}

impl HttpSkipApi {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        Url::parse(base_url).with_context(|| format!("invalid API base URL '{base_url}'"))?;

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str, query: &[(&str, String)]) -> SkipResult<Url> {
        let raw = format!("{}{}", self.base_url, endpoint);
        let parsed = if query.is_empty() {
            Url::parse(&raw)
        } else {
            Url::parse_with_params(&raw, query)
        };
        parsed.map_err(|err| SkipError::Network(format!("bad url {raw}: {err}")))
    }

    async fn call<T, B>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
        token: &str,
    ) -> SkipResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        if token.is_empty() {
            return Err(SkipError::Unauthenticated);
        }

        debug!("[Api] {} {}", method, url.path());
        let mut request = self.client.request(method, url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(SkipError::SessionExpired);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!("[Api] request failed with {}: {}", status, message);
            return Err(SkipError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<T>().await?)
    }

    async fn get<T: DeserializeOwned>(&self, url: Url, token: &str) -> SkipResult<T> {
        self.call::<T, Value>(Method::GET, url, None, token).await
    }

    async fn post<T, B>(&self, url: Url, body: &B, token: &str) -> SkipResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.call(Method::POST, url, Some(body), token).await
    }
}

fn search_result(item: TmdbSearchItem) -> Option<SearchResult> {
    let media_type = match item.media_type.as_str() {
        "movie" => MediaType::Movie,
        "tv" => MediaType::Tv,
        _ => return None,
    };

    Some(SearchResult {
        id: item.id,
        media_type,
        title: item
            .title
            .or(item.name)
            .unwrap_or_else(|| "Unknown".to_string()),
        poster_path: item.poster_path,
        release_date: item.release_date.or(item.first_air_date),
        timestamp_count: 0,
    })
}

#[async_trait]
impl SkipApi for HttpSkipApi {
    async fn search_content(&self, query: &str, token: &str) -> SkipResult<Vec<SearchResult>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let body = json!({ "endpoint": "/search/multi", "params": { "query": query } });
        let response: TmdbSearchResponse = self.post(self.url("/tmdb", &[])?, &body, token).await?;
        Ok(response.results.into_iter().filter_map(search_result).collect())
    }

    async fn get_timestamps(
        &self,
        kind: ContentKind,
        content_id: u64,
        query: &TimestampQuery,
        token: &str,
    ) -> SkipResult<TimestampSet> {
        let endpoint = format!("/timestamps/{}/{}", kind.as_str(), content_id);
        self.get(self.url(&endpoint, &query.query_pairs())?, token).await
    }

    async fn get_user_preferences(&self, token: &str) -> SkipResult<UserPreferences> {
        self.get(self.url("/user/preferences", &[])?, token).await
    }

    async fn save_user_preferences(
        &self,
        preferences: &BTreeMap<String, bool>,
        token: &str,
    ) -> SkipResult<UserPreferences> {
        self.post(self.url("/user/preferences", &[])?, preferences, token)
            .await
    }

    async fn get_episodes(
        &self,
        tv_show_id: u64,
        source: EpisodeSource,
        token: &str,
    ) -> SkipResult<EpisodesResponse> {
        let query = match source {
            EpisodeSource::Tmdb => vec![("source", "tmdb".to_string())],
            EpisodeSource::Database => Vec::new(),
        };
        let endpoint = format!("/tv/{tv_show_id}/episodes");
        self.get(self.url(&endpoint, &query)?, token).await
    }

    async fn fetch_pending_skips(
        &self,
        kind: ContentKind,
        content_id: u64,
        season_number: Option<u32>,
        episode_number: Option<u32>,
        token: &str,
    ) -> SkipResult<Vec<PendingSkip>> {
        let mut query = Vec::new();
        if let Some(season) = season_number {
            query.push(("seasonNumber", season.to_string()));
        }
        if let Some(episode) = episode_number {
            query.push(("episodeNumber", episode.to_string()));
        }

        let endpoint = format!("/skips/pending/{}/{}", kind.as_str(), content_id);
        let response: PendingSkipsResponse = self.get(self.url(&endpoint, &query)?, token).await?;
        Ok(response.pending_skips)
    }

    async fn vote(
        &self,
        skip_group_id: u64,
        direction: VoteDirection,
        token: &str,
    ) -> SkipResult<VoteResponse> {
        let body = json!({
            "skipGroupId": skip_group_id,
            "voteType": direction,
            "source": "extension",
        });
        self.post(self.url("/skips/vote", &[])?, &body, token).await
    }

    async fn save_timestamp(
        &self,
        kind: ContentKind,
        content_id: u64,
        body: &NewTimestamp,
        token: &str,
    ) -> SkipResult<Value> {
        let endpoint = format!("/timestamps/{}/{}", kind.as_str(), content_id);
        self.post(self.url(&endpoint, &[])?, body, token).await
    }
}
