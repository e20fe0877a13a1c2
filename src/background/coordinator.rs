use std::{collections::BTreeMap, sync::Arc};

use chrono::Utc;
use serde_json::Value;

use crate::{
    api::{
        EpisodeSource, NewTimestamp, SkipApi, TimestampCounts, TimestampQuery, TokenProvider,
    },
    bridge::{
        decode_reply,
        protocol::{
            ActivateSkipRequest, AuthStatusReply, AvailableSkipsReply, ContentReadyReply,
            ContentRef, EpisodesReply, MatchContentRequest, MatchReply, PendingSkipsReply,
            PingReply, PreferencesReply, QuickSkipRequest, RefreshReply, SaveTimestampReply,
            SaveTimestampRequest, SearchReply, SkipStatusReply, VoteReply,
        },
        Ack, TabMessage,
    },
    error::{SkipError, SkipResult},
    models::{
        SkipCategory, SkipPreferences, SkipTimestamp, TabId, TabSkipSession, VideoIdentity,
        VoteDirection,
    },
};

use super::{
    tab_state::TabStateStore,
    tabs::{is_netflix_url, watch_identity, BrowserTabs},
};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Background-side owner of every tab's skip session.
///
/// All session writes go through here; the router only decodes requests and
/// encodes replies.
#[derive(Clone)]
pub struct SessionCoordinator {
    store: TabStateStore,
    tabs: Arc<dyn BrowserTabs>,
    api: Arc<dyn SkipApi>,
    auth: Arc<dyn TokenProvider>,
}

impl SessionCoordinator {
    pub fn new(
        store: TabStateStore,
        tabs: Arc<dyn BrowserTabs>,
        api: Arc<dyn SkipApi>,
        auth: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            store,
            tabs,
            api,
            auth,
        }
    }

    pub fn store(&self) -> &TabStateStore {
        &self.store
    }

    async fn token_or(&self, missing: SkipError) -> SkipResult<String> {
        self.auth.token().await.ok_or(missing)
    }

    async fn target_tab(&self, explicit: Option<TabId>, netflix_only: bool) -> Option<TabId> {
        if explicit.is_some() {
            return explicit;
        }
        let tab = if netflix_only {
            self.tabs.active_netflix_tab().await
        } else {
            self.tabs.active_tab().await
        };
        tab.map(|tab| tab.id)
    }

    // Skip sessions

    pub async fn activate_skip(&self, request: ActivateSkipRequest) -> SkipResult<Ack> {
        self.activate(request, None).await
    }

    async fn activate(
        &self,
        request: ActivateSkipRequest,
        preferences: Option<SkipPreferences>,
    ) -> SkipResult<Ack> {
        log_info!("[Background] activating skip for {}", request.content_title);

        let tab = self
            .tabs
            .active_netflix_tab()
            .await
            .ok_or(SkipError::NoNetflixTab)?;
        let video = tab.watch_identity().ok_or(SkipError::NotOnWatchPage)?;

        let session = TabSkipSession {
            tab_id: tab.id,
            video_identity: video.clone(),
            is_active: true,
            content_kind: request.content_type,
            content_id: request.content_id,
            content_title: request.content_title.clone(),
            timestamps: request.timestamps.clone(),
            season_number: request.season_number,
            episode_number: request.episode_number,
            preferences,
            activated_at: Utc::now(),
        };
        self.store.set(session).await;

        let delivered = self
            .deliver(tab.id, request.timestamps, request.content_title, video)
            .await;
        if let Err(err) = delivered {
            log_error!("[Background] content script not reachable on tab {}: {}", tab.id, err);
            self.store.clear(tab.id).await;
            return Err(SkipError::ContentScriptMissing);
        }

        log_info!("[Background] skip activated for tab {}", tab.id);
        Ok(Ack::OK)
    }

    /// Push a START_SKIPPING and read the content script's answer.
    async fn deliver(
        &self,
        tab_id: TabId,
        timestamps: Vec<SkipTimestamp>,
        content_title: String,
        video: VideoIdentity,
    ) -> SkipResult<()> {
        let reply = self
            .tabs
            .send_to_tab(
                tab_id,
                TabMessage::StartSkipping {
                    timestamps,
                    content_title,
                    netflix_video_id: video,
                },
            )
            .await?;
        decode_reply::<Ack>(reply).map(|_| ())
    }

    pub async fn stop_skip(&self, tab_id: Option<TabId>) -> SkipResult<Ack> {
        let Some(tab_id) = self.target_tab(tab_id, true).await else {
            log_info!("[Background] no tab to stop skipping on");
            return Ok(Ack::OK);
        };

        log_info!("[Background] stopping skip for tab {}", tab_id);
        self.store.clear(tab_id).await;
        if let Err(err) = self.tabs.send_to_tab(tab_id, TabMessage::StopSkipping).await {
            log_warn!("[Background] could not send stop to tab {}: {}", tab_id, err);
        }
        Ok(Ack::OK)
    }

    pub async fn skip_status(&self, tab_id: Option<TabId>) -> SkipResult<SkipStatusReply> {
        let Some(tab_id) = self.target_tab(tab_id, false).await else {
            return Ok(SkipStatusReply::default());
        };

        match self.store.get(tab_id).await {
            Some(session) if session.is_active => Ok(SkipStatusReply {
                is_active: true,
                content_title: Some(session.content_title),
                content_type: Some(session.content_kind),
                content_id: Some(session.content_id),
                netflix_video_id: Some(session.video_identity),
                season_number: session.season_number,
                episode_number: session.episode_number,
            }),
            _ => Ok(SkipStatusReply::default()),
        }
    }

    /// A content script finished loading on `sender`. Replays the stored
    /// session when it is for the same video; a session for another video
    /// is stale and dropped.
    pub async fn content_ready(
        &self,
        sender: Option<TabId>,
        video: VideoIdentity,
        _url: &str,
    ) -> SkipResult<ContentReadyReply> {
        let Some(tab_id) = sender else {
            log_warn!("[Background] content ready without a tab id");
            return Ok(ContentReadyReply {
                success: false,
                restored: false,
            });
        };
        log_info!("[Background] content ready on tab {}, video {}", tab_id, video);

        let existing = self.store.get(tab_id).await;
        if let Some(session) = existing {
            if session.restorable_for(&video) {
                log_info!("[Background] restoring skip state for tab {}: {}", tab_id, session.content_title);
                let restored = self
                    .deliver(tab_id, session.timestamps, session.content_title, video)
                    .await;
                return Ok(match restored {
                    Ok(()) => ContentReadyReply {
                        success: true,
                        restored: true,
                    },
                    Err(err) => {
                        log_warn!("[Background] could not restore skip state: {}", err);
                        ContentReadyReply {
                            success: false,
                            restored: false,
                        }
                    }
                });
            }

            if session.video_identity != video {
                log_info!(
                    "[Background] video changed on tab {}: {} -> {}",
                    tab_id,
                    session.video_identity,
                    video
                );
                self.store.clear(tab_id).await;
            }
        }

        Ok(ContentReadyReply {
            success: true,
            restored: false,
        })
    }

    /// What the content script itself says. Unreachable means not skipping.
    pub async fn content_ping(&self, tab_id: Option<TabId>) -> PingReply {
        let Some(tab_id) = self.target_tab(tab_id, false).await else {
            return PingReply::default();
        };

        match self.tabs.send_to_tab(tab_id, TabMessage::Ping).await {
            Ok(reply) => decode_reply(reply).unwrap_or_default(),
            Err(_) => PingReply::default(),
        }
    }

    /// Re-fetch the session's timestamps with its original filters and
    /// redeliver them, so a freshly saved mark starts skipping at once.
    pub async fn refresh_active_skipping(&self, sender: Option<TabId>) -> SkipResult<RefreshReply> {
        let not_refreshed = RefreshReply {
            success: false,
            timestamp_count: 0,
        };
        let Some(tab_id) = sender else {
            return Ok(not_refreshed);
        };
        let Some(mut session) = self.store.get(tab_id).await.filter(|s| s.is_active) else {
            return Ok(not_refreshed);
        };

        let token = self.token_or(SkipError::Unauthenticated).await?;
        let query = TimestampQuery {
            preferences: Some(session.preferences.unwrap_or_default()),
            season_number: session.season_number,
            episode_number: session.episode_number,
        };
        let set = self
            .api
            .get_timestamps(session.content_kind, session.content_id, &query, &token)
            .await?;

        log_info!(
            "[Background] refreshed tab {}: {} -> {} timestamps",
            tab_id,
            session.timestamps.len(),
            set.timestamps.len()
        );
        session.timestamps = set.timestamps;
        let count = session.timestamps.len();
        self.store.set(session.clone()).await;

        self.deliver(
            tab_id,
            session.timestamps,
            session.content_title,
            session.video_identity,
        )
        .await?;

        Ok(RefreshReply {
            success: true,
            timestamp_count: count,
        })
    }

    // Catalog

    pub async fn save_timestamp(
        &self,
        request: SaveTimestampRequest,
    ) -> SkipResult<SaveTimestampReply> {
        let token = self.token_or(SkipError::SignInRequired).await?;
        let body = NewTimestamp {
            start: request.start_time,
            finish: request.end_time,
            category: request.timestamp_type,
            season_number: request.season_number,
            episode_number: request.episode_number,
        };
        let data = self
            .api
            .save_timestamp(request.content_type, request.content_id, &body, &token)
            .await?;
        log_info!(
            "[Background] saved {} mark for {} ({}ms -> {}ms)",
            request.timestamp_type,
            request.content_title,
            request.start_time,
            request.end_time
        );
        Ok(SaveTimestampReply {
            success: true,
            data,
        })
    }

    pub async fn search_content(&self, query: &str) -> SkipResult<SearchReply> {
        let token = self.token_or(SkipError::SignInRequired).await?;
        let results = self.api.search_content(query, &token).await?;
        Ok(SearchReply {
            success: true,
            results,
        })
    }

    /// Full catalog episode list, since marks may target episodes that have
    /// no timestamps yet.
    pub async fn episodes(&self, tv_show_id: u64) -> SkipResult<EpisodesReply> {
        let token = self.token_or(SkipError::SignInRequired).await?;
        let response = self
            .api
            .get_episodes(tv_show_id, EpisodeSource::Tmdb, &token)
            .await?;
        Ok(response.into())
    }

    pub async fn auth_status(&self) -> AuthStatusReply {
        let signed_in = self.auth.token().await.is_some();
        AuthStatusReply {
            is_authenticated: signed_in,
            user_id: signed_in.then(|| "authenticated".to_string()),
        }
    }

    pub async fn user_preferences(&self) -> SkipResult<PreferencesReply> {
        let token = self.token_or(SkipError::Unauthenticated).await?;
        let preferences = self.api.get_user_preferences(&token).await?;
        Ok(PreferencesReply {
            success: true,
            preferences,
        })
    }

    pub async fn save_user_preferences(
        &self,
        preferences: &BTreeMap<String, bool>,
    ) -> SkipResult<PreferencesReply> {
        let token = self.token_or(SkipError::Unauthenticated).await?;
        let preferences = self.api.save_user_preferences(preferences, &token).await?;
        Ok(PreferencesReply {
            success: true,
            preferences,
        })
    }

    /// Title search, preferring the result of the expected media type.
    pub async fn match_content(&self, request: MatchContentRequest) -> SkipResult<MatchReply> {
        let token = self.token_or(SkipError::Unauthenticated).await?;
        let results = self.api.search_content(&request.title, &token).await?;

        let expected = request.content_type.media_type();
        let best = results
            .iter()
            .find(|result| result.media_type == expected)
            .or_else(|| results.first())
            .ok_or(SkipError::ContentNotMatched)?;

        let query = TimestampQuery::all_categories(request.season_number, request.episode_number);
        let counts = match self
            .api
            .get_timestamps(best.media_type.content_kind(), best.id, &query, &token)
            .await
        {
            Ok(set) => TimestampCounts::from_timestamps(&set.timestamps),
            Err(err) => {
                log_warn!("[Background] could not count timestamps for {}: {}", best.id, err);
                TimestampCounts::default()
            }
        };

        Ok(MatchReply {
            success: true,
            tmdb_id: best.id,
            content_title: best.title.clone(),
            media_type: best.media_type,
            counts,
        })
    }

    /// Fetch with the chosen categories, then activate as usual and keep
    /// the categories on the session for later refreshes.
    pub async fn quick_skip_activate(&self, request: QuickSkipRequest) -> SkipResult<Ack> {
        let token = self.token_or(SkipError::Unauthenticated).await?;
        let query = TimestampQuery {
            preferences: Some(request.preferences),
            season_number: request.season_number,
            episode_number: request.episode_number,
        };
        let set = self
            .api
            .get_timestamps(request.content_type, request.tmdb_id, &query, &token)
            .await?;
        if set.timestamps.is_empty() {
            return Err(SkipError::NoTimestamps);
        }

        self.activate(
            ActivateSkipRequest {
                content_type: request.content_type,
                content_id: request.tmdb_id,
                content_title: request.content_title,
                timestamps: set.timestamps,
                season_number: request.season_number,
                episode_number: request.episode_number,
            },
            Some(request.preferences),
        )
        .await
    }

    pub async fn fetch_pending_skips(&self, content: ContentRef) -> SkipResult<PendingSkipsReply> {
        let token = self.token_or(SkipError::Unauthenticated).await?;
        let pending_skips = self
            .api
            .fetch_pending_skips(
                content.content_type,
                content.tmdb_id,
                content.season_number,
                content.episode_number,
                &token,
            )
            .await?;
        Ok(PendingSkipsReply {
            success: true,
            pending_skips,
        })
    }

    pub async fn vote(&self, skip_group_id: u64, direction: VoteDirection) -> SkipResult<VoteReply> {
        let token = self.token_or(SkipError::Unauthenticated).await?;
        let response = self.api.vote(skip_group_id, direction, &token).await?;
        log_info!(
            "[Background] vote on group {} -> {} ({:.2})",
            skip_group_id,
            response.new_status,
            response.new_confidence
        );
        Ok(VoteReply {
            success: true,
            new_confidence: response.new_confidence,
            new_status: response.new_status,
        })
    }

    /// Which categories exist for the content, without starting anything.
    pub async fn available_skips(&self, content: ContentRef) -> SkipResult<AvailableSkipsReply> {
        let token = self.token_or(SkipError::Unauthenticated).await?;
        let query = TimestampQuery::all_categories(content.season_number, content.episode_number);
        let set = self
            .api
            .get_timestamps(content.content_type, content.tmdb_id, &query, &token)
            .await?;

        Ok(AvailableSkipsReply {
            success: true,
            skip_types: set
                .categories()
                .iter()
                .map(|category| SkipCategory::css_name(category).to_string())
                .collect(),
            counts: TimestampCounts::from_timestamps(&set.timestamps),
            is_clean: set.is_clean,
        })
    }

    // Popup helpers

    /// Proxy to the content script, which alone can read the player.
    pub async fn detected_content(&self, tab_id: Option<TabId>) -> SkipResult<Value> {
        let tab_id = self
            .target_tab(tab_id, true)
            .await
            .ok_or(SkipError::NoNetflixTab)?;
        self.tabs
            .send_to_tab(tab_id, TabMessage::GetDetectedContent)
            .await
            .map_err(|err| {
                log_error!("[Background] detected content failed on tab {}: {}", tab_id, err);
                SkipError::TabUnresponsive
            })
    }

    /// `success: false` tells the page to open the web sign-in instead.
    pub async fn open_auth_popup(&self) -> Ack {
        match self.tabs.open_popup().await {
            Ok(()) => Ack::OK,
            Err(err) => {
                log_warn!("[Background] could not open popup: {}", err);
                Ack::FAILED
            }
        }
    }

    // Tab lifecycle

    pub async fn on_tab_removed(&self, tab_id: TabId) {
        self.store.clear(tab_id).await;
    }

    /// `changed_url` is set when this update moved the tab.
    pub async fn on_tab_updated(&self, tab_id: TabId, changed_url: Option<&str>, tab_url: &str) {
        if !is_netflix_url(tab_url) {
            return;
        }
        let Some(changed_url) = changed_url else {
            return;
        };
        let Some(session) = self.store.get(tab_id).await else {
            return;
        };

        if watch_identity(changed_url).as_ref() != Some(&session.video_identity) {
            log_info!("[Background] tab {} left video {}", tab_id, session.video_identity);
            self.store.clear(tab_id).await;
            if let Err(err) = self.tabs.send_to_tab(tab_id, TabMessage::StopSkipping).await {
                log_warn!("[Background] could not stop tab {}: {}", tab_id, err);
            }
        }
    }
}
