//! Message shapes crossing the three contexts.
//!
//! Popup/content -> background requests are [`BackgroundRequest`],
//! background -> content script messages are [`TabMessage`], and the content
//! script talks to the main-world runtime with [`PageCommand`] (down) and
//! [`PageEvent`] (up). Everything is `{ "type": ..., ... }` on the wire.

use std::collections::BTreeMap;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    api::{EpisodesResponse, SearchResult, Season, TimestampCounts, UserPreferences},
    error::{SkipError, SkipResult},
    models::{
        ContentDescriptor, ContentKind, MediaType, PendingSkip, SkipCategory, SkipPreferences,
        SkipTimestamp, TabId, VideoIdentity, VoteDirection,
    },
    ui::{ButtonVisibility, FabView, LoadingStatus, Notification},
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivateSkipRequest {
    pub content_type: ContentKind,
    pub content_id: u64,
    pub content_title: String,
    pub timestamps: Vec<SkipTimestamp>,
    #[serde(default)]
    pub season_number: Option<u32>,
    #[serde(default)]
    pub episode_number: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuickSkipRequest {
    pub content_type: ContentKind,
    pub tmdb_id: u64,
    pub content_title: String,
    pub preferences: SkipPreferences,
    #[serde(default)]
    pub season_number: Option<u32>,
    #[serde(default)]
    pub episode_number: Option<u32>,
}

/// Catalog item plus optional episode coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContentRef {
    pub content_type: ContentKind,
    pub tmdb_id: u64,
    #[serde(default)]
    pub season_number: Option<u32>,
    #[serde(default)]
    pub episode_number: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SaveTimestampRequest {
    pub start_time: u64,
    pub end_time: u64,
    pub timestamp_type: SkipCategory,
    pub content_type: ContentKind,
    pub content_id: u64,
    pub content_title: String,
    #[serde(default)]
    pub season_number: Option<u32>,
    #[serde(default)]
    pub episode_number: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MatchContentRequest {
    pub title: String,
    pub content_type: ContentKind,
    #[serde(default)]
    pub season_number: Option<u32>,
    #[serde(default)]
    pub episode_number: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum BackgroundRequest {
    ActivateSkip(ActivateSkipRequest),
    StopSkip {
        #[serde(default)]
        tab_id: Option<TabId>,
    },
    GetSkipStatus {
        #[serde(default)]
        tab_id: Option<TabId>,
    },
    ContentReady {
        netflix_video_id: VideoIdentity,
        url: String,
    },
    ContentPing {
        #[serde(default)]
        tab_id: Option<TabId>,
    },
    RefreshActiveSkipping,
    SaveTimestamp(SaveTimestampRequest),
    SearchContent {
        query: String,
    },
    GetEpisodes {
        tv_show_id: u64,
    },
    CheckAuthStatus,
    GetUserPreferences,
    SaveUserPreferences {
        preferences: BTreeMap<String, bool>,
    },
    MatchContent(MatchContentRequest),
    QuickSkipActivate(QuickSkipRequest),
    FetchPendingSkips(ContentRef),
    #[serde(alias = "VOTE_SKIP")]
    VoteOnSkip {
        skip_group_id: u64,
        vote_type: VoteDirection,
    },
    CheckAvailableSkips(ContentRef),
    GetDetectedContent {
        #[serde(default)]
        tab_id: Option<TabId>,
    },
    OpenAuthPopup,
}

impl BackgroundRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            BackgroundRequest::ActivateSkip(_) => "ACTIVATE_SKIP",
            BackgroundRequest::StopSkip { .. } => "STOP_SKIP",
            BackgroundRequest::GetSkipStatus { .. } => "GET_SKIP_STATUS",
            BackgroundRequest::ContentReady { .. } => "CONTENT_READY",
            BackgroundRequest::ContentPing { .. } => "CONTENT_PING",
            BackgroundRequest::RefreshActiveSkipping => "REFRESH_ACTIVE_SKIPPING",
            BackgroundRequest::SaveTimestamp(_) => "SAVE_TIMESTAMP",
            BackgroundRequest::SearchContent { .. } => "SEARCH_CONTENT",
            BackgroundRequest::GetEpisodes { .. } => "GET_EPISODES",
            BackgroundRequest::CheckAuthStatus => "CHECK_AUTH_STATUS",
            BackgroundRequest::GetUserPreferences => "GET_USER_PREFERENCES",
            BackgroundRequest::SaveUserPreferences { .. } => "SAVE_USER_PREFERENCES",
            BackgroundRequest::MatchContent(_) => "MATCH_CONTENT",
            BackgroundRequest::QuickSkipActivate(_) => "QUICK_SKIP_ACTIVATE",
            BackgroundRequest::FetchPendingSkips(_) => "FETCH_PENDING_SKIPS",
            BackgroundRequest::VoteOnSkip { .. } => "VOTE_ON_SKIP",
            BackgroundRequest::CheckAvailableSkips(_) => "CHECK_AVAILABLE_SKIPS",
            BackgroundRequest::GetDetectedContent { .. } => "GET_DETECTED_CONTENT",
            BackgroundRequest::OpenAuthPopup => "OPEN_AUTH_POPUP",
        }
    }
}

/// Background -> content script.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum TabMessage {
    StartSkipping {
        timestamps: Vec<SkipTimestamp>,
        content_title: String,
        netflix_video_id: VideoIdentity,
    },
    StopSkipping,
    Ping,
    GetDetectedContent,
}

/// Content script -> main-world runtime, `{ type, data }` on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all_fields = "camelCase")]
pub enum PageCommand {
    #[serde(rename = "SKIPIT_START_SKIP_CHECKING")]
    StartSkipChecking { timestamps: Vec<SkipTimestamp> },
    #[serde(rename = "SKIPIT_STOP_SKIP_CHECKING")]
    StopSkipChecking,
    #[serde(rename = "SKIPIT_GET_NETFLIX_METADATA")]
    GetNetflixMetadata,
    #[serde(rename = "SKIPIT_UPDATE_FAB_STATE")]
    UpdateFabState { is_skipping: bool },
    #[serde(rename = "SKIPIT_LOADING_STATUS")]
    LoadingStatus { status: LoadingStatus },
    #[serde(rename = "SKIPIT_SET_AVAILABLE_SKIP_TYPES")]
    SetAvailableSkipTypes {
        skip_types: Vec<SkipCategory>,
        #[serde(default)]
        is_clean: bool,
    },
    #[serde(rename = "SKIPIT_SET_PENDING_SKIPS")]
    SetPendingSkips { pending_skips: Vec<PendingSkip> },
    #[serde(rename = "SKIPIT_AUTH_STATE_UPDATE")]
    AuthStateUpdate { is_authenticated: bool },
    #[serde(rename = "SKIPIT_VOTE_RESULT")]
    VoteResult {
        success: bool,
        #[serde(default)]
        error: Option<String>,
    },
    #[serde(rename = "SKIPIT_MODAL_CLOSED")]
    ModalClosed,
    #[serde(rename = "SKIPIT_RESET_MARKING")]
    ResetMarking,
}

/// Main-world runtime -> content script.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all_fields = "camelCase")]
pub enum PageEvent {
    #[serde(rename = "SKIPIT_NETFLIX_READY")]
    NetflixReady,
    #[serde(rename = "SKIPIT_NETFLIX_METADATA")]
    NetflixMetadata { metadata: Option<ContentDescriptor> },
    #[serde(rename = "SKIPIT_METADATA_READY")]
    MetadataReady { metadata: ContentDescriptor },
    #[serde(rename = "SKIPIT_MARK_STARTED")]
    MarkStarted { start_time: u64 },
    #[serde(rename = "SKIPIT_MARK_ENDED")]
    MarkEnded {
        start_time: u64,
        end_time: u64,
        metadata: Option<ContentDescriptor>,
    },
    #[serde(rename = "SKIPIT_FAB_CLICKED")]
    FabClicked { metadata: Option<ContentDescriptor> },
    #[serde(rename = "SKIPIT_AUTO_START_SKIPPING")]
    AutoStartSkipping {
        metadata: Option<ContentDescriptor>,
        skip_type: SkipCategory,
    },
    #[serde(rename = "SKIPIT_STOP_REQUEST")]
    StopRequest,
    #[serde(rename = "SKIPIT_OPEN_AUTH_POPUP")]
    OpenAuthPopup,
    #[serde(rename = "SKIPIT_REQUEST_AUTH_CHECK")]
    RequestAuthCheck,
    #[serde(rename = "SKIPIT_SKIP_VOTE")]
    SkipVote {
        skip_group_id: u64,
        vote_type: VoteDirection,
    },
}

/// What the in-player chrome should show. Painted by the host glue.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum UiUpdate {
    Fab {
        view: FabView,
        visibility: ButtonVisibility,
    },
    MarkButton {
        label: String,
        marking: bool,
    },
    ShowNotification {
        notification: Notification,
    },
    HideNotification,
    VotePrompt {
        skip: Option<PendingSkip>,
    },
}

/// Serialize a reply for the wire. Never fails outward.
pub fn reply<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value)
        .unwrap_or_else(|err| json!({ "success": false, "error": err.to_string() }))
}

/// Read a reply, turning `{ success: false, error }` into [`SkipError::Rejected`].
pub fn decode_reply<T: DeserializeOwned>(value: Value) -> SkipResult<T> {
    if value.get("success") == Some(&Value::Bool(false)) {
        if let Some(error) = value.get("error").and_then(Value::as_str) {
            return Err(SkipError::Rejected(error.to_string()));
        }
    }
    serde_json::from_value(value).map_err(|err| SkipError::Rejected(format!("unexpected reply: {err}")))
}

// Replies. Field names follow what the popup and content script read.

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ack {
    pub success: bool,
}

impl Ack {
    pub const OK: Ack = Ack { success: true };
    pub const FAILED: Ack = Ack { success: false };
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SkipStatusReply {
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<ContentKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub netflix_video_id: Option<VideoIdentity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode_number: Option<u32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentReadyReply {
    pub success: bool,
    #[serde(default)]
    pub restored: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PingReply {
    pub is_skipping: bool,
    pub netflix_video_id: Option<VideoIdentity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RefreshReply {
    pub success: bool,
    pub timestamp_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SaveTimestampReply {
    pub success: bool,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchReply {
    pub success: bool,
    pub results: Vec<SearchResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EpisodesReply {
    pub success: bool,
    pub seasons: Vec<Season>,
}

impl From<EpisodesResponse> for EpisodesReply {
    fn from(response: EpisodesResponse) -> Self {
        Self {
            success: true,
            seasons: response.seasons,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatusReply {
    pub is_authenticated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PreferencesReply {
    pub success: bool,
    pub preferences: UserPreferences,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MatchReply {
    pub success: bool,
    pub tmdb_id: u64,
    pub content_title: String,
    pub media_type: MediaType,
    pub counts: TimestampCounts,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PendingSkipsReply {
    pub success: bool,
    pub pending_skips: Vec<PendingSkip>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VoteReply {
    pub success: bool,
    pub new_confidence: f64,
    pub new_status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AvailableSkipsReply {
    pub success: bool,
    /// Lower-case category names.
    pub skip_types: Vec<String>,
    pub counts: TimestampCounts,
    pub is_clean: bool,
}

/// Catalog match for what is playing, cached by the content script.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DetectedContent {
    pub tmdb_id: u64,
    pub title: String,
    pub media_type: MediaType,
    pub season_number: Option<u32>,
    pub episode_number: Option<u32>,
}

impl DetectedContent {
    pub fn content_ref(&self) -> ContentRef {
        ContentRef {
            content_type: self.media_type.content_kind(),
            tmdb_id: self.tmdb_id,
            season_number: self.season_number,
            episode_number: self.episode_number,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DetectedContentReply {
    pub success: bool,
    pub content: Option<DetectedContent>,
    pub metadata: Option<ContentDescriptor>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn requests_parse_from_extension_messages() {
        let stop: BackgroundRequest = serde_json::from_value(json!({ "type": "STOP_SKIP" })).unwrap();
        assert_eq!(stop, BackgroundRequest::StopSkip { tab_id: None });

        let ready: BackgroundRequest = serde_json::from_value(json!({
            "type": "CONTENT_READY",
            "netflixVideoId": "555",
            "url": "https://www.netflix.com/watch/555"
        }))
        .unwrap();
        assert_eq!(ready.kind(), "CONTENT_READY");

        let vote: BackgroundRequest = serde_json::from_value(json!({
            "type": "VOTE_SKIP",
            "skipGroupId": 7,
            "voteType": -1
        }))
        .unwrap();
        assert_eq!(
            vote,
            BackgroundRequest::VoteOnSkip {
                skip_group_id: 7,
                vote_type: VoteDirection::Down
            }
        );
    }

    #[test]
    fn activation_payload_is_flattened() {
        let request: BackgroundRequest = serde_json::from_value(json!({
            "type": "ACTIVATE_SKIP",
            "contentType": "episode",
            "contentId": 1396,
            "contentTitle": "Breaking Bad",
            "timestamps": [{ "start_time": 0, "end_time": 1000, "type": "Nudity" }],
            "seasonNumber": 1
        }))
        .unwrap();

        let BackgroundRequest::ActivateSkip(activate) = request else {
            panic!("expected ACTIVATE_SKIP");
        };
        assert_eq!(activate.content_type, ContentKind::Episode);
        assert_eq!(activate.timestamps.len(), 1);
        assert_eq!(activate.episode_number, None);
    }

    #[test]
    fn page_commands_nest_payload_under_data() {
        let command = PageCommand::UpdateFabState { is_skipping: true };
        let json = serde_json::to_value(&command).unwrap();
        assert_eq!(json, json!({ "type": "SKIPIT_UPDATE_FAB_STATE", "data": { "isSkipping": true } }));

        let stop = serde_json::to_value(PageCommand::StopSkipChecking).unwrap();
        assert_eq!(stop["type"], "SKIPIT_STOP_SKIP_CHECKING");
    }

    #[test]
    fn failures_decode_as_rejections() {
        let err = decode_reply::<Ack>(json!({ "success": false, "error": "Not authenticated" }))
            .unwrap_err();
        assert_eq!(err, SkipError::Rejected("Not authenticated".into()));

        let ready: ContentReadyReply = decode_reply(json!({ "success": false })).unwrap();
        assert!(!ready.success && !ready.restored);
    }

    #[test]
    fn tab_messages_use_upper_snake_tags() {
        let message = TabMessage::StartSkipping {
            timestamps: vec![],
            content_title: "Heat".into(),
            netflix_video_id: VideoIdentity::new("555"),
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "START_SKIPPING");
        assert_eq!(json["netflixVideoId"], "555");
        assert_eq!(json["contentTitle"], "Heat");
    }
}
