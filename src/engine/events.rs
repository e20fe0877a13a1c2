use serde::Serialize;

use crate::{
    models::{ContentDescriptor, VideoIdentity},
    ranges::MergedSkipRange,
};

/// A seek the engine just performed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkipNotice {
    pub from_ms: u64,
    pub to_ms: u64,
    pub range: MergedSkipRange,
    /// Confirmed ranges never ask for a vote; kept so the notification layer
    /// has a single shape for both kinds of skip.
    pub request_vote: bool,
}

/// Everything the engine tells the rest of the runtime.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EngineEvent {
    Skipped(SkipNotice),
    StateChanged {
        skipping: bool,
        metadata: Option<ContentDescriptor>,
    },
    /// First sighting of a title, or a new title after a change.
    MetadataReady { metadata: ContentDescriptor },
    /// Stable session id moved under us. Skipping, if any, is already stopped.
    VideoChanged { previous: String, current: String },
    /// The page URL left the video skipping started on. Skipping is already
    /// stopped.
    Navigated {
        from: VideoIdentity,
        to: Option<VideoIdentity>,
    },
}
