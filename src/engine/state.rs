use std::collections::BTreeSet;

use serde::Serialize;
use tokio::time::{Duration, Instant};

use crate::{
    models::{ContentDescriptor, SkipCategory, SkipTimestamp, VideoIdentity},
    ranges::{merge_timestamps, MergedSkipRange},
};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum EngineStatus {
    #[default]
    Idle,
    Skipping,
}

/// What one tick decided to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipDecision {
    pub from_ms: u64,
    pub seek_to_ms: u64,
    pub range: MergedSkipRange,
}

/// In-page skip state.
///
/// `status` is written by [`SkipState::begin`] and [`SkipState::stop`]
/// only. Ticks read it and write `last_skip_at`, nothing else.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkipState {
    pub status: EngineStatus,
    pub active_ranges: Vec<MergedSkipRange>,
    /// Unmerged input, kept for the timeline.
    pub timestamps: Vec<SkipTimestamp>,
    pub active_types: BTreeSet<SkipCategory>,
    pub video_identity_at_start: Option<VideoIdentity>,
    #[serde(skip)]
    pub last_skip_at: Option<Instant>,
    /// Last stable session id seen by the video-change watcher. Survives stop.
    pub last_session_id: Option<String>,
    pub last_metadata: Option<ContentDescriptor>,
}

impl SkipState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_skipping(&self) -> bool {
        self.status == EngineStatus::Skipping
    }

    pub fn begin(&mut self, identity: VideoIdentity, timestamps: Vec<SkipTimestamp>) {
        self.status = EngineStatus::Skipping;
        self.active_ranges = merge_timestamps(&timestamps);
        self.active_types = timestamps.iter().map(|ts| ts.category).collect();
        self.timestamps = timestamps;
        self.video_identity_at_start = Some(identity);
        self.last_skip_at = None;
    }

    pub fn stop(&mut self) {
        self.status = EngineStatus::Idle;
        self.active_ranges.clear();
        self.timestamps.clear();
        self.active_types.clear();
        self.video_identity_at_start = None;
        self.last_skip_at = None;
    }

    /// Timeline data, present only while this state owns the layer.
    pub fn render_source(&self) -> Option<&[SkipTimestamp]> {
        if self.is_skipping() && self.video_identity_at_start.is_some() {
            Some(&self.timestamps)
        } else {
            None
        }
    }

    pub fn in_cooldown(&self, at: Instant, cooldown: Duration) -> bool {
        self.last_skip_at
            .is_some_and(|last| at.saturating_duration_since(last) < cooldown)
    }

    /// First merged range containing `position_ms`, unless a seek happened
    /// less than `cooldown` ago.
    pub fn decide(&self, position_ms: u64, at: Instant, cooldown: Duration) -> Option<SkipDecision> {
        if !self.is_skipping() || self.in_cooldown(at, cooldown) {
            return None;
        }

        self.active_ranges
            .iter()
            .find(|range| range.contains(position_ms))
            .map(|range| SkipDecision {
                from_ms: position_ms,
                seek_to_ms: range.end_ms,
                range: range.clone(),
            })
    }

    pub fn record_skip(&mut self, at: Instant) {
        self.last_skip_at = Some(at);
    }
}
