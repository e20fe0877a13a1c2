use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timing knobs for the in-page pollers. All values are milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Skip-check poll period
    pub skip_poll_ms: u64,

    /// Minimum gap between two seeks; covers the player's lag in reporting
    /// the post-seek position
    pub skip_cooldown_ms: u64,

    /// Player session id comparison period
    pub video_change_poll_ms: u64,

    /// Timeline re-render check period (also the retry delay while the
    /// seek bar is missing)
    pub timeline_retry_ms: u64,

    /// Pending-verification poll period
    pub pending_poll_ms: u64,

    /// Vote prompt shows this long before a pending segment starts
    pub vote_lead_ms: u64,

    /// Played time a vote prompt stays visible per visit
    pub vote_display_ms: u64,

    /// A jump larger than this between two pending ticks counts as a seek
    pub seek_jump_threshold_ms: u64,

    /// Same merged span is not re-notified within this window
    pub notification_segment_cooldown_ms: u64,

    /// Notification auto-dismiss
    pub notification_display_ms: u64,

    /// Player readiness poll period
    pub readiness_poll_ms: u64,

    /// Content script -> runtime metadata round trip
    pub metadata_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            skip_poll_ms: 50,
            skip_cooldown_ms: 500,
            video_change_poll_ms: 2000,
            timeline_retry_ms: 500,
            pending_poll_ms: 100,
            vote_lead_ms: 3000,
            vote_display_ms: 5000,
            seek_jump_threshold_ms: 500,
            notification_segment_cooldown_ms: 5000,
            notification_display_ms: 4000,
            readiness_poll_ms: 500,
            metadata_timeout_ms: 2000,
        }
    }
}

impl EngineConfig {
    pub fn skip_poll(&self) -> Duration {
        Duration::from_millis(self.skip_poll_ms.max(1))
    }

    pub fn skip_cooldown(&self) -> Duration {
        Duration::from_millis(self.skip_cooldown_ms)
    }

    pub fn video_change_poll(&self) -> Duration {
        Duration::from_millis(self.video_change_poll_ms.max(1))
    }

    pub fn timeline_retry(&self) -> Duration {
        Duration::from_millis(self.timeline_retry_ms.max(1))
    }

    pub fn pending_poll(&self) -> Duration {
        Duration::from_millis(self.pending_poll_ms.max(1))
    }

    pub fn readiness_poll(&self) -> Duration {
        Duration::from_millis(self.readiness_poll_ms.max(1))
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_millis(self.metadata_timeout_ms)
    }

    pub fn notification_segment_cooldown(&self) -> Duration {
        Duration::from_millis(self.notification_segment_cooldown_ms)
    }

    pub fn notification_display(&self) -> Duration {
        Duration::from_millis(self.notification_display_ms)
    }
}
