use std::sync::Arc;

use serde::Serialize;
use tokio::{
    sync::{mpsc::UnboundedSender, Mutex},
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    engine::EngineConfig,
    error::SkipResult,
    models::{PendingSkip, VideoIdentity, VoteDirection},
    player::VideoPlayer,
    timeline::{TimelineLayer, TimelineRenderer},
};

use super::{PendingState, PromptChange, PromptPolicy};

// 100ms poll; mute here when it gets noisy.
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PendingEvent {
    PromptShown { skip: PendingSkip },
    PromptHidden { group_id: u64 },
}

impl From<PromptChange> for PendingEvent {
    fn from(change: PromptChange) -> Self {
        match change {
            PromptChange::Show(skip) => PendingEvent::PromptShown { skip },
            PromptChange::Hide { group_id } => PendingEvent::PromptHidden { group_id },
        }
    }
}

/// Polls playback against unverified skip groups and drives the vote prompt.
/// Runs independently of the skip engine.
#[derive(Clone)]
pub struct PendingChecker {
    state: Arc<Mutex<PendingState>>,
    player: Arc<dyn VideoPlayer>,
    timeline: TimelineRenderer,
    events: UnboundedSender<PendingEvent>,
    config: EngineConfig,
    /// Video the pending set was fetched for.
    video: Arc<Mutex<Option<VideoIdentity>>>,
    poll: Arc<Mutex<Option<CancellationToken>>>,
}

impl PendingChecker {
    pub fn new(
        player: Arc<dyn VideoPlayer>,
        timeline: TimelineRenderer,
        config: EngineConfig,
        events: UnboundedSender<PendingEvent>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(PendingState::new())),
            player,
            timeline,
            events,
            config,
            video: Arc::new(Mutex::new(None)),
            poll: Arc::new(Mutex::new(None)),
        }
    }

    fn policy(&self) -> PromptPolicy {
        PromptPolicy {
            lead_ms: self.config.vote_lead_ms,
            display_ms: self.config.vote_display_ms,
            seek_jump_threshold_ms: self.config.seek_jump_threshold_ms,
        }
    }

    pub async fn pending(&self) -> Vec<PendingSkip> {
        self.state.lock().await.pending().to_vec()
    }

    pub async fn active_prompt(&self) -> Option<u64> {
        self.state.lock().await.active_prompt()
    }

    pub async fn has_voted(&self, group_id: u64) -> bool {
        self.state.lock().await.has_voted(group_id)
    }

    /// Replace the pending set, draw its markers and (re)start the poll.
    /// The set belongs to the video the page is on now.
    pub async fn set_pending(&self, pending: Vec<PendingSkip>) {
        *self.video.lock().await = self.player.video_identity();
        let (change, remaining) = {
            let mut state = self.state.lock().await;
            let change = state.replace(pending);
            self.timeline.ensure_pending(state.pending(), true);
            (change, state.pending().len())
        };
        self.emit(change);

        if remaining > 0 {
            log_info!("[Pending] tracking {} unverified skips", remaining);
            self.start_poll().await;
        } else {
            self.stop_poll().await;
        }
    }

    /// Apply a vote the user cast on `group_id`.
    ///
    /// The group disappears from the pending set and its marker goes away
    /// immediately. An upvote also seeks past the segment.
    pub async fn vote(&self, group_id: u64, direction: VoteDirection) -> Option<PendingSkip> {
        let (removed, remaining) = {
            let mut state = self.state.lock().await;
            let removed = state.resolve(group_id);
            self.timeline.ensure_pending(state.pending(), true);
            (removed, state.pending().len())
        };
        self.emit(Some(PromptChange::Hide { group_id }));

        if let (Some(skip), VoteDirection::Up) = (&removed, direction) {
            if let Err(err) = self.player.seek(skip.end_time) {
                log_warn!("[Pending] upvote seek to {}ms failed: {}", skip.end_time, err);
            }
        }

        if remaining == 0 {
            self.stop_poll().await;
        }
        removed
    }

    /// Seek target for a click on a pending marker: a little before the
    /// segment so the prompt has time to show.
    pub async fn marker_seek_target(&self, group_id: u64) -> Option<u64> {
        let state = self.state.lock().await;
        state
            .pending()
            .iter()
            .find(|skip| skip.group_id == group_id)
            .map(|skip| skip.start_time.saturating_sub(self.config.vote_lead_ms))
    }

    /// `Ok(false)` when the group is no longer pending.
    pub async fn click_marker(&self, group_id: u64) -> SkipResult<bool> {
        let Some(target) = self.marker_seek_target(group_id).await else {
            return Ok(false);
        };
        self.player.seek(target)?;
        Ok(true)
    }

    /// Stop polling and hide the prompt. Pending groups and markers stay;
    /// the runtime uses this only on shutdown.
    pub async fn stop(&self) {
        self.stop_poll().await;
        let change = self.state.lock().await.hide_prompt();
        self.emit(change);
    }

    /// Drop every pending group and its markers. Used on navigation,
    /// sign-out and stop-skipping.
    pub async fn clear(&self) {
        self.stop_poll().await;
        *self.video.lock().await = None;
        let change = self.state.lock().await.clear();
        self.timeline.clear(TimelineLayer::Pending);
        self.emit(change);
    }

    async fn start_poll(&self) {
        let mut guard = self.poll.lock().await;
        if let Some(token) = guard.take() {
            token.cancel();
        }

        let token = CancellationToken::new();
        *guard = Some(token.clone());

        let checker = self.clone();
        tokio::spawn(async move {
            let mut interval = time::interval(checker.config.pending_poll());
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => checker.tick().await,
                    _ = token.cancelled() => break,
                }
            }
        });
    }

    async fn stop_poll(&self) {
        if let Some(token) = self.poll.lock().await.take() {
            token.cancel();
        }
    }

    async fn tick(&self) {
        let current = self.player.video_identity();
        let owner = self.video.lock().await.clone();
        if current != owner {
            log_info!(
                "[Pending] page moved from {:?} to {:?}, dropping unverified skips",
                owner,
                current
            );
            self.clear().await;
            return;
        }

        if !self.player.is_ready() {
            return;
        }

        let position = self.player.current_time_ms();
        let paused = self.player.is_paused();
        let change = {
            let mut state = self.state.lock().await;
            // Host may have rebuilt the seek bar since the last tick.
            self.timeline.ensure_pending(state.pending(), false);
            state.step(position, paused, self.config.pending_poll_ms, &self.policy())
        };

        if let Some(PromptChange::Show(skip)) = &change {
            log_info!(
                "[Pending] prompting vote for group {} at {}ms",
                skip.group_id,
                position
            );
        }
        self.emit(change);
    }

    fn emit(&self, change: Option<PromptChange>) {
        if let Some(change) = change {
            let _ = self.events.send(change.into());
        }
    }
}
