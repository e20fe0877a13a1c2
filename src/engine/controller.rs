use std::sync::Arc;

use tokio::{
    sync::{mpsc::UnboundedSender, Mutex},
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    models::{ContentDescriptor, SkipTimestamp},
    player::VideoPlayer,
    timeline::{TimelineLayer, TimelineRenderer},
};

use super::{EngineConfig, EngineEvent, SkipNotice, SkipState};

// Skip poll runs every 50ms; flip to mute it.
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

enum Tick {
    Idle,
    Waiting,
    Skipped,
}

/// Skip-decision engine for one loaded page.
///
/// Owns the 50ms skip poll (which also keeps the timeline mounted) and the
/// 2s video-change watcher. `start` and `stop` are the only entry points that
/// change whether skipping is active.
#[derive(Clone)]
pub struct SkipEngine {
    state: Arc<Mutex<SkipState>>,
    player: Arc<dyn VideoPlayer>,
    timeline: TimelineRenderer,
    events: UnboundedSender<EngineEvent>,
    config: EngineConfig,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
    watcher: Arc<Mutex<Option<CancellationToken>>>,
}

impl SkipEngine {
    pub fn new(
        player: Arc<dyn VideoPlayer>,
        timeline: TimelineRenderer,
        config: EngineConfig,
        events: UnboundedSender<EngineEvent>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(SkipState::new())),
            player,
            timeline,
            events,
            config,
            ticker: Arc::new(Mutex::new(None)),
            watcher: Arc::new(Mutex::new(None)),
        }
    }

    pub fn player(&self) -> &Arc<dyn VideoPlayer> {
        &self.player
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn snapshot(&self) -> SkipState {
        self.state.lock().await.clone()
    }

    pub async fn is_skipping(&self) -> bool {
        self.state.lock().await.is_skipping()
    }

    /// Begin skipping `timestamps` on the current watch page.
    ///
    /// Returns `false` without touching any state when the page URL has no
    /// video identity. A running poll is replaced, never duplicated.
    pub async fn start(&self, timestamps: Vec<SkipTimestamp>) -> bool {
        let Some(identity) = self.player.video_identity() else {
            log_warn!("[Engine] cannot start skipping: not on a /watch/ page");
            return false;
        };
        let metadata = self.player.extract_metadata();

        {
            let mut state = self.state.lock().await;
            state.begin(identity.clone(), timestamps);
            if let Some(metadata) = &metadata {
                state.last_session_id = Some(metadata.stable_session_id.clone());
                state.last_metadata = Some(metadata.clone());
            }
            self.timeline.ensure_active(state.render_source(), true);

            log_info!(
                "[Engine] skipping {} ranges ({} timestamps) on video {}",
                state.active_ranges.len(),
                state.timestamps.len(),
                identity
            );
        }

        self.spawn_ticker().await;
        self.emit(EngineEvent::StateChanged {
            skipping: true,
            metadata,
        });
        true
    }

    pub async fn stop(&self) {
        self.cancel_ticker().await;
        self.halt().await;
    }

    /// Start the 2s stable-session-id poll. Calling it again is a no-op.
    pub async fn start_video_change_watcher(&self) {
        let mut guard = self.watcher.lock().await;
        if guard.is_some() {
            log_info!("[Engine] video change watcher already running");
            return;
        }

        let token = CancellationToken::new();
        *guard = Some(token.clone());

        let engine = self.clone();
        tokio::spawn(async move {
            let mut interval = time::interval(engine.config.video_change_poll());
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => engine.check_video_change().await,
                    _ = token.cancelled() => {
                        log_info!("[Engine] video change watcher shutting down");
                        break;
                    }
                }
            }
        });
    }

    /// Stop skipping and every background poll owned by the engine.
    pub async fn shutdown(&self) {
        if let Some(token) = self.watcher.lock().await.take() {
            token.cancel();
        }
        self.stop().await;
    }

    async fn spawn_ticker(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(handle) = ticker_guard.take() {
            handle.abort();
        }

        let engine = self.clone();
        let handle = tokio::spawn(async move {
            let mut skip_interval = time::interval(engine.config.skip_poll());
            skip_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut chrome_interval = time::interval(engine.config.timeline_retry());
            chrome_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = skip_interval.tick() => {
                        if let Tick::Idle = engine.tick().await {
                            break;
                        }
                    }
                    _ = chrome_interval.tick() => {
                        if !engine.keep_chrome().await {
                            break;
                        }
                    }
                }
            }
        });

        *ticker_guard = Some(handle);
    }

    async fn cancel_ticker(&self) {
        if let Some(handle) = self.ticker.lock().await.take() {
            handle.abort();
        }
    }

    async fn tick(&self) -> Tick {
        let mut state = self.state.lock().await;
        if !state.is_skipping() {
            return Tick::Idle;
        }
        if !self.player.is_ready() {
            return Tick::Waiting;
        }

        let position = self.player.current_time_ms();
        let at = Instant::now();
        let Some(decision) = state.decide(position, at, self.config.skip_cooldown()) else {
            return Tick::Waiting;
        };

        // Leave state untouched; the next tick re-checks readiness.
        if let Err(err) = self.player.seek(decision.seek_to_ms) {
            log_warn!("[Engine] seek to {}ms failed: {}", decision.seek_to_ms, err);
            return Tick::Waiting;
        }
        state.record_skip(at);
        drop(state);

        log_info!(
            "[Engine] skipped {}ms -> {}ms ({:?})",
            decision.from_ms,
            decision.seek_to_ms,
            decision.range.types
        );

        self.emit(EngineEvent::Skipped(SkipNotice {
            from_ms: decision.from_ms,
            to_ms: decision.seek_to_ms,
            range: decision.range,
            request_vote: false,
        }));
        Tick::Skipped
    }

    /// Re-mount the timeline if the host dropped it. Returns `false` once
    /// skipping is over so the poll loop can exit.
    async fn keep_chrome(&self) -> bool {
        let state = self.state.lock().await;
        if !state.is_skipping() {
            return false;
        }

        let current = self.player.video_identity();
        if current.as_ref() != state.video_identity_at_start.as_ref() {
            log_info!(
                "[Engine] page left video {:?} (now {:?}), stopping",
                state.video_identity_at_start,
                current
            );
            let from = state.video_identity_at_start.clone();
            drop(state);
            self.halt().await;
            if let Some(from) = from {
                self.emit(EngineEvent::Navigated { from, to: current });
            }
            return false;
        }

        self.timeline.ensure_active(state.render_source(), false);
        true
    }

    /// Clear skip state and tell listeners. Does not touch the ticker handle,
    /// so it is safe to call from inside the poll.
    async fn halt(&self) {
        let metadata = self.player.extract_metadata();
        let was_skipping = {
            let mut state = self.state.lock().await;
            let was_skipping = state.is_skipping();
            state.stop();
            was_skipping
        };
        self.timeline.clear(TimelineLayer::Active);

        if was_skipping {
            log_info!("[Engine] skipping stopped");
        }
        self.emit(EngineEvent::StateChanged {
            skipping: false,
            metadata,
        });
    }

    async fn check_video_change(&self) {
        let Some(metadata) = self.player.extract_metadata() else {
            return;
        };

        let (previous, skipping, metadata_changed) = {
            let state = self.state.lock().await;
            (
                state.last_session_id.clone(),
                state.is_skipping(),
                state.last_metadata.as_ref() != Some(&metadata),
            )
        };

        match previous {
            None => {
                self.remember(&metadata).await;
                self.emit(EngineEvent::MetadataReady { metadata });
            }
            Some(previous) if previous != metadata.stable_session_id => {
                log_info!(
                    "[Engine] video changed: {} -> {}",
                    previous,
                    metadata.stable_session_id
                );
                if skipping {
                    self.stop().await;
                }
                self.remember(&metadata).await;
                self.emit(EngineEvent::VideoChanged {
                    previous,
                    current: metadata.stable_session_id.clone(),
                });
                self.emit(EngineEvent::MetadataReady { metadata });
            }
            Some(_) if metadata_changed => {
                self.remember(&metadata).await;
                self.emit(EngineEvent::StateChanged {
                    skipping,
                    metadata: Some(metadata),
                });
            }
            Some(_) => {}
        }
    }

    async fn remember(&self, metadata: &ContentDescriptor) {
        let mut state = self.state.lock().await;
        state.last_session_id = Some(metadata.stable_session_id.clone());
        state.last_metadata = Some(metadata.clone());
    }

    fn emit(&self, event: EngineEvent) {
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use crate::{
        error::{SkipError, SkipResult},
        models::{ContentDescriptor, ContentKind, VideoIdentity},
        player::VideoPlayer,
    };

    /// Player whose position only moves when the test says so, like the
    /// real one lagging behind a seek.
    pub struct FakePlayer {
        pub ready: Mutex<bool>,
        pub position: Mutex<u64>,
        pub identity: Mutex<Option<VideoIdentity>>,
        pub metadata: Mutex<Option<ContentDescriptor>>,
        pub seeks: Mutex<Vec<u64>>,
        pub fail_seeks: Mutex<bool>,
        pub paused: Mutex<bool>,
        pub fullscreen: Mutex<bool>,
    }

    impl FakePlayer {
        pub fn on_watch(id: &str) -> Self {
            Self {
                ready: Mutex::new(true),
                position: Mutex::new(0),
                identity: Mutex::new(Some(VideoIdentity::new(id))),
                metadata: Mutex::new(Some(Self::descriptor("sess-1"))),
                seeks: Mutex::new(Vec::new()),
                fail_seeks: Mutex::new(false),
                paused: Mutex::new(false),
                fullscreen: Mutex::new(false),
            }
        }

        pub fn descriptor(session: &str) -> ContentDescriptor {
            ContentDescriptor {
                title: "Heat".into(),
                content_kind: ContentKind::Movie,
                season_number: None,
                episode_number: None,
                episode_title: None,
                stable_session_id: session.into(),
            }
        }

        pub fn set_position(&self, ms: u64) {
            *self.position.lock().unwrap() = ms;
        }

        pub fn seeks(&self) -> Vec<u64> {
            self.seeks.lock().unwrap().clone()
        }
    }

    impl VideoPlayer for FakePlayer {
        fn is_ready(&self) -> bool {
            *self.ready.lock().unwrap()
        }
        fn current_time_ms(&self) -> u64 {
            *self.position.lock().unwrap()
        }
        fn seek(&self, ms: u64) -> SkipResult<()> {
            if *self.fail_seeks.lock().unwrap() {
                return Err(SkipError::PlayerUnavailable);
            }
            self.seeks.lock().unwrap().push(ms);
            Ok(())
        }
        fn extract_metadata(&self) -> Option<ContentDescriptor> {
            self.metadata.lock().unwrap().clone()
        }
        fn video_identity(&self) -> Option<VideoIdentity> {
            self.identity.lock().unwrap().clone()
        }
        fn is_paused(&self) -> bool {
            *self.paused.lock().unwrap()
        }
        fn pause(&self) {
            *self.paused.lock().unwrap() = true;
        }
        fn play(&self) {
            *self.paused.lock().unwrap() = false;
        }
        fn exit_fullscreen(&self) {
            *self.fullscreen.lock().unwrap() = false;
        }
        fn enter_fullscreen(&self) {
            *self.fullscreen.lock().unwrap() = true;
        }
        fn is_fullscreen(&self) -> bool {
            *self.fullscreen.lock().unwrap()
        }
    }
}
