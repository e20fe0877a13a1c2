//! Main-world page runtime.
//!
//! Owns the skip engine, the pending vote checker and the state behind the
//! in-player controls. The content script drives it with [`PageCommand`]s;
//! everything it has to say comes back out as [`PageEvent`]s (for the
//! content script) and [`UiUpdate`]s (for whatever paints the controls).

use std::{collections::BTreeSet, sync::Arc};

use tokio::{
    sync::{
        mpsc::{self, UnboundedReceiver, UnboundedSender},
        Mutex,
    },
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    bridge::{PageCommand, PageEvent, UiUpdate},
    engine::{EngineConfig, EngineEvent, SkipEngine},
    models::{SkipTimestamp, VoteDirection},
    pending::{PendingChecker, PendingEvent},
    player::VideoPlayer,
    settings::{CleanContentRule, ExtensionSettings},
    timeline::{TimelineRenderer, TimelineSurface},
    ui::{FabAction, FabState, MarkOutcome, MarkingState, NotificationCenter},
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

struct Controls {
    fab: FabState,
    marking: MarkingState,
    notifications: NotificationCenter,
    /// Fullscreen state captured before a modal took over the page.
    was_fullscreen: bool,
}

/// Receiving ends of the runtime's output.
pub struct RuntimeChannels {
    pub events: UnboundedReceiver<PageEvent>,
    pub ui: UnboundedReceiver<UiUpdate>,
}

#[derive(Clone)]
pub struct PageRuntime {
    player: Arc<dyn VideoPlayer>,
    engine: SkipEngine,
    checker: PendingChecker,
    controls: Arc<Mutex<Controls>>,
    clean_rule: CleanContentRule,
    config: EngineConfig,
    events: UnboundedSender<PageEvent>,
    ui: UnboundedSender<UiUpdate>,
    engine_events: Arc<Mutex<Option<UnboundedReceiver<EngineEvent>>>>,
    pending_events: Arc<Mutex<Option<UnboundedReceiver<PendingEvent>>>>,
    pumps: Arc<Mutex<Vec<JoinHandle<()>>>>,
    readiness: Arc<Mutex<Option<CancellationToken>>>,
}

impl PageRuntime {
    pub fn new(
        player: Arc<dyn VideoPlayer>,
        surface: Arc<dyn TimelineSurface>,
        settings: &ExtensionSettings,
    ) -> (Self, RuntimeChannels) {
        let config = settings.engine.clone();
        let timeline = TimelineRenderer::new(surface);

        let (engine_tx, engine_rx) = mpsc::unbounded_channel();
        let (pending_tx, pending_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (ui_tx, ui_rx) = mpsc::unbounded_channel();

        let engine = SkipEngine::new(player.clone(), timeline.clone(), config.clone(), engine_tx);
        let checker = PendingChecker::new(player.clone(), timeline, config.clone(), pending_tx);

        let controls = Controls {
            fab: FabState::new(),
            marking: MarkingState::new(),
            notifications: NotificationCenter::new(
                config.notification_segment_cooldown(),
                config.notification_display(),
            ),
            was_fullscreen: false,
        };

        let runtime = Self {
            player,
            engine,
            checker,
            controls: Arc::new(Mutex::new(controls)),
            clean_rule: settings.clean_content_rule,
            config,
            events: events_tx,
            ui: ui_tx,
            engine_events: Arc::new(Mutex::new(Some(engine_rx))),
            pending_events: Arc::new(Mutex::new(Some(pending_rx))),
            pumps: Arc::new(Mutex::new(Vec::new())),
            readiness: Arc::new(Mutex::new(None)),
        };

        (
            runtime,
            RuntimeChannels {
                events: events_rx,
                ui: ui_rx,
            },
        )
    }

    pub fn engine(&self) -> &SkipEngine {
        &self.engine
    }

    pub fn checker(&self) -> &PendingChecker {
        &self.checker
    }

    /// Start forwarding engine and checker events, and wait for the player.
    /// Calling it twice only restarts the readiness poll.
    pub async fn start(&self) {
        self.spawn_pumps().await;
        self.spawn_readiness_poll().await;
    }

    pub async fn shutdown(&self) {
        if let Some(token) = self.readiness.lock().await.take() {
            token.cancel();
        }
        self.engine.shutdown().await;
        self.checker.stop().await;
        for handle in self.pumps.lock().await.drain(..) {
            handle.abort();
        }
        log_info!("[Runtime] shut down");
    }

    pub async fn handle_command(&self, command: PageCommand) {
        match command {
            PageCommand::StartSkipChecking { timestamps } => self.start_skipping(timestamps).await,
            PageCommand::StopSkipChecking => self.stop_skipping().await,
            PageCommand::GetNetflixMetadata => {
                self.emit(PageEvent::NetflixMetadata {
                    metadata: self.player.extract_metadata(),
                });
            }
            PageCommand::UpdateFabState { is_skipping } => {
                let mut controls = self.controls.lock().await;
                if is_skipping {
                    controls.fab.skipping = true;
                } else {
                    controls.fab.set_skipping(false, BTreeSet::new());
                }
                self.paint_fab(&controls);
            }
            PageCommand::LoadingStatus { status } => {
                let mut controls = self.controls.lock().await;
                controls.fab.set_loading(status);
                self.paint_fab(&controls);
            }
            PageCommand::SetAvailableSkipTypes {
                skip_types,
                is_clean,
            } => {
                let mut controls = self.controls.lock().await;
                controls.fab.set_available(skip_types, is_clean);
                self.paint_fab(&controls);
            }
            PageCommand::SetPendingSkips { pending_skips } => {
                self.checker.set_pending(pending_skips).await;
            }
            PageCommand::AuthStateUpdate { is_authenticated } => {
                self.apply_auth(is_authenticated).await;
            }
            PageCommand::VoteResult { success, error } => {
                if success {
                    let mut controls = self.controls.lock().await;
                    let notification = controls.notifications.vote_thanks(Instant::now());
                    self.paint(UiUpdate::ShowNotification { notification });
                } else {
                    log_warn!(
                        "[Runtime] vote was not recorded: {}",
                        error.as_deref().unwrap_or("unknown error")
                    );
                }
            }
            PageCommand::ModalClosed => {
                let was_fullscreen = {
                    let mut controls = self.controls.lock().await;
                    std::mem::take(&mut controls.was_fullscreen)
                };
                self.player.play();
                if was_fullscreen {
                    self.player.enter_fullscreen();
                }
            }
            PageCommand::ResetMarking => {
                let mut controls = self.controls.lock().await;
                controls.marking.reset();
                self.paint_mark(&controls);
            }
        }
    }

    /// Press of the in-player skip button.
    pub async fn fab_click(&self) {
        let action = self.controls.lock().await.fab.click();
        match action {
            FabAction::Ignore => {}
            FabAction::RequestAuth => self.emit(PageEvent::OpenAuthPopup),
            FabAction::Stop => self.emit(PageEvent::StopRequest),
            FabAction::AutoStart(skip_type) => self.emit(PageEvent::AutoStartSkipping {
                metadata: self.player.extract_metadata(),
                skip_type,
            }),
            FabAction::OpenQuickPanel => {
                self.hand_over_to_modal().await;
                self.emit(PageEvent::FabClicked {
                    metadata: self.player.extract_metadata(),
                });
            }
        }
    }

    /// Press of the mark button. The first press records the start, the
    /// second the end; the pair goes out ordered.
    pub async fn mark_click(&self) {
        let now_ms = self.player.current_time_ms();
        let outcome = {
            let mut controls = self.controls.lock().await;
            let authenticated = controls.fab.authenticated;
            let outcome = controls.marking.toggle(now_ms, authenticated);
            self.paint_mark(&controls);
            outcome
        };

        match outcome {
            MarkOutcome::AuthRequired => self.emit(PageEvent::OpenAuthPopup),
            MarkOutcome::Started { start_ms } => {
                log_info!("[Runtime] marking from {}ms", start_ms);
                self.emit(PageEvent::MarkStarted {
                    start_time: start_ms,
                });
            }
            MarkOutcome::Ended { start_ms, end_ms } => {
                self.hand_over_to_modal().await;
                self.emit(PageEvent::MarkEnded {
                    start_time: start_ms,
                    end_time: end_ms,
                    metadata: self.player.extract_metadata(),
                });
            }
            MarkOutcome::Discarded => log_info!("[Runtime] discarded zero-length mark"),
        }
    }

    /// Vote on the prompt for `group_id`. Unknown or already-resolved groups
    /// are ignored.
    pub async fn vote(&self, group_id: u64, direction: VoteDirection) -> bool {
        if self.checker.vote(group_id, direction).await.is_none() {
            return false;
        }
        self.emit(PageEvent::SkipVote {
            skip_group_id: group_id,
            vote_type: direction,
        });
        true
    }

    /// Click on a pending marker: seek to just before it.
    pub async fn marker_click(&self, group_id: u64) -> bool {
        match self.checker.click_marker(group_id).await {
            Ok(seeked) => seeked,
            Err(err) => {
                log_warn!("[Runtime] could not seek to pending skip {}: {}", group_id, err);
                false
            }
        }
    }

    async fn start_skipping(&self, timestamps: Vec<SkipTimestamp>) {
        let active: BTreeSet<_> = timestamps.iter().map(|ts| ts.category).collect();
        if !self.engine.start(timestamps).await {
            return;
        }
        let mut controls = self.controls.lock().await;
        controls.fab.set_skipping(true, active);
        self.paint_fab(&controls);
    }

    /// Stop skipping and drop the pending groups along with their markers.
    async fn stop_skipping(&self) {
        self.engine.stop().await;
        self.checker.clear().await;
        let mut controls = self.controls.lock().await;
        controls.fab.set_skipping(false, BTreeSet::new());
        controls.notifications.reset();
        self.paint_fab(&controls);
        self.paint(UiUpdate::HideNotification);
    }

    async fn apply_auth(&self, authenticated: bool) {
        let was_authenticated = {
            let mut controls = self.controls.lock().await;
            let previous = controls.fab.authenticated;
            controls.fab.authenticated = authenticated;
            previous
        };

        if !authenticated {
            if self.engine.is_skipping().await {
                self.stop_skipping().await;
            } else {
                self.checker.clear().await;
            }
        } else if !was_authenticated {
            let mut controls = self.controls.lock().await;
            controls.fab.reset_for_new_video();
            drop(controls);
            // Re-run detection now that lookups are allowed.
            if let Some(metadata) = self.player.extract_metadata() {
                self.emit(PageEvent::MetadataReady { metadata });
            }
        }

        let controls = self.controls.lock().await;
        self.paint_fab(&controls);
        self.paint_mark(&controls);
    }

    /// Pause and leave fullscreen before the content script opens a modal.
    async fn hand_over_to_modal(&self) {
        self.controls.lock().await.was_fullscreen = self.player.is_fullscreen();
        self.player.pause();
        self.player.exit_fullscreen();
    }

    async fn spawn_pumps(&self) {
        let mut pumps = self.pumps.lock().await;

        if let Some(mut engine_events) = self.engine_events.lock().await.take() {
            let runtime = self.clone();
            pumps.push(tokio::spawn(async move {
                while let Some(event) = engine_events.recv().await {
                    runtime.on_engine_event(event).await;
                }
            }));
        }

        if let Some(mut pending_events) = self.pending_events.lock().await.take() {
            let runtime = self.clone();
            pumps.push(tokio::spawn(async move {
                while let Some(event) = pending_events.recv().await {
                    runtime.on_pending_event(event);
                }
            }));
        }
    }

    async fn spawn_readiness_poll(&self) {
        let mut guard = self.readiness.lock().await;
        if let Some(token) = guard.take() {
            token.cancel();
        }
        let token = CancellationToken::new();
        *guard = Some(token.clone());

        let runtime = self.clone();
        tokio::spawn(async move {
            let mut interval = time::interval(runtime.config.readiness_poll());
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if runtime.player.is_ready() {
                            runtime.on_player_ready().await;
                            break;
                        }
                    }
                    _ = token.cancelled() => break,
                }
            }
        });
    }

    async fn on_player_ready(&self) {
        log_info!("[Runtime] player ready");
        self.emit(PageEvent::NetflixReady);
        self.emit(PageEvent::RequestAuthCheck);
        self.engine.start_video_change_watcher().await;

        let controls = self.controls.lock().await;
        self.paint_fab(&controls);
        self.paint_mark(&controls);
    }

    async fn on_engine_event(&self, event: EngineEvent) {
        match event {
            EngineEvent::Skipped(notice) => {
                let mut controls = self.controls.lock().await;
                if let Some(notification) = controls.notifications.on_skip(&notice, Instant::now()) {
                    self.paint(UiUpdate::ShowNotification { notification });
                }
            }
            EngineEvent::StateChanged { skipping, .. } => {
                let mut controls = self.controls.lock().await;
                if !skipping && controls.fab.skipping {
                    controls.fab.set_skipping(false, BTreeSet::new());
                    controls.notifications.reset();
                    self.paint(UiUpdate::HideNotification);
                }
                self.paint_fab(&controls);
            }
            EngineEvent::VideoChanged { previous, current } => {
                log_info!("[Runtime] title changed {} -> {}", previous, current);
                self.checker.clear().await;
                let mut controls = self.controls.lock().await;
                controls.marking.reset();
                controls.fab.reset_for_new_video();
                self.paint_fab(&controls);
                self.paint_mark(&controls);
            }
            EngineEvent::Navigated { from, to } => {
                log_info!("[Runtime] left video {} for {:?}", from, to);
                self.checker.clear().await;
                let mut controls = self.controls.lock().await;
                controls.marking.reset();
                self.paint_mark(&controls);
            }
            EngineEvent::MetadataReady { metadata } => {
                self.emit(PageEvent::MetadataReady { metadata });
            }
        }
    }

    fn on_pending_event(&self, event: PendingEvent) {
        log_debug!("[Runtime] vote prompt: {:?}", event);
        let skip = match event {
            PendingEvent::PromptShown { skip } => Some(skip),
            PendingEvent::PromptHidden { .. } => None,
        };
        self.paint(UiUpdate::VotePrompt { skip });
    }

    fn paint_fab(&self, controls: &Controls) {
        self.paint(UiUpdate::Fab {
            view: controls.fab.view(),
            visibility: controls.fab.visibility(self.clean_rule),
        });
    }

    fn paint_mark(&self, controls: &Controls) {
        self.paint(UiUpdate::MarkButton {
            label: controls.marking.label(controls.fab.authenticated).to_string(),
            marking: controls.marking.is_marking(),
        });
    }

    fn paint(&self, update: UiUpdate) {
        let _ = self.ui.send(update);
    }

    fn emit(&self, event: PageEvent) {
        let _ = self.events.send(event);
    }
}
