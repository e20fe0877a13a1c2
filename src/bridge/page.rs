use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::{
    sync::watch,
    time::{self, Duration, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    api::TimestampCounts,
    error::{Failure, SkipError, SkipResult},
    models::{ContentDescriptor, SkipCategory, SkipPreferences, SkipTimestamp, VideoIdentity, VoteDirection},
    settings::ExtensionSettings,
    ui::{normalize_mark, LoadingStatus},
};

use super::{
    cache::MatchCache,
    protocol::{
        decode_reply, reply, Ack, AuthStatusReply, AvailableSkipsReply, BackgroundRequest,
        ContentReadyReply, DetectedContent, DetectedContentReply, MatchContentRequest, MatchReply,
        PageCommand, PageEvent, PendingSkipsReply, PingReply, QuickSkipRequest,
        SaveTimestampRequest, TabMessage, VoteReply,
    },
};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// `chrome.runtime.sendMessage` from the content script.
#[async_trait]
pub trait BackgroundChannel: Send + Sync {
    async fn send(&self, request: BackgroundRequest) -> SkipResult<Value>;
}

/// The content script's view of its page: location, script injection and
/// `window.postMessage` to the main-world runtime.
#[async_trait]
pub trait WindowChannel: Send + Sync {
    fn location(&self) -> String;

    /// Append the main-world script and resolve once it has loaded.
    async fn inject_runtime(&self) -> SkipResult<()>;

    fn post(&self, command: PageCommand);

    /// Post `SKIPIT_GET_NETFLIX_METADATA` and wait for the runtime's
    /// `SKIPIT_NETFLIX_METADATA`. May never resolve; callers bound it.
    async fn request_metadata(&self) -> SkipResult<Option<ContentDescriptor>>;

    fn open_url(&self, url: &str);
}

/// Lifecycle of one loaded page as the content script sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BridgePhase {
    Uninjected,
    WaitingForPlayer,
    PlayerReady,
    Idle,
    Skipping,
}

impl BridgePhase {
    pub fn player_ready(&self) -> bool {
        matches!(self, BridgePhase::PlayerReady | BridgePhase::Idle | BridgePhase::Skipping)
    }
}

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub metadata_timeout: Duration,
    pub player_ready_timeout: Duration,
    pub auth_poll: Duration,
    /// Web app origin; the sign-in page is the fallback when the popup
    /// cannot be opened.
    pub app_url: String,
}

impl BridgeConfig {
    pub fn from_settings(settings: &ExtensionSettings) -> Self {
        Self {
            metadata_timeout: settings.engine.metadata_timeout(),
            app_url: settings.environment.app_url().to_string(),
            ..Self::default()
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            metadata_timeout: Duration::from_secs(2),
            player_ready_timeout: Duration::from_secs(10),
            auth_poll: Duration::from_secs(3),
            app_url: ExtensionSettings::default().environment.app_url().to_string(),
        }
    }
}

/// A finished mark waiting for the user to pick a category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkDraft {
    pub start_ms: u64,
    pub end_ms: u64,
    pub content: Option<DetectedContent>,
}

/// What the quick panel needs after a FAB click.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickPanel {
    pub content: DetectedContent,
    pub counts: TimestampCounts,
}

#[derive(Debug, Default)]
struct BridgeState {
    injected: bool,
    is_skipping: bool,
    current_video: Option<VideoIdentity>,
    content_title: Option<String>,
    last_metadata: Option<ContentDescriptor>,
    authenticated: Option<bool>,
    mark_draft: Option<MarkDraft>,
    quick_panel: Option<QuickPanel>,
}

/// Content-script side of one Netflix page.
///
/// Relays between the background and the main-world runtime and owns script
/// injection. No lock is held across a send, because the background may call
/// back into [`PageBridge::handle_tab_message`] while answering.
#[derive(Clone)]
pub struct PageBridge {
    window: Arc<dyn WindowChannel>,
    background: Arc<dyn BackgroundChannel>,
    config: BridgeConfig,
    state: Arc<Mutex<BridgeState>>,
    cache: Arc<Mutex<MatchCache>>,
    phase: Arc<watch::Sender<BridgePhase>>,
    auth_watcher: Arc<Mutex<Option<CancellationToken>>>,
}

impl PageBridge {
    pub fn new(
        window: Arc<dyn WindowChannel>,
        background: Arc<dyn BackgroundChannel>,
        config: BridgeConfig,
    ) -> Self {
        let (phase, _) = watch::channel(BridgePhase::Uninjected);
        Self {
            window,
            background,
            config,
            state: Arc::new(Mutex::new(BridgeState::default())),
            cache: Arc::new(Mutex::new(MatchCache::default())),
            phase: Arc::new(phase),
            auth_watcher: Arc::new(Mutex::new(None)),
        }
    }

    fn state(&self) -> MutexGuard<'_, BridgeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cache(&self) -> MutexGuard<'_, MatchCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn phase(&self) -> BridgePhase {
        *self.phase.borrow()
    }

    pub fn is_skipping(&self) -> bool {
        self.state().is_skipping
    }

    pub fn last_metadata(&self) -> Option<ContentDescriptor> {
        self.state().last_metadata.clone()
    }

    pub fn mark_draft(&self) -> Option<MarkDraft> {
        self.state().mark_draft.clone()
    }

    pub fn quick_panel(&self) -> Option<QuickPanel> {
        self.state().quick_panel.clone()
    }

    fn set_phase(&self, phase: BridgePhase) {
        self.phase.send_if_modified(|current| {
            if *current == phase {
                false
            } else {
                log_info!("[Bridge] {:?} -> {:?}", current, phase);
                *current = phase;
                true
            }
        });
    }

    /// Ready but not skipping. Leaves `Skipping` alone.
    fn settle_idle(&self) {
        if self.phase() != BridgePhase::Skipping && self.phase().player_ready() {
            self.set_phase(BridgePhase::Idle);
        }
    }

    async fn request<T: DeserializeOwned>(&self, request: BackgroundRequest) -> SkipResult<T> {
        let kind = request.kind();
        let value = self.background.send(request).await.map_err(|err| {
            log_warn!("[Bridge] {} failed: {}", kind, err);
            err
        })?;
        decode_reply(value)
    }

    /// Inject the runtime when on Netflix. Safe to call repeatedly.
    pub async fn initialize(&self) -> SkipResult<()> {
        let location = self.window.location();
        if !location.contains("netflix.com") {
            return Ok(());
        }
        self.state().current_video = VideoIdentity::from_url(&location);
        self.ensure_injected().await
    }

    async fn ensure_injected(&self) -> SkipResult<()> {
        {
            let mut state = self.state();
            if state.injected {
                return Ok(());
            }
            state.injected = true;
        }

        if let Err(err) = self.window.inject_runtime().await {
            log_warn!("[Bridge] failed to inject runtime: {}", err);
            self.state().injected = false;
            return Err(err);
        }

        if self.phase() == BridgePhase::Uninjected {
            self.set_phase(BridgePhase::WaitingForPlayer);
        }
        Ok(())
    }

    async fn wait_for_player(&self) -> SkipResult<()> {
        let mut phase = self.phase.subscribe();
        let result = match time::timeout(
            self.config.player_ready_timeout,
            phase.wait_for(BridgePhase::player_ready),
        )
        .await
        {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(SkipError::ChannelUnreachable("page bridge closed".into())),
            Err(_) => Err(SkipError::Timeout),
        };
        result
    }

    // Background -> content script

    pub async fn handle_tab_message(&self, message: TabMessage) -> Value {
        match message {
            TabMessage::StartSkipping {
                timestamps,
                content_title,
                netflix_video_id,
            } => match self
                .start_skipping(timestamps, content_title, netflix_video_id)
                .await
            {
                Ok(()) => reply(&Ack::OK),
                Err(err) => reply(&Failure::from(&err)),
            },
            TabMessage::StopSkipping => {
                self.stop_skipping();
                reply(&Ack::OK)
            }
            TabMessage::Ping => reply(&self.ping()),
            TabMessage::GetDetectedContent => reply(&self.detected_content().await),
        }
    }

    pub fn ping(&self) -> PingReply {
        let state = self.state();
        PingReply {
            is_skipping: state.is_skipping,
            netflix_video_id: state.current_video.clone(),
            content_title: state.content_title.clone(),
        }
    }

    /// Hand `timestamps` to the runtime, provided the page is still on
    /// `video`.
    pub async fn start_skipping(
        &self,
        timestamps: Vec<SkipTimestamp>,
        content_title: String,
        video: VideoIdentity,
    ) -> SkipResult<()> {
        let current = VideoIdentity::from_url(&self.window.location());
        if current.as_ref() != Some(&video) {
            log_warn!("[Bridge] video id mismatch: {:?} != {}", current, video);
            return Err(SkipError::VideoIdentityMismatch {
                expected: video.to_string(),
                actual: current.map(|id| id.to_string()).unwrap_or_default(),
            });
        }

        {
            let mut state = self.state();
            state.is_skipping = true;
            state.current_video = Some(video);
            state.content_title = Some(content_title);
        }

        let ready = match self.ensure_injected().await {
            Ok(()) => self.wait_for_player().await,
            Err(err) => Err(err),
        };
        if let Err(err) = ready {
            let mut state = self.state();
            state.is_skipping = false;
            state.current_video = None;
            state.content_title = None;
            return Err(err);
        }

        log_info!("[Bridge] starting skip checking with {} timestamps", timestamps.len());
        self.window.post(PageCommand::StartSkipChecking { timestamps });
        self.window.post(PageCommand::UpdateFabState { is_skipping: true });
        self.set_phase(BridgePhase::Skipping);
        Ok(())
    }

    /// Video identity is kept for later pings.
    pub fn stop_skipping(&self) {
        let injected = {
            let mut state = self.state();
            state.is_skipping = false;
            state.content_title = None;
            state.injected
        };

        if injected {
            self.window.post(PageCommand::StopSkipChecking);
            self.window.post(PageCommand::UpdateFabState { is_skipping: false });
        }
        if self.phase() == BridgePhase::Skipping {
            self.set_phase(BridgePhase::Idle);
        }
    }

    /// Tell the background which video this page is on. The background
    /// answers `restored: true` after it has already pushed START_SKIPPING.
    pub async fn report_content_ready(&self) {
        let location = self.window.location();
        let Some(video) = VideoIdentity::from_url(&location) else {
            self.window.post(PageCommand::UpdateFabState { is_skipping: false });
            self.settle_idle();
            return;
        };
        self.state().current_video = Some(video.clone());

        let restored = self
            .request::<ContentReadyReply>(BackgroundRequest::ContentReady {
                netflix_video_id: video,
                url: location,
            })
            .await
            .map(|reply| reply.restored)
            .unwrap_or(false);

        if !restored {
            self.window.post(PageCommand::UpdateFabState { is_skipping: false });
            self.settle_idle();
        }
    }

    /// Fresh metadata from the runtime, or the last value seen when the
    /// runtime does not answer in time.
    pub async fn fresh_metadata(&self) -> Option<ContentDescriptor> {
        match time::timeout(self.config.metadata_timeout, self.window.request_metadata()).await {
            Ok(Ok(Some(metadata))) => {
                self.state().last_metadata = Some(metadata.clone());
                Some(metadata)
            }
            Ok(Ok(None)) => None,
            Ok(Err(err)) => {
                log_warn!("[Bridge] metadata request failed ({}), using cached value", err);
                self.last_metadata()
            }
            Err(_) => {
                log_info!("[Bridge] metadata request timed out, using cached value");
                self.last_metadata()
            }
        }
    }

    /// Catalog match for `metadata`, from the cache when possible.
    pub async fn match_content(&self, metadata: &ContentDescriptor) -> Option<DetectedContent> {
        if let Some(hit) = self.cache().content_for(metadata) {
            return Some(hit);
        }

        let reply = self
            .request::<MatchReply>(BackgroundRequest::MatchContent(MatchContentRequest {
                title: metadata.title.clone(),
                content_type: metadata.content_kind,
                season_number: metadata.season_number,
                episode_number: metadata.episode_number,
            }))
            .await
            .ok()?;

        let content = DetectedContent {
            tmdb_id: reply.tmdb_id,
            title: reply.content_title,
            media_type: reply.media_type,
            season_number: metadata.season_number,
            episode_number: metadata.episode_number,
        };
        let mut cache = self.cache();
        cache.store_content(&metadata.stable_session_id, content.clone());
        cache.store_counts(reply.tmdb_id, reply.counts);
        Some(content)
    }

    pub async fn detected_content(&self) -> DetectedContentReply {
        let Some(metadata) = self.fresh_metadata().await else {
            return DetectedContentReply {
                success: false,
                content: None,
                metadata: None,
            };
        };

        let content = self.match_content(&metadata).await;
        DetectedContentReply {
            success: content.is_some(),
            content,
            metadata: Some(metadata),
        }
    }

    // Runtime -> content script

    pub async fn handle_page_event(&self, event: PageEvent) {
        match event {
            PageEvent::NetflixReady => self.on_player_ready().await,
            PageEvent::NetflixMetadata { metadata } => {
                if let Some(metadata) = metadata {
                    self.state().last_metadata = Some(metadata);
                }
            }
            PageEvent::MetadataReady { metadata } => self.on_metadata_ready(metadata).await,
            PageEvent::MarkStarted { start_time } => {
                log_info!("[Bridge] marking started at {}ms", start_time);
            }
            PageEvent::MarkEnded {
                start_time,
                end_time,
                metadata,
            } => self.on_mark_ended(start_time, end_time, metadata).await,
            PageEvent::FabClicked { metadata } => self.on_fab_clicked(metadata).await,
            PageEvent::AutoStartSkipping {
                metadata,
                skip_type,
            } => self.on_auto_start(metadata, skip_type).await,
            PageEvent::StopRequest => {
                if let Err(err) = self
                    .request::<Ack>(BackgroundRequest::StopSkip { tab_id: None })
                    .await
                {
                    log_warn!("[Bridge] stop request failed: {}", err);
                }
            }
            PageEvent::OpenAuthPopup => self.open_auth_popup().await,
            PageEvent::RequestAuthCheck => {
                self.refresh_auth(true).await;
            }
            PageEvent::SkipVote {
                skip_group_id,
                vote_type,
            } => self.relay_vote(skip_group_id, vote_type).await,
        }
    }

    async fn on_player_ready(&self) {
        log_info!("[Bridge] Netflix player is ready");
        self.set_phase(BridgePhase::PlayerReady);
        self.start_auth_watcher();
        self.report_content_ready().await;
    }

    /// Availability for the FAB, then pending groups for the vote prompt.
    async fn on_metadata_ready(&self, metadata: ContentDescriptor) {
        log_info!("[Bridge] metadata ready: {}", metadata.title);
        self.state().last_metadata = Some(metadata.clone());
        self.window.post(PageCommand::LoadingStatus {
            status: LoadingStatus::Loading,
        });

        let Some(content) = self.match_content(&metadata).await else {
            self.window.post(PageCommand::LoadingStatus {
                status: LoadingStatus::NotRecognized,
            });
            self.window.post(PageCommand::SetAvailableSkipTypes {
                skip_types: Vec::new(),
                is_clean: false,
            });
            return;
        };

        let available = self
            .request::<AvailableSkipsReply>(BackgroundRequest::CheckAvailableSkips(
                content.content_ref(),
            ))
            .await;
        let (skip_types, is_clean) = match available {
            Ok(reply) => {
                self.cache().store_counts(content.tmdb_id, reply.counts);
                let types = reply
                    .skip_types
                    .iter()
                    .filter_map(|name| SkipCategory::parse(name))
                    .collect();
                (types, reply.is_clean)
            }
            Err(_) => (Vec::new(), false),
        };
        self.window.post(PageCommand::SetAvailableSkipTypes {
            skip_types,
            is_clean,
        });

        if let Ok(reply) = self
            .request::<PendingSkipsReply>(BackgroundRequest::FetchPendingSkips(content.content_ref()))
            .await
        {
            if reply.success {
                self.window.post(PageCommand::SetPendingSkips {
                    pending_skips: reply.pending_skips,
                });
            }
        }
    }

    async fn on_mark_ended(&self, start_ms: u64, end_ms: u64, metadata: Option<ContentDescriptor>) {
        let Some((start_ms, end_ms)) = normalize_mark(start_ms, end_ms) else {
            return;
        };
        log_info!("[Bridge] marking ended: {}ms -> {}ms", start_ms, end_ms);

        let content = match metadata {
            Some(metadata) => {
                self.state().last_metadata = Some(metadata.clone());
                self.match_content(&metadata).await
            }
            None => None,
        };

        self.state().mark_draft = Some(MarkDraft {
            start_ms,
            end_ms,
            content,
        });
    }

    /// Save the pending mark under `category` and refresh any running
    /// session so the new range takes effect.
    pub async fn submit_mark(&self, category: SkipCategory) -> SkipResult<()> {
        let draft = self.state().mark_draft.take();
        let Some(draft) = draft else {
            return Ok(());
        };
        let Some(content) = draft.content.clone() else {
            self.state().mark_draft = Some(draft);
            return Err(SkipError::ContentNotMatched);
        };

        let saved = self
            .request::<Value>(BackgroundRequest::SaveTimestamp(SaveTimestampRequest {
                start_time: draft.start_ms,
                end_time: draft.end_ms,
                timestamp_type: category,
                content_type: content.media_type.content_kind(),
                content_id: content.tmdb_id,
                content_title: content.title.clone(),
                season_number: content.season_number,
                episode_number: content.episode_number,
            }))
            .await;
        if let Err(err) = saved {
            self.state().mark_draft = Some(draft);
            return Err(err);
        }

        if self.is_skipping() {
            if let Err(err) = self
                .request::<Value>(BackgroundRequest::RefreshActiveSkipping)
                .await
            {
                log_warn!("[Bridge] could not refresh active skipping: {}", err);
            }
        }
        self.window.post(PageCommand::ModalClosed);
        Ok(())
    }

    pub fn cancel_mark(&self) {
        self.state().mark_draft = None;
        self.window.post(PageCommand::ModalClosed);
    }

    async fn on_fab_clicked(&self, metadata: Option<ContentDescriptor>) {
        let Some(metadata) = metadata else {
            return;
        };
        self.state().last_metadata = Some(metadata.clone());

        let Some(content) = self.match_content(&metadata).await else {
            self.state().quick_panel = None;
            return;
        };
        let counts = self.cache().counts_for(content.tmdb_id).unwrap_or_default();
        self.state().quick_panel = Some(QuickPanel { content, counts });
    }

    /// Start skipping from the quick panel with the chosen categories.
    pub async fn quick_panel_start(&self, preferences: SkipPreferences) -> SkipResult<()> {
        let panel = self.state().quick_panel.clone();
        let panel = panel.ok_or(SkipError::ContentNotMatched)?;
        self.quick_skip(&panel.content, preferences).await?;
        self.state().quick_panel = None;
        self.window.post(PageCommand::ModalClosed);
        Ok(())
    }

    async fn on_auto_start(&self, metadata: Option<ContentDescriptor>, skip_type: SkipCategory) {
        let Some(metadata) = metadata else {
            return;
        };
        self.state().last_metadata = Some(metadata.clone());

        let Some(content) = self.match_content(&metadata).await else {
            log_warn!("[Bridge] could not match content for auto-start");
            return;
        };
        if let Err(err) = self.quick_skip(&content, SkipPreferences::only(skip_type)).await {
            log_warn!("[Bridge] auto-start failed: {}", err);
        }
    }

    async fn quick_skip(&self, content: &DetectedContent, preferences: SkipPreferences) -> SkipResult<()> {
        self.request::<Ack>(BackgroundRequest::QuickSkipActivate(QuickSkipRequest {
            content_type: content.media_type.content_kind(),
            tmdb_id: content.tmdb_id,
            content_title: content.title.clone(),
            preferences,
            season_number: content.season_number,
            episode_number: content.episode_number,
        }))
        .await
        .map(|_| ())
    }

    async fn open_auth_popup(&self) {
        let opened = self
            .request::<Ack>(BackgroundRequest::OpenAuthPopup)
            .await
            .map(|ack| ack.success)
            .unwrap_or(false);
        if !opened {
            let url = format!("{}/extension-auth", self.config.app_url);
            log_info!("[Bridge] opening {} instead of the popup", url);
            self.window.open_url(&url);
        }
    }

    /// Ask the background for auth state; posts to the runtime when `force`
    /// is set or the state changed. Returns the new state.
    pub async fn refresh_auth(&self, force: bool) -> bool {
        let authenticated = self
            .request::<AuthStatusReply>(BackgroundRequest::CheckAuthStatus)
            .await
            .map(|reply| reply.is_authenticated)
            .unwrap_or(false);

        let changed = {
            let mut state = self.state();
            let changed = state.authenticated != Some(authenticated);
            state.authenticated = Some(authenticated);
            changed
        };
        if force || changed {
            self.window.post(PageCommand::AuthStateUpdate {
                is_authenticated: authenticated,
            });
        }
        authenticated
    }

    /// Poll auth so the in-player buttons unlock after a popup sign-in.
    pub fn start_auth_watcher(&self) {
        let token = {
            let mut guard = self.auth_watcher.lock().unwrap_or_else(PoisonError::into_inner);
            if guard.is_some() {
                return;
            }
            let token = CancellationToken::new();
            *guard = Some(token.clone());
            token
        };

        let bridge = self.clone();
        tokio::spawn(async move {
            let mut interval = time::interval(bridge.config.auth_poll);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        bridge.refresh_auth(false).await;
                    }
                    _ = token.cancelled() => break,
                }
            }
        });
    }

    async fn relay_vote(&self, skip_group_id: u64, vote_type: VoteDirection) {
        let result = self
            .request::<VoteReply>(BackgroundRequest::VoteOnSkip {
                skip_group_id,
                vote_type,
            })
            .await;

        let command = match result {
            Ok(reply) => PageCommand::VoteResult {
                success: reply.success,
                error: None,
            },
            Err(err) => PageCommand::VoteResult {
                success: false,
                error: Some(err.to_string()),
            },
        };
        self.window.post(command);
    }

    pub fn shutdown(&self) {
        if let Some(token) = self
            .auth_watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentKind, MediaType};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Responder = Box<dyn Fn(&BackgroundRequest) -> SkipResult<Value> + Send + Sync>;

    struct FakeBackground {
        respond: Responder,
        seen: Mutex<Vec<BackgroundRequest>>,
    }

    impl FakeBackground {
        fn new(respond: impl Fn(&BackgroundRequest) -> SkipResult<Value> + Send + Sync + 'static) -> Arc<Self> {
            Arc::new(Self {
                respond: Box::new(respond),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn kinds(&self) -> Vec<&'static str> {
            self.seen.lock().unwrap().iter().map(BackgroundRequest::kind).collect()
        }
    }

    #[async_trait]
    impl BackgroundChannel for FakeBackground {
        async fn send(&self, request: BackgroundRequest) -> SkipResult<Value> {
            let response = (self.respond)(&request);
            self.seen.lock().unwrap().push(request);
            response
        }
    }

    struct FakeWindow {
        location: Mutex<String>,
        injections: AtomicUsize,
        posted: Mutex<Vec<PageCommand>>,
        opened: Mutex<Vec<String>>,
        metadata: Option<ContentDescriptor>,
        metadata_hangs: bool,
    }

    impl FakeWindow {
        fn on(location: &str) -> Self {
            Self {
                location: Mutex::new(location.to_string()),
                injections: AtomicUsize::new(0),
                posted: Mutex::new(Vec::new()),
                opened: Mutex::new(Vec::new()),
                metadata: None,
                metadata_hangs: false,
            }
        }

        fn posted(&self) -> Vec<PageCommand> {
            self.posted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl WindowChannel for FakeWindow {
        fn location(&self) -> String {
            self.location.lock().unwrap().clone()
        }

        async fn inject_runtime(&self) -> SkipResult<()> {
            self.injections.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn post(&self, command: PageCommand) {
            self.posted.lock().unwrap().push(command);
        }

        async fn request_metadata(&self) -> SkipResult<Option<ContentDescriptor>> {
            if self.metadata_hangs {
                std::future::pending::<()>().await;
            }
            Ok(self.metadata.clone())
        }

        fn open_url(&self, url: &str) {
            self.opened.lock().unwrap().push(url.to_string());
        }
    }

    fn heat() -> ContentDescriptor {
        ContentDescriptor {
            title: "Heat".into(),
            content_kind: ContentKind::Movie,
            season_number: None,
            episode_number: None,
            episode_title: None,
            stable_session_id: "sess-1".into(),
        }
    }

    fn bridge(window: Arc<FakeWindow>, background: Arc<FakeBackground>) -> PageBridge {
        PageBridge::new(window, background, BridgeConfig::default())
    }

    #[tokio::test]
    async fn injection_happens_once() {
        let window = Arc::new(FakeWindow::on("https://www.netflix.com/watch/555"));
        let bridge = bridge(window.clone(), FakeBackground::new(|_| Ok(json!({}))));

        bridge.initialize().await.unwrap();
        bridge.initialize().await.unwrap();

        assert_eq!(window.injections.load(Ordering::SeqCst), 1);
        assert_eq!(bridge.phase(), BridgePhase::WaitingForPlayer);
    }

    #[tokio::test]
    async fn start_for_another_video_is_refused() {
        let window = Arc::new(FakeWindow::on("https://www.netflix.com/watch/556"));
        let bridge = bridge(window.clone(), FakeBackground::new(|_| Ok(json!({}))));

        let reply = bridge
            .handle_tab_message(TabMessage::StartSkipping {
                timestamps: vec![],
                content_title: "Heat".into(),
                netflix_video_id: VideoIdentity::new("555"),
            })
            .await;

        assert_eq!(reply["success"], false);
        assert!(!bridge.is_skipping());
        assert!(window.posted().is_empty());
    }

    #[tokio::test]
    async fn ready_page_without_session_settles_idle() {
        let window = Arc::new(FakeWindow::on("https://www.netflix.com/watch/555"));
        let background = FakeBackground::new(|request| match request {
            BackgroundRequest::ContentReady { .. } => Ok(json!({ "success": true, "restored": false })),
            _ => Ok(json!({ "isAuthenticated": true })),
        });
        let bridge = bridge(window.clone(), background.clone());
        bridge.initialize().await.unwrap();

        bridge.handle_page_event(PageEvent::NetflixReady).await;
        bridge.shutdown();

        assert_eq!(bridge.phase(), BridgePhase::Idle);
        assert!(background.kinds().contains(&"CONTENT_READY"));
        assert!(window
            .posted()
            .contains(&PageCommand::UpdateFabState { is_skipping: false }));
    }

    #[tokio::test]
    async fn start_after_ready_reaches_runtime() {
        let window = Arc::new(FakeWindow::on("https://www.netflix.com/watch/555"));
        let bridge = bridge(window.clone(), FakeBackground::new(|_| Ok(json!({ "success": true }))));
        bridge.initialize().await.unwrap();
        bridge.set_phase(BridgePhase::PlayerReady);

        bridge
            .start_skipping(vec![], "Heat".into(), VideoIdentity::new("555"))
            .await
            .unwrap();

        assert_eq!(bridge.phase(), BridgePhase::Skipping);
        let ping = bridge.ping();
        assert!(ping.is_skipping);
        assert_eq!(ping.content_title.as_deref(), Some("Heat"));

        bridge.stop_skipping();
        assert_eq!(bridge.phase(), BridgePhase::Idle);
        assert!(window.posted().contains(&PageCommand::StopSkipChecking));
        assert_eq!(bridge.ping().netflix_video_id, Some(VideoIdentity::new("555")));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_runtime_falls_back_to_cached_metadata() {
        let mut window = FakeWindow::on("https://www.netflix.com/watch/555");
        window.metadata_hangs = true;
        let window = Arc::new(window);
        let bridge = bridge(window, FakeBackground::new(|_| Ok(json!({}))));

        assert_eq!(bridge.fresh_metadata().await, None);

        bridge
            .handle_page_event(PageEvent::NetflixMetadata {
                metadata: Some(heat()),
            })
            .await;
        let started = tokio::time::Instant::now();
        assert_eq!(bridge.fresh_metadata().await, Some(heat()));
        assert!(started.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn match_is_cached_per_playback() {
        let window = Arc::new(FakeWindow::on("https://www.netflix.com/watch/555"));
        let background = FakeBackground::new(|_| {
            Ok(json!({
                "success": true,
                "tmdbId": 949,
                "contentTitle": "Heat",
                "mediaType": "movie",
                "counts": { "nudity": 0, "sex": 1, "gore": 3, "total": 4 }
            }))
        });
        let bridge = bridge(window, background.clone());

        let first = bridge.match_content(&heat()).await.unwrap();
        let second = bridge.match_content(&heat()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.media_type, MediaType::Movie);
        assert_eq!(background.kinds(), vec!["MATCH_CONTENT"]);

        bridge
            .handle_page_event(PageEvent::FabClicked {
                metadata: Some(heat()),
            })
            .await;
        assert_eq!(bridge.quick_panel().unwrap().counts.gore, 3);
    }

    #[tokio::test]
    async fn reversed_mark_is_stored_in_order() {
        let window = Arc::new(FakeWindow::on("https://www.netflix.com/watch/555"));
        let bridge = bridge(window, FakeBackground::new(|_| Err(SkipError::ChannelUnreachable("gone".into()))));

        bridge
            .handle_page_event(PageEvent::MarkEnded {
                start_time: 9000,
                end_time: 4000,
                metadata: None,
            })
            .await;
        let draft = bridge.mark_draft().unwrap();
        assert_eq!((draft.start_ms, draft.end_ms), (4000, 9000));
        assert_eq!(bridge.submit_mark(SkipCategory::Gore).await, Err(SkipError::ContentNotMatched));

        bridge
            .handle_page_event(PageEvent::MarkEnded {
                start_time: 5000,
                end_time: 5000,
                metadata: None,
            })
            .await;
        assert_eq!(bridge.mark_draft().unwrap().start_ms, 4000);
    }

    #[tokio::test]
    async fn popup_failure_opens_web_sign_in() {
        let window = Arc::new(FakeWindow::on("https://www.netflix.com/watch/555"));
        let bridge = bridge(window.clone(), FakeBackground::new(|_| Ok(json!({ "success": false }))));

        bridge.handle_page_event(PageEvent::OpenAuthPopup).await;

        assert_eq!(
            window.opened.lock().unwrap().as_slice(),
            ["https://www.getskipit.com/extension-auth".to_string()]
        );
    }
}
