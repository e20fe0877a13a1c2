//! Background, page bridge and page runtime wired together in one process,
//! with the browser, the player and the catalog API faked out.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, OnceLock},
};

use async_trait::async_trait;
use serde_json::{json, Value};
use skipit_lib::{
    api::{
        EpisodeSource, EpisodesResponse, NewTimestamp, SearchResult, SkipApi, StaticTokenProvider,
        TimestampQuery, TimestampSet, UserPreferences, VoteResponse,
    },
    background::{BackgroundRouter, BrowserTab, BrowserTabs, SessionCoordinator, TabStateStore},
    bridge::{
        BackgroundChannel, BackgroundRequest, BridgeConfig, PageBridge, PageCommand, TabMessage,
        UiUpdate, WindowChannel,
    },
    error::{SkipError, SkipResult},
    models::{
        ContentDescriptor, ContentKind, MediaType, PendingSkip, SkipCategory, SkipPreferences,
        SkipTimestamp, TabId, VideoIdentity, VoteDirection,
    },
    player::VideoPlayer,
    runtime::PageRuntime,
    settings::ExtensionSettings,
    storage::SessionDatabase,
    timeline::{TimelineInfo, TimelineLayer, TimelineSegment, TimelineSurface},
};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{sleep, Duration},
};

const WATCH_URL: &str = "https://www.netflix.com/watch/555";
const TAB: TabId = 1;

/// Player that lands exactly where it is told to seek.
struct Player {
    position: Mutex<u64>,
    seeks: Mutex<Vec<u64>>,
    paused: Mutex<bool>,
    fullscreen: Mutex<bool>,
}

impl Player {
    fn new() -> Self {
        Self {
            position: Mutex::new(0),
            seeks: Mutex::new(Vec::new()),
            paused: Mutex::new(false),
            fullscreen: Mutex::new(false),
        }
    }

    fn set_position(&self, ms: u64) {
        *self.position.lock().unwrap() = ms;
    }

    fn seeks(&self) -> Vec<u64> {
        self.seeks.lock().unwrap().clone()
    }
}

impl VideoPlayer for Player {
    fn is_ready(&self) -> bool {
        true
    }
    fn current_time_ms(&self) -> u64 {
        *self.position.lock().unwrap()
    }
    fn seek(&self, ms: u64) -> SkipResult<()> {
        self.seeks.lock().unwrap().push(ms);
        self.set_position(ms);
        Ok(())
    }
    fn extract_metadata(&self) -> Option<ContentDescriptor> {
        Some(ContentDescriptor {
            title: "Heat".into(),
            content_kind: ContentKind::Movie,
            season_number: None,
            episode_number: None,
            episode_title: None,
            stable_session_id: "555".into(),
        })
    }
    fn video_identity(&self) -> Option<VideoIdentity> {
        VideoIdentity::from_url(WATCH_URL)
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

#[derive(Default)]
struct SeekBar {
    mounted: Mutex<HashMap<TimelineLayer, Vec<TimelineSegment>>>,
}

impl SeekBar {
    fn segments(&self, layer: TimelineLayer) -> Vec<TimelineSegment> {
        self.mounted
            .lock()
            .unwrap()
            .get(&layer)
            .cloned()
            .unwrap_or_default()
    }
}

impl TimelineSurface for SeekBar {
    fn timeline(&self) -> Option<TimelineInfo> {
        Some(TimelineInfo {
            duration_ms: 60_000,
            bar_width_px: 800,
        })
    }
    fn is_mounted(&self, layer: TimelineLayer) -> bool {
        self.mounted.lock().unwrap().contains_key(&layer)
    }
    fn mount(&self, layer: TimelineLayer, segments: Vec<TimelineSegment>) {
        self.mounted.lock().unwrap().insert(layer, segments);
    }
    fn unmount(&self, layer: TimelineLayer) {
        self.mounted.lock().unwrap().remove(&layer);
    }
}

#[derive(Default)]
struct Catalog {
    timestamps: Vec<SkipTimestamp>,
    pending: Vec<PendingSkip>,
    votes: Mutex<Vec<(u64, VoteDirection)>>,
}

#[async_trait]
impl SkipApi for Catalog {
    async fn search_content(&self, _query: &str, _token: &str) -> SkipResult<Vec<SearchResult>> {
        Ok(vec![SearchResult {
            id: 949,
            title: "Heat".into(),
            poster_path: None,
            release_date: Some("1995-12-15".into()),
            media_type: MediaType::Movie,
            timestamp_count: self.timestamps.len() as u32,
        }])
    }

    async fn get_timestamps(
        &self,
        _kind: ContentKind,
        _content_id: u64,
        query: &TimestampQuery,
        _token: &str,
    ) -> SkipResult<TimestampSet> {
        Ok(TimestampSet {
            timestamps: self
                .timestamps
                .iter()
                .filter(|ts| query.preferences.map_or(true, |p| p.includes(ts.category)))
                .cloned()
                .collect(),
            is_clean: false,
        })
    }

    async fn get_user_preferences(&self, _token: &str) -> SkipResult<UserPreferences> {
        Ok(UserPreferences::default())
    }

    async fn save_user_preferences(
        &self,
        _preferences: &BTreeMap<String, bool>,
        _token: &str,
    ) -> SkipResult<UserPreferences> {
        Ok(UserPreferences::default())
    }

    async fn get_episodes(
        &self,
        tv_show_id: u64,
        source: EpisodeSource,
        _token: &str,
    ) -> SkipResult<EpisodesResponse> {
        Ok(EpisodesResponse {
            tv_id: tv_show_id,
            number_of_seasons: 0,
            seasons: Vec::new(),
            source,
        })
    }

    async fn fetch_pending_skips(
        &self,
        _kind: ContentKind,
        _content_id: u64,
        _season_number: Option<u32>,
        _episode_number: Option<u32>,
        _token: &str,
    ) -> SkipResult<Vec<PendingSkip>> {
        Ok(self.pending.clone())
    }

    async fn vote(
        &self,
        skip_group_id: u64,
        direction: VoteDirection,
        _token: &str,
    ) -> SkipResult<VoteResponse> {
        self.votes.lock().unwrap().push((skip_group_id, direction));
        Ok(VoteResponse {
            new_confidence: 0.4,
            new_status: "pending".into(),
        })
    }

    async fn save_timestamp(
        &self,
        _kind: ContentKind,
        _content_id: u64,
        _body: &NewTimestamp,
        _token: &str,
    ) -> SkipResult<Value> {
        Ok(json!({ "id": 1 }))
    }
}

/// One Netflix tab whose content script is the bridge under test.
#[derive(Default)]
struct Browser {
    bridge: OnceLock<PageBridge>,
}

#[async_trait]
impl BrowserTabs for Browser {
    async fn active_tab(&self) -> Option<BrowserTab> {
        self.active_netflix_tab().await
    }

    async fn active_netflix_tab(&self) -> Option<BrowserTab> {
        Some(BrowserTab {
            id: TAB,
            url: WATCH_URL.into(),
        })
    }

    async fn send_to_tab(&self, tab_id: TabId, message: TabMessage) -> SkipResult<Value> {
        match self.bridge.get() {
            Some(bridge) if tab_id == TAB => Ok(bridge.handle_tab_message(message).await),
            _ => Err(SkipError::ChannelUnreachable(format!("tab {tab_id}"))),
        }
    }

    async fn open_popup(&self) -> SkipResult<()> {
        Ok(())
    }
}

struct RuntimePort {
    router: BackgroundRouter,
}

#[async_trait]
impl BackgroundChannel for RuntimePort {
    async fn send(&self, request: BackgroundRequest) -> SkipResult<Value> {
        self.router
            .dispatch(request, Some(TAB))
            .await
            .ok_or_else(|| SkipError::ChannelUnreachable("no reply".into()))
    }
}

struct PageWindow {
    player: Arc<Player>,
    commands: mpsc::UnboundedSender<PageCommand>,
}

#[async_trait]
impl WindowChannel for PageWindow {
    fn location(&self) -> String {
        WATCH_URL.into()
    }

    async fn inject_runtime(&self) -> SkipResult<()> {
        Ok(())
    }

    fn post(&self, command: PageCommand) {
        let _ = self.commands.send(command);
    }

    async fn request_metadata(&self) -> SkipResult<Option<ContentDescriptor>> {
        Ok(self.player.extract_metadata())
    }

    fn open_url(&self, _url: &str) {}
}

struct Extension {
    router: BackgroundRouter,
    bridge: PageBridge,
    runtime: PageRuntime,
    player: Arc<Player>,
    seekbar: Arc<SeekBar>,
    catalog: Arc<Catalog>,
    painted: Arc<Mutex<Vec<UiUpdate>>>,
    pumps: Vec<JoinHandle<()>>,
}

impl Extension {
    async fn load(catalog: Catalog) -> Self {
        let catalog = Arc::new(catalog);
        let browser = Arc::new(Browser::default());
        let storage = Arc::new(SessionDatabase::in_memory().unwrap());
        let router = BackgroundRouter::new(SessionCoordinator::new(
            TabStateStore::new(storage),
            browser.clone(),
            catalog.clone(),
            Arc::new(StaticTokenProvider::new(Some("token".into()))),
        ));

        let player = Arc::new(Player::new());
        let seekbar = Arc::new(SeekBar::default());
        let settings = ExtensionSettings::default();
        let (runtime, mut channels) = PageRuntime::new(player.clone(), seekbar.clone(), &settings);

        let (commands_tx, mut commands_rx) = mpsc::unbounded_channel();
        let bridge = PageBridge::new(
            Arc::new(PageWindow {
                player: player.clone(),
                commands: commands_tx,
            }),
            Arc::new(RuntimePort {
                router: router.clone(),
            }),
            BridgeConfig::from_settings(&settings),
        );
        let _ = browser.bridge.set(bridge.clone());

        let painted = Arc::new(Mutex::new(Vec::new()));
        let mut pumps = Vec::new();
        {
            let runtime = runtime.clone();
            pumps.push(tokio::spawn(async move {
                while let Some(command) = commands_rx.recv().await {
                    runtime.handle_command(command).await;
                }
            }));
        }
        {
            let bridge = bridge.clone();
            pumps.push(tokio::spawn(async move {
                while let Some(event) = channels.events.recv().await {
                    bridge.handle_page_event(event).await;
                }
            }));
        }
        {
            let painted = painted.clone();
            pumps.push(tokio::spawn(async move {
                while let Some(update) = channels.ui.recv().await {
                    painted.lock().unwrap().push(update);
                }
            }));
        }

        bridge.initialize().await.unwrap();
        runtime.start().await;
        settle().await;

        Self {
            router,
            bridge,
            runtime,
            player,
            seekbar,
            catalog,
            painted,
            pumps,
        }
    }

    fn take_painted(&self) -> Vec<UiUpdate> {
        std::mem::take(&mut *self.painted.lock().unwrap())
    }

    async fn skip_status(&self) -> Value {
        self.router
            .handle(json!({ "type": "GET_SKIP_STATUS", "tabId": TAB }), None)
            .await
            .unwrap()
    }

    async fn unload(self) {
        self.runtime.shutdown().await;
        self.bridge.shutdown();
        for pump in self.pumps {
            pump.abort();
        }
    }
}

async fn settle() {
    sleep(Duration::from_millis(20)).await;
}

#[tokio::test(start_paused = true)]
async fn merged_range_is_skipped_once_and_announced() {
    let ext = Extension::load(Catalog {
        timestamps: vec![
            SkipTimestamp::new(1000, 2000, SkipCategory::Nudity),
            SkipTimestamp::new(2000, 3000, SkipCategory::Sex),
        ],
        ..Catalog::default()
    })
    .await;

    assert!(ext.bridge.phase().player_ready());
    ext.player.set_position(500);

    // Two categories available: the button opens the quick panel.
    ext.runtime.fab_click().await;
    settle().await;
    assert!(ext.player.is_paused());
    let panel = ext.bridge.quick_panel().expect("quick panel prepared");
    assert_eq!(panel.content.tmdb_id, 949);
    assert_eq!(panel.counts.total, 2);

    ext.bridge.quick_panel_start(SkipPreferences::all()).await.unwrap();
    settle().await;
    assert!(!ext.player.is_paused());
    assert!(ext.runtime.engine().is_skipping().await);
    assert!(ext.bridge.is_skipping());
    assert_eq!(ext.skip_status().await["isActive"], true);
    assert_eq!(ext.seekbar.segments(TimelineLayer::Active).len(), 2);

    sleep(Duration::from_millis(200)).await;
    assert!(ext.player.seeks().is_empty());

    ext.take_painted();
    ext.player.set_position(1000);
    sleep(Duration::from_millis(60)).await;
    assert_eq!(ext.player.seeks(), vec![3000]);

    let notifications: Vec<_> = ext
        .take_painted()
        .into_iter()
        .filter_map(|update| match update {
            UiUpdate::ShowNotification { notification } => Some(notification),
            _ => None,
        })
        .collect();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].title, "Skipped nudity/sex scene");
    assert_eq!(notifications[0].icon, "default");

    // Scrubbing back inside the cooldown does not seek again.
    ext.player.set_position(1000);
    sleep(Duration::from_millis(200)).await;
    assert_eq!(ext.player.seeks(), vec![3000]);

    // Stop from the in-player button goes through the background.
    ext.runtime.fab_click().await;
    settle().await;
    assert!(!ext.runtime.engine().is_skipping().await);
    assert!(!ext.bridge.is_skipping());
    assert_eq!(ext.skip_status().await, json!({ "isActive": false }));
    assert!(ext.seekbar.segments(TimelineLayer::Active).is_empty());

    ext.unload().await;
}

#[tokio::test(start_paused = true)]
async fn downvoted_pending_skip_disappears() {
    let ext = Extension::load(Catalog {
        pending: vec![PendingSkip {
            group_id: 7,
            start_time: 10_000,
            end_time: 15_000,
            category: SkipCategory::Gore,
        }],
        ..Catalog::default()
    })
    .await;

    assert_eq!(ext.runtime.checker().pending().await.len(), 1);
    assert_eq!(
        ext.seekbar.segments(TimelineLayer::Pending)[0].group_id,
        Some(7)
    );

    ext.take_painted();
    ext.player.set_position(7000);
    sleep(Duration::from_millis(150)).await;
    assert!(ext.take_painted().iter().any(|update| matches!(
        update,
        UiUpdate::VotePrompt { skip: Some(skip) } if skip.group_id == 7
    )));

    assert!(ext.runtime.vote(7, VoteDirection::Down).await);
    settle().await;

    assert!(ext.runtime.checker().pending().await.is_empty());
    assert!(ext
        .seekbar
        .segments(TimelineLayer::Pending)
        .iter()
        .all(|segment| segment.group_id != Some(7)));
    assert!(ext.player.seeks().is_empty());
    assert_eq!(
        *ext.catalog.votes.lock().unwrap(),
        vec![(7, VoteDirection::Down)]
    );

    let painted = ext.take_painted();
    assert!(painted.contains(&UiUpdate::VotePrompt { skip: None }));
    assert!(painted.iter().any(|update| matches!(
        update,
        UiUpdate::ShowNotification { notification } if notification.title == "Thanks for helping!"
    )));

    ext.unload().await;
}
