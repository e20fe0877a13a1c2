use serde_json::Value;

use crate::{
    error::{SkipError, SkipResult},
    models::{ContentDescriptor, VideoIdentity},
};

use super::metadata::extract_descriptor;

/// Raw view of the host page. Implemented by whatever embeds the runtime
/// (wasm glue in production, fakes in tests). Everything here can change or
/// disappear between two calls.
pub trait HostPage: Send + Sync {
    /// `location.href` or `location.pathname`.
    fn location(&self) -> String;

    /// Snapshot of `window.netflix.appContext`. The player app's
    /// `getState()` result sits at `/state/playerApp/state` and the player
    /// session ids at `/state/playerApp/api/videoPlayer/sessionIds`.
    fn app_context(&self) -> Option<Value>;

    /// `getVideoPlayerBySessionId(id).getCurrentTime()`
    fn session_current_time(&self, session_id: &str) -> Option<f64>;

    /// `getVideoPlayerBySessionId(id).seek(ms)`; false when the call failed.
    fn session_seek(&self, session_id: &str, ms: u64) -> bool;

    /// `<video>.paused`, `None` when there is no media element.
    fn media_paused(&self) -> Option<bool>;

    fn set_media_paused(&self, paused: bool);

    fn is_fullscreen(&self) -> bool;

    fn set_fullscreen(&self, fullscreen: bool);
}

/// Playback capabilities the rest of the runtime depends on.
///
/// Reads never fail: a missing player yields `false`, `0` or `None`. Only
/// [`VideoPlayer::seek`] reports [`SkipError::PlayerUnavailable`] and the
/// caller decides what to do with it.
pub trait VideoPlayer: Send + Sync {
    fn is_ready(&self) -> bool;

    fn current_time_ms(&self) -> u64;

    fn seek(&self, ms: u64) -> SkipResult<()>;

    fn extract_metadata(&self) -> Option<ContentDescriptor>;

    /// Derived from the page URL, not from player state.
    fn video_identity(&self) -> Option<VideoIdentity>;

    fn is_paused(&self) -> bool;

    fn pause(&self);

    fn play(&self);

    fn exit_fullscreen(&self);

    fn enter_fullscreen(&self);

    fn is_fullscreen(&self) -> bool;
}

/// [`VideoPlayer`] over Netflix's internal `appContext` object graph.
pub struct NetflixPlayer<H> {
    host: H,
}

impl<H: HostPage> NetflixPlayer<H> {
    pub fn new(host: H) -> Self {
        Self { host }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    fn player_app(&self) -> Option<Value> {
        let mut context = self.host.app_context()?;
        let player_app = context.pointer_mut("/state/playerApp")?.take();
        if player_app.is_null() {
            None
        } else {
            Some(player_app)
        }
    }

    fn first_session_id(&self, player_app: &Value) -> Option<String> {
        player_app
            .pointer("/api/videoPlayer/sessionIds")?
            .as_array()?
            .first()?
            .as_str()
            .map(str::to_string)
    }
}

impl<H: HostPage> VideoPlayer for NetflixPlayer<H> {
    fn is_ready(&self) -> bool {
        self.player_app().is_some()
    }

    fn current_time_ms(&self) -> u64 {
        let Some(player_app) = self.player_app() else {
            return 0;
        };
        let Some(session_id) = self.first_session_id(&player_app) else {
            return 0;
        };

        match self.host.session_current_time(&session_id) {
            Some(t) if t.is_finite() && t > 0.0 => t as u64,
            _ => 0,
        }
    }

    fn seek(&self, ms: u64) -> SkipResult<()> {
        let player_app = self.player_app().ok_or(SkipError::PlayerUnavailable)?;
        let session_id = self
            .first_session_id(&player_app)
            .ok_or(SkipError::PlayerUnavailable)?;

        if self.host.session_seek(&session_id, ms) {
            Ok(())
        } else {
            Err(SkipError::PlayerUnavailable)
        }
    }

    fn extract_metadata(&self) -> Option<ContentDescriptor> {
        let player_app = self.player_app()?;
        extract_descriptor(player_app.get("state")?)
    }

    fn video_identity(&self) -> Option<VideoIdentity> {
        VideoIdentity::from_url(&self.host.location())
    }

    fn is_paused(&self) -> bool {
        self.host.media_paused().unwrap_or(false)
    }

    fn pause(&self) {
        if self.host.media_paused() == Some(false) {
            self.host.set_media_paused(true);
        }
    }

    fn play(&self) {
        if self.host.media_paused() == Some(true) {
            self.host.set_media_paused(false);
        }
    }

    fn exit_fullscreen(&self) {
        if self.host.is_fullscreen() {
            self.host.set_fullscreen(false);
        }
    }

    fn enter_fullscreen(&self) {
        if !self.host.is_fullscreen() {
            self.host.set_fullscreen(true);
        }
    }

    fn is_fullscreen(&self) -> bool {
        self.host.is_fullscreen()
    }
}
