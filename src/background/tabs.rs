use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::{
    bridge::TabMessage,
    error::SkipResult,
    models::{TabId, VideoIdentity},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserTab {
    pub id: TabId,
    pub url: String,
}

impl BrowserTab {
    pub fn watch_identity(&self) -> Option<VideoIdentity> {
        watch_identity(&self.url)
    }
}

/// The background's handle on browser tabs and the extension action.
#[async_trait]
pub trait BrowserTabs: Send + Sync {
    /// Focused tab of the current window, whatever site it shows.
    async fn active_tab(&self) -> Option<BrowserTab>;

    /// Focused tab of the current window when it is on Netflix.
    async fn active_netflix_tab(&self) -> Option<BrowserTab>;

    /// Deliver a message to the tab's content script. Fails with
    /// `ChannelUnreachable` when no content script is listening.
    async fn send_to_tab(&self, tab_id: TabId, message: TabMessage) -> SkipResult<Value>;

    async fn open_popup(&self) -> SkipResult<()>;
}

/// Video identity of a Netflix watch URL; `None` for other hosts, other
/// pages, or anything that does not parse.
pub fn watch_identity(url: &str) -> Option<VideoIdentity> {
    let parsed = Url::parse(url).ok()?;
    if !parsed.host_str()?.contains("netflix.com") {
        return None;
    }
    VideoIdentity::from_url(parsed.path())
}

pub fn is_netflix_url(url: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(|host| host.contains("netflix.com")))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_requires_netflix_watch_page() {
        assert_eq!(
            watch_identity("https://www.netflix.com/watch/81234567?t=10"),
            Some(VideoIdentity::new("81234567"))
        );
        assert_eq!(watch_identity("https://www.netflix.com/browse"), None);
        assert_eq!(watch_identity("https://example.com/watch/555"), None);
        assert_eq!(watch_identity("not a url"), None);

        assert!(is_netflix_url("https://www.netflix.com/title/1"));
        assert!(!is_netflix_url("https://example.com/"));
    }
}
