//! Core of the SkipIt browser extension: range merging, the skip engine and
//! vote checker that run in the page, the page bridge in the content
//! script, and the per-tab session coordinator in the background.

pub mod api;
pub mod background;
pub mod bridge;
pub mod engine;
pub mod error;
pub mod models;
pub mod pending;
pub mod player;
pub mod ranges;
pub mod runtime;
pub mod settings;
pub mod storage;
pub mod timeline;
pub mod ui;
pub mod utils;

use std::sync::Arc;

use anyhow::Result;

use api::{HttpSkipApi, TokenProvider};
use background::{BackgroundRouter, BrowserTabs, SessionCoordinator, TabStateStore};
use settings::ExtensionSettings;
use storage::SessionStorage;

pub use error::{SkipError, SkipResult};

/// Install `env_logger` (reads `RUST_LOG`). `settings.debug` raises the
/// default filter to `Debug`. Safe to call more than once.
pub fn init_logging(settings: &ExtensionSettings) {
    let level = if settings.debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    let _ = env_logger::Builder::from_default_env()
        .filter_level(level)
        .try_init();

    log::info!(
        "SkipIt core logging initialized ({:?}, {})",
        settings.environment,
        settings.api_base_url()
    );
}

/// Wire the background context against the configured API host.
pub fn background_router(
    settings: &ExtensionSettings,
    storage: Arc<dyn SessionStorage>,
    tabs: Arc<dyn BrowserTabs>,
    auth: Arc<dyn TokenProvider>,
) -> Result<BackgroundRouter> {
    let api = HttpSkipApi::new(&settings.api_base_url())?;
    log::info!("[Background] catalog API at {}", api.base_url());

    let coordinator = SessionCoordinator::new(TabStateStore::new(storage), tabs, Arc::new(api), auth);
    Ok(BackgroundRouter::new(coordinator))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        api::StaticTokenProvider, background::coordinator::testing::FakeTabs,
        storage::SessionDatabase,
    };

    fn parts() -> (Arc<dyn SessionStorage>, Arc<dyn BrowserTabs>, Arc<dyn TokenProvider>) {
        (
            Arc::new(SessionDatabase::in_memory().unwrap()),
            Arc::new(FakeTabs::on("https://www.netflix.com/watch/555")),
            Arc::new(StaticTokenProvider::new(Some("t".into()))),
        )
    }

    #[test]
    fn bad_api_host_is_rejected() {
        let settings = ExtensionSettings {
            api_base_url: Some("not a url".into()),
            ..ExtensionSettings::default()
        };
        let (storage, tabs, auth) = parts();
        assert!(background_router(&settings, storage, tabs, auth).is_err());
    }

    #[tokio::test]
    async fn router_answers_with_configured_host() {
        let settings = ExtensionSettings {
            api_base_url: Some("http://localhost:3000/api".into()),
            debug: true,
            ..ExtensionSettings::default()
        };
        init_logging(&settings);
        init_logging(&settings);

        let (storage, tabs, auth) = parts();
        let router = background_router(&settings, storage, tabs, auth).unwrap();
        let reply = router
            .handle(json!({ "type": "CHECK_AUTH_STATUS" }), None)
            .await
            .unwrap();
        assert_eq!(reply, json!({ "isAuthenticated": true, "userId": "authenticated" }));
    }
}
