use serde::Serialize;
use serde_json::{json, Value};

use crate::{
    bridge::{reply, BackgroundRequest},
    error::{Failure, SkipResult},
    models::TabId,
};

use super::coordinator::SessionCoordinator;

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_warn};

/// `runtime.onMessage` for the background.
///
/// Every handler result becomes a JSON reply; failures are flattened to
/// `{ success: false, error }` (or the request's own failure shape) so
/// nothing escapes across the message boundary.
#[derive(Clone)]
pub struct BackgroundRouter {
    coordinator: SessionCoordinator,
}

fn answer<T: Serialize>(kind: &str, result: SkipResult<T>) -> Value {
    match result {
        Ok(value) => reply(&value),
        Err(err) => {
            log_error!("[Background] error handling {}: {}", kind, err);
            reply(&Failure::from(&err))
        }
    }
}

impl BackgroundRouter {
    pub fn new(coordinator: SessionCoordinator) -> Self {
        Self { coordinator }
    }

    pub fn coordinator(&self) -> &SessionCoordinator {
        &self.coordinator
    }

    /// Decode and dispatch a raw message. `None` means the message is not
    /// for the background and no reply is sent.
    pub async fn handle(&self, message: Value, sender: Option<TabId>) -> Option<Value> {
        match serde_json::from_value::<BackgroundRequest>(message) {
            Ok(request) => self.dispatch(request, sender).await,
            Err(err) => {
                log_warn!("[Background] ignoring unrecognized message: {}", err);
                None
            }
        }
    }

    pub async fn dispatch(&self, request: BackgroundRequest, sender: Option<TabId>) -> Option<Value> {
        let kind = request.kind();
        let coordinator = &self.coordinator;

        let response = match request {
            BackgroundRequest::ActivateSkip(activate) => {
                answer(kind, coordinator.activate_skip(activate).await)
            }
            BackgroundRequest::StopSkip { tab_id } => answer(kind, coordinator.stop_skip(tab_id).await),
            BackgroundRequest::GetSkipStatus { tab_id } => {
                answer(kind, coordinator.skip_status(tab_id).await)
            }
            BackgroundRequest::ContentReady {
                netflix_video_id,
                url,
            } => answer(
                kind,
                coordinator.content_ready(sender, netflix_video_id, &url).await,
            ),
            BackgroundRequest::ContentPing { tab_id } => {
                // Pings come from the popup; a content script never asks.
                if sender.is_some() {
                    return None;
                }
                reply(&coordinator.content_ping(tab_id).await)
            }
            BackgroundRequest::RefreshActiveSkipping => {
                answer(kind, coordinator.refresh_active_skipping(sender).await)
            }
            BackgroundRequest::SaveTimestamp(save) => {
                answer(kind, coordinator.save_timestamp(save).await)
            }
            BackgroundRequest::SearchContent { query } => {
                answer(kind, coordinator.search_content(&query).await)
            }
            BackgroundRequest::GetEpisodes { tv_show_id } => {
                answer(kind, coordinator.episodes(tv_show_id).await)
            }
            BackgroundRequest::CheckAuthStatus => reply(&coordinator.auth_status().await),
            BackgroundRequest::GetUserPreferences => {
                answer(kind, coordinator.user_preferences().await)
            }
            BackgroundRequest::SaveUserPreferences { preferences } => {
                answer(kind, coordinator.save_user_preferences(&preferences).await)
            }
            BackgroundRequest::MatchContent(request) => {
                answer(kind, coordinator.match_content(request).await)
            }
            BackgroundRequest::QuickSkipActivate(request) => {
                answer(kind, coordinator.quick_skip_activate(request).await)
            }
            BackgroundRequest::FetchPendingSkips(content) => {
                match coordinator.fetch_pending_skips(content).await {
                    Ok(found) => reply(&found),
                    Err(err) => {
                        log_error!("[Background] error fetching pending skips: {}", err);
                        json!({ "success": false, "pendingSkips": [] })
                    }
                }
            }
            BackgroundRequest::VoteOnSkip {
                skip_group_id,
                vote_type,
            } => answer(kind, coordinator.vote(skip_group_id, vote_type).await),
            BackgroundRequest::CheckAvailableSkips(content) => {
                match coordinator.available_skips(content).await {
                    Ok(available) => reply(&available),
                    Err(err) => {
                        log_error!("[Background] error checking available skips: {}", err);
                        json!({ "success": false, "skipTypes": [] })
                    }
                }
            }
            BackgroundRequest::GetDetectedContent { tab_id } => {
                answer(kind, coordinator.detected_content(tab_id).await)
            }
            BackgroundRequest::OpenAuthPopup => reply(&coordinator.open_auth_popup().await),
        };

        Some(response)
    }
}
