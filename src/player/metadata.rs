//! Reads "what is playing" out of the host player's state tree.
//!
//! The tree is undocumented and changes shape between releases, so every
//! lookup here returns `None` instead of failing. Callers poll again later.

use serde_json::Value;

use crate::models::{ContentDescriptor, ContentKind};

/// Build a descriptor from `playerApp.getState()`.
pub fn extract_descriptor(player_state: &Value) -> Option<ContentDescriptor> {
    let video_metadata = player_state.pointer("/videoPlayer/videoMetadata")?.as_object()?;
    // Host order: the first entry is the session now playing.
    let (session_key, metadata) = video_metadata.iter().next()?;

    // Data is nested as metadata._video._video, older builds drop one level
    let wrapper = metadata.get("_video").filter(|v| !v.is_null())?;
    let video = wrapper.get("_video").filter(|v| !v.is_null()).unwrap_or(wrapper);
    let title = video.get("title")?.as_str()?.to_string();

    let is_episode = matches!(
        video.get("type").and_then(Value::as_str),
        Some("show") | Some("episode")
    ) || video.get("currentEpisode").is_some()
        || video.get("seasons").is_some();

    let (season_number, episode_number, episode_title) = if is_episode {
        locate_episode(video).unwrap_or((None, None, None))
    } else {
        (None, None, None)
    };

    Some(ContentDescriptor {
        title,
        content_kind: if is_episode {
            ContentKind::Episode
        } else {
            ContentKind::Movie
        },
        season_number,
        episode_number,
        episode_title,
        stable_session_id: session_key.clone(),
    })
}

type EpisodePosition = (Option<u32>, Option<u32>, Option<String>);

/// The "now playing" record only carries an episode id; season and episode
/// numbers come from finding that id inside the per-season episode lists.
fn locate_episode(video: &Value) -> Option<EpisodePosition> {
    let current = video.get("currentEpisode").filter(|v| !v.is_null())?;
    let seasons = video.get("seasons")?.as_array()?;

    for season in seasons {
        let Some(episodes) = season.get("episodes").and_then(Value::as_array) else {
            continue;
        };

        for episode in episodes {
            let matches = [episode.get("episodeId"), episode.get("id")]
                .into_iter()
                .flatten()
                .any(|id| same_id(id, current));

            if matches {
                return Some((
                    seq(season),
                    seq(episode),
                    episode.get("title").and_then(Value::as_str).map(str::to_string),
                ));
            }
        }
    }

    None
}

fn seq(value: &Value) -> Option<u32> {
    value
        .get("seq")
        .and_then(Value::as_u64)
        .filter(|n| *n > 0)
        .and_then(|n| u32::try_from(n).ok())
}

/// Ids show up as numbers in one build and strings in another.
fn same_id(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            n.to_string() == *s
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn movie_descriptor() {
        let state = json!({
            "videoPlayer": {
                "videoMetadata": {
                    "81001": { "_video": { "_video": { "title": "Heat", "type": "movie" } } }
                }
            }
        });

        let descriptor = extract_descriptor(&state).unwrap();
        assert_eq!(descriptor.title, "Heat");
        assert_eq!(descriptor.content_kind, ContentKind::Movie);
        assert_eq!(descriptor.stable_session_id, "81001");
        assert_eq!(descriptor.season_number, None);
    }

    #[test]
    fn episode_numbers_resolved_through_season_lists() {
        let state = json!({
            "videoPlayer": {
                "videoMetadata": {
                    "sess-9": {
                        "_video": {
                            "_video": {
                                "title": "Dark",
                                "type": "show",
                                "currentEpisode": 70003,
                                "seasons": [
                                    { "seq": 1, "episodes": [ { "episodeId": 70001, "seq": 1, "title": "Secrets" } ] },
                                    { "seq": 2, "episodes": [
                                        { "id": "70002", "seq": 1, "title": "Beginnings" },
                                        { "id": "70003", "seq": 2, "title": "Dark Matter" }
                                    ] }
                                ]
                            }
                        }
                    }
                }
            }
        });

        let descriptor = extract_descriptor(&state).unwrap();
        assert_eq!(descriptor.content_kind, ContentKind::Episode);
        assert_eq!(descriptor.season_number, Some(2));
        assert_eq!(descriptor.episode_number, Some(2));
        assert_eq!(descriptor.episode_title.as_deref(), Some("Dark Matter"));
    }

    #[test]
    fn single_wrapper_level_is_accepted() {
        let state = json!({
            "videoPlayer": { "videoMetadata": { "k": { "_video": { "title": "Solo", "currentEpisode": 1 } } } }
        });

        let descriptor = extract_descriptor(&state).unwrap();
        assert_eq!(descriptor.content_kind, ContentKind::Episode);
        assert_eq!(descriptor.episode_number, None);
    }

    #[test]
    fn first_session_in_host_order_wins() {
        let state: Value = serde_json::from_str(
            r#"{"videoPlayer":{"videoMetadata":{
                "zz-live":{"_video":{"_video":{"title":"Now Playing","type":"movie"}}},
                "aa-stale":{"_video":{"_video":{"title":"Earlier","type":"movie"}}}
            }}}"#,
        )
        .unwrap();

        let descriptor = extract_descriptor(&state).unwrap();
        assert_eq!(descriptor.stable_session_id, "zz-live");
        assert_eq!(descriptor.title, "Now Playing");
    }

    #[test]
    fn unrecognized_shapes_yield_none() {
        assert!(extract_descriptor(&json!({})).is_none());
        assert!(extract_descriptor(&json!({ "videoPlayer": { "videoMetadata": {} } })).is_none());
        assert!(extract_descriptor(&json!({
            "videoPlayer": { "videoMetadata": { "k": { "_video": null } } }
        }))
        .is_none());
    }
}
