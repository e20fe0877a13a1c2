use serde::Serialize;
use tokio::time::{Duration, Instant};

use crate::{engine::SkipNotice, models::SkipCategory};

/// `m:ss`, or `h:mm:ss` past the hour.
pub fn format_time_ms(ms: u64) -> String {
    let total_seconds = ms / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

/// `nudity/sex`
pub fn format_types<'a>(types: impl IntoIterator<Item = &'a SkipCategory>) -> String {
    let mut names: Vec<&str> = types.into_iter().map(SkipCategory::css_name).collect();
    names.dedup();
    names.join("/")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationKind {
    Skipped,
    VoteThanks,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub detail: Option<String>,
    /// `nudity`, `sex`, `gore` or `default` for mixed spans.
    pub icon: String,
}

/// Skip toast state: one toast at a time, auto-dismissed, and the same
/// merged span is not announced twice in quick succession.
#[derive(Debug, Clone)]
pub struct NotificationCenter {
    segment_cooldown: Duration,
    display: Duration,
    last_segment: Option<(u64, u64, Instant)>,
    visible_until: Option<Instant>,
}

impl NotificationCenter {
    pub fn new(segment_cooldown: Duration, display: Duration) -> Self {
        Self {
            segment_cooldown,
            display,
            last_segment: None,
            visible_until: None,
        }
    }

    pub fn on_skip(&mut self, notice: &SkipNotice, at: Instant) -> Option<Notification> {
        let span = (notice.range.start_ms, notice.range.end_ms);
        if let Some((start, end, shown_at)) = self.last_segment {
            if (start, end) == span && at.saturating_duration_since(shown_at) < self.segment_cooldown {
                return None;
            }
        }
        self.last_segment = Some((span.0, span.1, at));
        self.visible_until = Some(at + self.display);

        let types = format_types(&notice.range.types);
        let icon = match notice.range.types.len() {
            1 => types.clone(),
            _ => "default".to_string(),
        };
        let label = if types.is_empty() { "content".to_string() } else { types };

        Some(Notification {
            kind: NotificationKind::Skipped,
            title: format!("Skipped {label} scene"),
            detail: Some(format!(
                "{} \u{2192} {}",
                format_time_ms(span.0),
                format_time_ms(span.1)
            )),
            icon,
        })
    }

    pub fn vote_thanks(&mut self, at: Instant) -> Notification {
        self.visible_until = Some(at + self.display);
        Notification {
            kind: NotificationKind::VoteThanks,
            title: "Thanks for helping!".to_string(),
            detail: None,
            icon: "thanks".to_string(),
        }
    }

    pub fn is_visible(&self, at: Instant) -> bool {
        self.visible_until.is_some_and(|until| at < until)
    }

    pub fn hide(&mut self) {
        self.visible_until = None;
    }

    /// Called when skipping stops.
    pub fn reset(&mut self) {
        self.hide();
        self.last_segment = None;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::ranges::MergedSkipRange;
    use SkipCategory::{Nudity, Sex};

    fn notice(start: u64, end: u64, types: &[SkipCategory]) -> SkipNotice {
        SkipNotice {
            from_ms: start,
            to_ms: end,
            range: MergedSkipRange {
                start_ms: start,
                end_ms: end,
                types: types.iter().copied().collect::<BTreeSet<_>>(),
            },
            request_vote: false,
        }
    }

    fn center() -> NotificationCenter {
        NotificationCenter::new(Duration::from_millis(5000), Duration::from_millis(4000))
    }

    #[test]
    fn time_formatting() {
        assert_eq!(format_time_ms(0), "0:00");
        assert_eq!(format_time_ms(65_999), "1:05");
        assert_eq!(format_time_ms(3_723_000), "1:02:03");
    }

    #[test]
    fn merged_span_lists_every_type() {
        let mut center = center();
        let shown = center
            .on_skip(&notice(0, 125_000, &[Nudity, Sex]), Instant::now())
            .unwrap();

        assert_eq!(shown.title, "Skipped nudity/sex scene");
        assert_eq!(shown.detail.as_deref(), Some("0:00 \u{2192} 2:05"));
        assert_eq!(shown.icon, "default");
    }

    #[test]
    fn same_span_is_not_repeated_within_cooldown() {
        let mut center = center();
        let t0 = Instant::now();
        let span = notice(1000, 2000, &[Nudity]);

        assert!(center.on_skip(&span, t0).is_some());
        assert!(center.on_skip(&span, t0 + Duration::from_millis(4999)).is_none());
        assert!(center
            .on_skip(&notice(5000, 6000, &[Sex]), t0 + Duration::from_millis(10))
            .is_some());
        assert!(center.on_skip(&span, t0 + Duration::from_millis(5100)).is_some());
    }

    #[test]
    fn toast_auto_dismisses() {
        let mut center = center();
        let t0 = Instant::now();
        center.on_skip(&notice(0, 10, &[Nudity]), t0);

        assert!(center.is_visible(t0 + Duration::from_millis(3999)));
        assert!(!center.is_visible(t0 + Duration::from_millis(4000)));
    }
}
