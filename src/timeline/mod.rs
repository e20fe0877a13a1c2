//! Projects skip windows onto the player's seek bar.
//!
//! The host recreates its player chrome often, which drops our containers.
//! Callers invoke the `ensure_*` operations repeatedly; they only draw when
//! the container is missing and the caller still owns the data.

use std::sync::Arc;

use serde::Serialize;

use crate::models::{PendingSkip, SkipTimestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TimelineLayer {
    Active,
    Pending,
}

impl TimelineLayer {
    pub fn container_id(&self) -> &'static str {
        match self {
            TimelineLayer::Active => "skipit-timeline-segments",
            TimelineLayer::Pending => "skipit-timeline-segments-pending",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineInfo {
    pub duration_ms: u64,
    pub bar_width_px: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineSegment {
    pub left_percent: f64,
    pub width_percent: f64,
    pub css_class: String,
    pub label: String,
    pub start_ms: u64,
    pub end_ms: u64,
    pub group_id: Option<u64>,
}

/// DOM side of the seek bar.
pub trait TimelineSurface: Send + Sync {
    /// `None` while the seek bar is absent or has no usable duration.
    fn timeline(&self) -> Option<TimelineInfo>;

    fn is_mounted(&self, layer: TimelineLayer) -> bool;

    fn mount(&self, layer: TimelineLayer, segments: Vec<TimelineSegment>);

    fn unmount(&self, layer: TimelineLayer);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Rendered,
    AlreadyMounted,
    /// Seek bar not available yet; try again on the next tick.
    Retry,
    /// Caller no longer owns the layer, nothing drawn.
    Refused,
    Cleared,
}

fn percent(value_ms: u64, duration_ms: u64) -> f64 {
    value_ms as f64 / duration_ms as f64 * 100.0
}

pub fn project(timestamps: &[SkipTimestamp], duration_ms: u64) -> Vec<TimelineSegment> {
    if duration_ms == 0 {
        return Vec::new();
    }

    timestamps
        .iter()
        .map(|ts| TimelineSegment {
            left_percent: percent(ts.start_ms, duration_ms),
            width_percent: percent(ts.end_ms - ts.start_ms, duration_ms),
            css_class: format!("skipit-segment skipit-segment--{}", ts.category.css_name()),
            label: ts.category.as_str().to_string(),
            start_ms: ts.start_ms,
            end_ms: ts.end_ms,
            group_id: ts.group_id,
        })
        .collect()
}

pub fn project_pending(pending: &[PendingSkip], duration_ms: u64) -> Vec<TimelineSegment> {
    if duration_ms == 0 {
        return Vec::new();
    }

    pending
        .iter()
        .map(|skip| {
            let width = skip.end_time.saturating_sub(skip.start_time);
            TimelineSegment {
                left_percent: percent(skip.start_time, duration_ms),
                width_percent: percent(width, duration_ms),
                css_class: "skipit-segment skipit-segment--pending".to_string(),
                label: format!("{} (unverified)", skip.category.as_str()),
                start_ms: skip.start_time,
                end_ms: skip.end_time,
                group_id: Some(skip.group_id),
            }
        })
        .collect()
}

#[derive(Clone)]
pub struct TimelineRenderer {
    surface: Arc<dyn TimelineSurface>,
}

impl TimelineRenderer {
    pub fn new(surface: Arc<dyn TimelineSurface>) -> Self {
        Self { surface }
    }

    /// Draw the confirmed segments. `owned` is `None` once skipping stopped;
    /// a late call then removes whatever is left instead of drawing.
    pub fn ensure_active(&self, owned: Option<&[SkipTimestamp]>, replace: bool) -> RenderOutcome {
        let Some(timestamps) = owned else {
            return self.refuse(TimelineLayer::Active);
        };
        self.ensure(TimelineLayer::Active, replace, timestamps.is_empty(), |duration| {
            project(timestamps, duration)
        })
    }

    pub fn ensure_pending(&self, pending: &[PendingSkip], replace: bool) -> RenderOutcome {
        self.ensure(TimelineLayer::Pending, replace, pending.is_empty(), |duration| {
            project_pending(pending, duration)
        })
    }

    pub fn clear(&self, layer: TimelineLayer) {
        if self.surface.is_mounted(layer) {
            self.surface.unmount(layer);
        }
    }

    fn refuse(&self, layer: TimelineLayer) -> RenderOutcome {
        self.clear(layer);
        RenderOutcome::Refused
    }

    fn ensure<F>(&self, layer: TimelineLayer, replace: bool, empty: bool, build: F) -> RenderOutcome
    where
        F: FnOnce(u64) -> Vec<TimelineSegment>,
    {
        if empty {
            self.clear(layer);
            return RenderOutcome::Cleared;
        }

        if !replace && self.surface.is_mounted(layer) {
            return RenderOutcome::AlreadyMounted;
        }

        let Some(info) = self.surface.timeline() else {
            return RenderOutcome::Retry;
        };
        if info.bar_width_px == 0 || info.duration_ms == 0 {
            return RenderOutcome::Retry;
        }

        self.clear(layer);
        self.surface.mount(layer, build(info.duration_ms));
        RenderOutcome::Rendered
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeTimeline;
    use super::*;
    use crate::models::SkipCategory;

    #[test]
    fn projection_uses_percent_of_duration() {
        let segments = project(&[SkipTimestamp::new(1000, 3000, SkipCategory::Gore)], 10_000);
        assert_eq!(segments.len(), 1);
        assert!((segments[0].left_percent - 10.0).abs() < 1e-9);
        assert!((segments[0].width_percent - 20.0).abs() < 1e-9);
        assert_eq!(segments[0].css_class, "skipit-segment skipit-segment--gore");
    }

    #[test]
    fn retries_until_seek_bar_exists_then_stays_idempotent() {
        let surface = Arc::new(FakeTimeline::default());
        let renderer = TimelineRenderer::new(surface.clone());
        let owned = vec![SkipTimestamp::new(0, 1000, SkipCategory::Nudity)];

        assert_eq!(renderer.ensure_active(Some(&owned), false), RenderOutcome::Retry);

        *surface.info.lock().unwrap() = Some(TimelineInfo {
            duration_ms: 60_000,
            bar_width_px: 640,
        });
        assert_eq!(renderer.ensure_active(Some(&owned), false), RenderOutcome::Rendered);
        assert_eq!(renderer.ensure_active(Some(&owned), false), RenderOutcome::AlreadyMounted);

        surface.wipe();
        assert_eq!(renderer.ensure_active(Some(&owned), false), RenderOutcome::Rendered);
        assert_eq!(*surface.mount_count.lock().unwrap(), 2);
    }

    #[test]
    fn unowned_layer_is_never_redrawn() {
        let surface = Arc::new(FakeTimeline::with_duration(60_000));
        let renderer = TimelineRenderer::new(surface.clone());
        let owned = vec![SkipTimestamp::new(0, 1000, SkipCategory::Nudity)];

        renderer.ensure_active(Some(&owned), true);
        assert!(surface.is_mounted(TimelineLayer::Active));

        assert_eq!(renderer.ensure_active(None, false), RenderOutcome::Refused);
        assert!(!surface.is_mounted(TimelineLayer::Active));
    }

    #[test]
    fn pending_markers_carry_group_ids() {
        let surface = Arc::new(FakeTimeline::with_duration(100_000));
        let renderer = TimelineRenderer::new(surface.clone());
        let pending = vec![PendingSkip {
            group_id: 7,
            start_time: 10_000,
            end_time: 15_000,
            category: SkipCategory::Sex,
        }];

        renderer.ensure_pending(&pending, true);
        let segments = surface.segments(TimelineLayer::Pending).unwrap();
        assert_eq!(segments[0].group_id, Some(7));
        assert_eq!(segments[0].label, "Sex (unverified)");

        assert_eq!(renderer.ensure_pending(&[], false), RenderOutcome::Cleared);
        assert!(surface.segments(TimelineLayer::Pending).is_none());
    }
}
