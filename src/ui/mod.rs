//! Presentation state for the in-player controls. Nothing here touches the
//! DOM; the runtime turns these states into page messages.

pub mod fab;
pub mod marking;
pub mod notifications;

pub use fab::{ButtonVisibility, FabAction, FabState, FabView, LoadingStatus};
pub use marking::{normalize_mark, MarkOutcome, MarkingState};
pub use notifications::{format_time_ms, format_types, Notification, NotificationCenter, NotificationKind};
