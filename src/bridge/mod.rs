//! Content-script side: the page bridge between the background and the
//! main-world runtime, plus the wire protocol shared by all three contexts.

pub mod cache;
pub mod page;
pub mod protocol;

pub use cache::{MatchCache, MATCH_CACHE_TTL};
pub use page::{BackgroundChannel, BridgeConfig, BridgePhase, MarkDraft, PageBridge, QuickPanel, WindowChannel};
pub use protocol::{
    decode_reply, reply, Ack, BackgroundRequest, ContentRef, DetectedContent, PageCommand,
    PageEvent, TabMessage, UiUpdate,
};
