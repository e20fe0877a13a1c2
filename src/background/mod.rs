//! Background context: per-tab session store, session coordinator and the
//! message router in front of them.

pub mod coordinator;
pub mod router;
pub mod tab_state;
pub mod tabs;

pub use coordinator::SessionCoordinator;
pub use router::BackgroundRouter;
pub use tab_state::{storage_key, TabStateStore};
pub use tabs::{is_netflix_url, watch_identity, BrowserTab, BrowserTabs};
