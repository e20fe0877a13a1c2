pub mod checker;
pub mod state;

pub use checker::{PendingChecker, PendingEvent};
pub use state::{PendingState, PromptChange, PromptPolicy};
