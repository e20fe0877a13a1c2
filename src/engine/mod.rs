pub mod config;
pub mod controller;
pub mod events;
pub mod state;

pub use config::EngineConfig;
pub use controller::SkipEngine;
pub use events::{EngineEvent, SkipNotice};
pub use state::{EngineStatus, SkipDecision, SkipState};
