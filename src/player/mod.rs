pub mod adapter;
pub mod metadata;

pub use adapter::{HostPage, NetflixPlayer, VideoPlayer};
pub use metadata::extract_descriptor;
