pub mod merge;

pub use merge::{merge_ranges, merge_timestamps, MergedSkipRange};
