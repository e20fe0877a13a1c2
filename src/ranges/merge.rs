use std::collections::BTreeSet;

use serde::Serialize;

use crate::models::{SkipCategory, SkipTimestamp};

/// One or more overlapping/touching skip windows collapsed into a single span.
///
/// Only used to decide when to seek. Rendering keeps the unmerged originals so
/// each category keeps its own styling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedSkipRange {
    pub start_ms: u64,
    pub end_ms: u64,
    pub types: BTreeSet<SkipCategory>,
}

impl MergedSkipRange {
    pub fn contains(&self, time_ms: u64) -> bool {
        self.start_ms <= time_ms && time_ms < self.end_ms
    }
}

impl From<&SkipTimestamp> for MergedSkipRange {
    fn from(ts: &SkipTimestamp) -> Self {
        Self {
            start_ms: ts.start_ms,
            end_ms: ts.end_ms,
            types: BTreeSet::from([ts.category]),
        }
    }
}

/// Merge catalog timestamps into seek ranges.
pub fn merge_timestamps(timestamps: &[SkipTimestamp]) -> Vec<MergedSkipRange> {
    merge_ranges(timestamps.iter().map(MergedSkipRange::from).collect())
}

/// Sort by start, then fold every range whose start is at or before the running
/// end into the accumulator, unioning its categories.
///
/// Output is sorted by start and no adjacent pair satisfies `a.end >= b.start`,
/// so merging an already-merged set returns it unchanged.
pub fn merge_ranges(mut ranges: Vec<MergedSkipRange>) -> Vec<MergedSkipRange> {
    if ranges.len() <= 1 {
        return ranges;
    }

    ranges.sort_by_key(|range| range.start_ms);

    let mut merged: Vec<MergedSkipRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if range.start_ms <= last.end_ms => {
                last.end_ms = last.end_ms.max(range.end_ms);
                last.types.extend(range.types);
            }
            _ => merged.push(range),
        }
    }

    merged
}
