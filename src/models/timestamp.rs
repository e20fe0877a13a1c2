use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SkipCategory {
    #[serde(alias = "nudity")]
    Nudity,
    #[serde(alias = "sex")]
    Sex,
    #[serde(alias = "gore")]
    Gore,
}

impl SkipCategory {
    pub const ALL: [SkipCategory; 3] = [SkipCategory::Nudity, SkipCategory::Sex, SkipCategory::Gore];

    pub fn as_str(&self) -> &'static str {
        match self {
            SkipCategory::Nudity => "Nudity",
            SkipCategory::Sex => "Sex",
            SkipCategory::Gore => "Gore",
        }
    }

    /// Lower-case form used for CSS classes and the available-types list.
    pub fn css_name(&self) -> &'static str {
        match self {
            SkipCategory::Nudity => "nudity",
            SkipCategory::Sex => "sex",
            SkipCategory::Gore => "gore",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "nudity" => Some(SkipCategory::Nudity),
            "sex" => Some(SkipCategory::Sex),
            "gore" => Some(SkipCategory::Gore),
            _ => None,
        }
    }
}

impl std::fmt::Display for SkipCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SkipStatus {
    Pending,
    Verified,
    Disputed,
    Rejected,
}

/// A catalog skip window in milliseconds of media time.
///
/// `start_ms < end_ms` holds for every value: both [`SkipTimestamp::new`] and
/// deserialization swap reversed bounds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(from = "WireTimestamp")]
pub struct SkipTimestamp {
    #[serde(rename = "start_time")]
    pub start_ms: u64,
    #[serde(rename = "end_time")]
    pub end_ms: u64,
    #[serde(rename = "type")]
    pub category: SkipCategory,
    #[serde(rename = "id", skip_serializing_if = "Option::is_none")]
    pub group_id: Option<u64>,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SkipStatus>,
    #[serde(rename = "userContributed")]
    pub user_contributed: bool,
    #[serde(rename = "userVoted")]
    pub user_voted: bool,
}

const DEFAULT_CONFIDENCE: f64 = 0.5;

impl SkipTimestamp {
    pub fn new(start_ms: u64, end_ms: u64, category: SkipCategory) -> Self {
        let (start_ms, end_ms) = if start_ms > end_ms {
            (end_ms, start_ms)
        } else {
            (start_ms, end_ms)
        };

        Self {
            start_ms,
            end_ms,
            category,
            group_id: None,
            confidence: DEFAULT_CONFIDENCE,
            status: None,
            user_contributed: false,
            user_voted: false,
        }
    }

    pub fn with_group(mut self, group_id: u64) -> Self {
        self.group_id = Some(group_id);
        self
    }

    pub fn contains(&self, time_ms: u64) -> bool {
        self.start_ms <= time_ms && time_ms < self.end_ms
    }

    pub fn duration_ms(&self) -> u64 {
        self.end_ms - self.start_ms
    }
}

#[derive(Deserialize)]
struct WireTimestamp {
    start_time: f64,
    end_time: f64,
    #[serde(rename = "type")]
    category: SkipCategory,
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    status: Option<SkipStatus>,
    #[serde(default, rename = "userContributed")]
    user_contributed: bool,
    #[serde(default, rename = "userVoted")]
    user_voted: bool,
}

fn wire_ms(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.round() as u64
    } else {
        0
    }
}

impl From<WireTimestamp> for SkipTimestamp {
    fn from(wire: WireTimestamp) -> Self {
        let mut timestamp = SkipTimestamp::new(wire_ms(wire.start_time), wire_ms(wire.end_time), wire.category);
        timestamp.group_id = wire.id;
        timestamp.confidence = wire.confidence.unwrap_or(DEFAULT_CONFIDENCE).clamp(0.0, 1.0);
        timestamp.status = wire.status;
        timestamp.user_contributed = wire.user_contributed;
        timestamp.user_voted = wire.user_voted;
        timestamp
    }
}

/// An unverified, crowd-submitted skip group awaiting votes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PendingSkip {
    #[serde(rename = "id")]
    pub group_id: u64,
    pub start_time: u64,
    pub end_time: u64,
    #[serde(rename = "type")]
    pub category: SkipCategory,
}

impl PendingSkip {
    /// Window in which the vote prompt may appear: `[start - lead, end)`.
    pub fn prompt_window_contains(&self, time_ms: u64, lead_ms: u64) -> bool {
        let prompt_start = self.start_time.saturating_sub(lead_ms);
        prompt_start <= time_ms && time_ms < self.end_time
    }
}

/// `voteType` on the wire: `1` confirms a pending group, `-1` disputes it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "i8", into = "i8")]
pub enum VoteDirection {
    Up,
    Down,
}

impl From<VoteDirection> for i8 {
    fn from(direction: VoteDirection) -> Self {
        match direction {
            VoteDirection::Up => 1,
            VoteDirection::Down => -1,
        }
    }
}

impl TryFrom<i8> for VoteDirection {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(VoteDirection::Up),
            -1 => Ok(VoteDirection::Down),
            other => Err(format!("voteType must be 1 or -1, got {other}")),
        }
    }
}
