use serde::Serialize;

/// Failures that can surface at a context boundary.
///
/// Inside a context these travel as ordinary `Result`s. At the boundary the
/// router flattens them into a [`Failure`] so nothing is thrown across.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SkipError {
    #[error("Netflix player is not available")]
    PlayerUnavailable,

    #[error("video id mismatch: session is for {expected}, page is on {actual}")]
    VideoIdentityMismatch { expected: String, actual: String },

    #[error("message target unreachable: {0}")]
    ChannelUnreachable(String),

    #[error("Not authenticated. Please sign in.")]
    Unauthenticated,

    #[error("Please sign in via the Skipit popup first.")]
    SignInRequired,

    #[error("Content not found in database")]
    ContentNotMatched,

    #[error("No active Netflix tab found. Please navigate to Netflix first.")]
    NoNetflixTab,

    #[error("Please navigate to a Netflix video (netflix.com/watch/...) first.")]
    NotOnWatchPage,

    #[error(
        "Please refresh the Netflix page and try again. The extension needs to reload on the page."
    )]
    ContentScriptMissing,

    #[error("No timestamps found for selected types")]
    NoTimestamps,

    #[error("Authentication expired. Please sign in again.")]
    SessionExpired,

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("request failed: {0}")]
    Network(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("Could not communicate with Netflix tab")]
    TabUnresponsive,

    /// The other side answered `{ success: false, error }`.
    #[error("{0}")]
    Rejected(String),

    #[error("timed out waiting for a reply")]
    Timeout,
}

impl SkipError {
    pub fn storage(err: impl std::fmt::Display) -> Self {
        SkipError::Storage(err.to_string())
    }
}

impl From<reqwest::Error> for SkipError {
    fn from(err: reqwest::Error) -> Self {
        SkipError::Network(err.to_string())
    }
}

/// Wire shape of a failed request: `{ "success": false, "error": "..." }`.
#[derive(Debug, Clone, Serialize, serde::Deserialize, PartialEq)]
pub struct Failure {
    pub success: bool,
    pub error: String,
}

impl From<&SkipError> for Failure {
    fn from(err: &SkipError) -> Self {
        Self {
            success: false,
            error: err.to_string(),
        }
    }
}

pub type SkipResult<T> = Result<T, SkipError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_carries_user_facing_message() {
        let failure = Failure::from(&SkipError::NoNetflixTab);
        assert!(!failure.success);
        assert_eq!(
            failure.error,
            "No active Netflix tab found. Please navigate to Netflix first."
        );

        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["success"], false);
    }
}
