use thiserror::Error;

/// Errors raised by the leaderboard.
///
/// A nickname that is absent from the sheet is not an error; see
/// [`crate::repository::Lookup::NotFound`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LeaderboardError {
    /// Credential load or token exchange failed.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Network or API failure while reading or writing the sheet.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// A sheet row could not be interpreted as a score record.
    #[error("malformed row for {name:?}: {reason}")]
    MalformedRow {
        /// Nickname of the offending row.
        name: String,
        /// What failed to parse.
        reason: String,
    },

    /// Rejected nickname.
    #[error("invalid nickname: {0}")]
    InvalidName(String),

    /// Score index outside `0..len`.
    #[error("question index {index} out of range (0..{len})")]
    ScoreIndex {
        /// Requested index.
        index: usize,
        /// Number of questions.
        len: usize,
    },

    /// The edit would push the total outside the `i64` range.
    #[error("setting question {index} to {value} would overflow the total")]
    TotalOverflow {
        /// Requested index.
        index: usize,
        /// Rejected value.
        value: i64,
    },

    /// Configuration file missing, unreadable or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Template or chart rendering failed.
    #[error("render error: {0}")]
    Render(String),
}

pub type Result<T> = std::result::Result<T, LeaderboardError>;
