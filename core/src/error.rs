use crate::types::Cents;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransitError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Malformed record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error(transparent)]
    Tap(#[from] TapError),

    #[error(transparent)]
    Rider(#[from] crate::rider::RiderError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type TransitResult<T> = Result<T, TransitError>;

/// Why a single tap could not be applied.
///
/// None of these abort a run. The card and its trips are left exactly as
/// they were before the tap.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TapError {
    #[error("Card {card} is suspended")]
    CardInactive { card: String },

    #[error("Card {card} has a non-positive balance ({balance} cents)")]
    InsufficientBalance { card: String, balance: Cents },

    #[error("Card '{card}' not found")]
    UnknownCard { card: String },

    #[error("Line '{line}' not found")]
    UnknownLine { line: String },

    #[error("Stop '{stop}' not found on line '{line}'")]
    UnknownStop { stop: String, line: String },
}

impl TapError {
    /// Rejections caused by card state, as opposed to bad references.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::CardInactive { .. } | Self::InsufficientBalance { .. })
    }

    /// Stable name used for the audit log's outcome_type column.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CardInactive { .. }        => "rejected_inactive",
            Self::InsufficientBalance { .. } => "rejected_balance",
            Self::UnknownCard { .. }         => "unknown_card",
            Self::UnknownLine { .. }         => "unknown_line",
            Self::UnknownStop { .. }         => "unknown_stop",
        }
    }
}
