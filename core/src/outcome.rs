//! What happened to each tap. Outcomes are returned to the caller and
//! persisted, as JSON, to the tap audit log.

use crate::{
    error::TapError,
    ids::Uid,
    types::{Cents, Timestamp},
};
use serde::{Deserialize, Serialize};

/// Variants are append-only; the audit log stores their tag names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TapOutcome {
    /// A new trip was opened. Nothing is charged until the rider exits.
    TripStarted {
        card: Uid,
        stop: String,
        line: String,
        at:   Timestamp,
        trip: usize,
    },
    /// The rider changed lines at a shared stop; the open trip continues
    /// under the same cap.
    TransferContinued {
        card:      Uid,
        stop:      String,
        from_line: String,
        to_line:   String,
        at:        Timestamp,
        trip:      usize,
    },
    /// The rider left the vehicle and the ride was priced.
    SegmentCompleted {
        card:      Uid,
        stop:      String,
        line:      String,
        at:        Timestamp,
        trip:      usize,
        stops:     u32,
        /// What this tap actually added to the trip (and was charged).
        fare:      Cents,
        trip_fare: Cents,
        /// False when the card could not be charged at exit.
        charged:   bool,
    },
    /// A repeated tap at the same reader undid the previous tap.
    DuplicateReversed {
        card:           Uid,
        stop:           String,
        line:           String,
        at:             Timestamp,
        trip_discarded: bool,
    },
    /// A repeated exit tap after the fare was already realised.
    DuplicateIgnored {
        card: Uid,
        stop: String,
        line: String,
        at:   Timestamp,
    },
}

impl TapOutcome {
    /// Stable name used for the audit log's outcome_type column.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TripStarted { .. }       => "trip_started",
            Self::TransferContinued { .. } => "transfer_continued",
            Self::SegmentCompleted { .. }  => "segment_completed",
            Self::DuplicateReversed { .. } => "duplicate_reversed",
            Self::DuplicateIgnored { .. }  => "duplicate_ignored",
        }
    }

    pub fn card(&self) -> &Uid {
        match self {
            Self::TripStarted { card, .. }
            | Self::TransferContinued { card, .. }
            | Self::SegmentCompleted { card, .. }
            | Self::DuplicateReversed { card, .. }
            | Self::DuplicateIgnored { card, .. } => card,
        }
    }

    /// Fare realised by this tap; zero for everything but an exit.
    pub fn fare(&self) -> Cents {
        match self {
            Self::SegmentCompleted { fare, charged: true, .. } => *fare,
            _ => 0,
        }
    }
}

/// Audit payload for a tap that was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapRejection {
    pub card:   String,
    pub stop:   String,
    pub line:   String,
    pub at:     Timestamp,
    pub reason: String,
}

impl TapRejection {
    pub fn new(card: &str, stop: &str, line: &str, at: Timestamp, err: &TapError) -> Self {
        Self {
            card:   card.to_string(),
            stop:   stop.to_string(),
            line:   line.to_string(),
            at,
            reason: err.to_string(),
        }
    }
}
