//! Tap events and the trips they are assembled into.

use crate::{
    ids::Uid,
    topology::StopId,
    types::{Cents, Timestamp},
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Enter,
    Exit,
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "enter" => Ok(Self::Enter),
            "exit"  => Ok(Self::Exit),
            other   => Err(format!("unknown direction '{other}'")),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enter => f.write_str("enter"),
            Self::Exit  => f.write_str("exit"),
        }
    }
}

/// One card read at one stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapEvent {
    stop:      StopId,
    at:        Timestamp,
    card:      Uid,
    direction: Option<Direction>,
}

impl TapEvent {
    /// A tap whose direction has not been decided yet.
    pub fn new(stop: StopId, at: Timestamp, card: Uid) -> Self {
        Self { stop, at, card, direction: None }
    }

    pub fn with_direction(stop: StopId, at: Timestamp, card: Uid, direction: Direction) -> Self {
        Self { stop, at, card, direction: Some(direction) }
    }

    pub fn stop(&self) -> StopId { self.stop }
    pub fn at(&self) -> Timestamp { self.at }
    pub fn card(&self) -> &Uid { &self.card }
    pub fn direction(&self) -> Option<Direction> { self.direction }

    pub fn is_entering(&self) -> bool {
        self.direction == Some(Direction::Enter)
    }

    /// Set the direction. Once set it never changes; returns false if a
    /// direction was already recorded.
    pub fn set_direction(&mut self, direction: Direction) -> bool {
        if self.direction.is_some() {
            return false;
        }
        self.direction = Some(direction);
        true
    }
}

/// A chronologically ordered run of taps charged as one journey.
#[derive(Debug, Clone)]
pub struct Trip {
    events: Vec<TapEvent>,
    fare:   Cents,
    cap:    Cents,
}

impl Trip {
    pub fn new(initial: TapEvent, cap: Cents) -> Self {
        Self {
            events: vec![initial],
            fare: 0,
            cap: cap.max(0),
        }
    }

    /// Insert `event` keeping timestamps ascending. An event stamped the
    /// same as existing ones goes after all of them.
    pub fn add_event(&mut self, event: TapEvent) {
        let at = event.at;
        let pos = self.events.partition_point(|e| e.at <= at);
        self.events.insert(pos, event);
    }

    /// Drop the latest event. The first event is never removed; a trip
    /// is discarded as a whole by its card instead.
    pub(crate) fn pop_latest(&mut self) -> Option<TapEvent> {
        if self.events.len() < 2 {
            return None;
        }
        self.events.pop()
    }

    /// Add `amount` to the fare without passing the cap. Returns what was
    /// actually added, which is what the rider pays and what gets reported.
    pub fn add_cost(&mut self, amount: Cents) -> Cents {
        let headroom = (self.cap - self.fare).max(0);
        let delta = amount.clamp(0, headroom);
        self.fare += delta;
        delta
    }

    pub fn events(&self) -> &[TapEvent] { &self.events }
    pub fn num_events(&self) -> usize { self.events.len() }
    pub fn current_fare(&self) -> Cents { self.fare }
    pub fn cap(&self) -> Cents { self.cap }

    pub fn is_capped(&self) -> bool {
        self.fare >= self.cap
    }

    pub fn first_event(&self) -> &TapEvent {
        &self.events[0]
    }

    pub fn latest_event(&self) -> &TapEvent {
        // Never empty: built with one event and pop_latest keeps it.
        &self.events[self.events.len() - 1]
    }

    pub fn second_last_event(&self) -> Option<&TapEvent> {
        self.events.len().checked_sub(2).map(|i| &self.events[i])
    }

    pub fn start_time(&self) -> Timestamp {
        self.first_event().at
    }

    pub fn end_time(&self) -> Timestamp {
        self.latest_event().at
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end_time() - self.start_time()).num_minutes()
    }

    /// Stops in the order they were visited.
    pub fn route(&self) -> impl Iterator<Item = StopId> + '_ {
        self.events.iter().map(|e| e.stop)
    }
}
