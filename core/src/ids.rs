//! Card and rider identifiers.
//!
//! IDs are nine-digit strings tagged by their first digit: `1xxxxxxxx` for
//! cards, `2xxxxxxxx` for riders. The allocator is owned by whoever loads
//! a run and is reset between runs; nothing here is global.

use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdKind {
    Card,
    Rider,
}

impl IdKind {
    fn prefix(self) -> char {
        match self {
            Self::Card  => '1',
            Self::Rider => '2',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uid(String);

impl Uid {
    /// Wrap an ID that was validated elsewhere. Loaders should go through
    /// `IdAllocator::claim` so collisions are caught.
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The kind encoded in the leading digit, if it is a known tag.
    pub fn kind(&self) -> Option<IdKind> {
        match self.0.chars().next() {
            Some('1') => Some(IdKind::Card),
            Some('2') => Some(IdKind::Rider),
            _ => None,
        }
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&Uid> for String {
    fn from(id: &Uid) -> Self {
        id.0.clone()
    }
}

#[derive(Debug, Default)]
pub struct IdAllocator {
    next_card:  u64,
    next_rider: u64,
    issued:     HashSet<String>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget every issued ID and restart both counters.
    pub fn reset(&mut self) {
        self.next_card = 0;
        self.next_rider = 0;
        self.issued.clear();
    }

    pub fn issued_count(&self) -> usize {
        self.issued.len()
    }

    /// Allocate the next free sequential ID of `kind`.
    pub fn generate(&mut self, kind: IdKind) -> Uid {
        loop {
            let counter = match kind {
                IdKind::Card  => &mut self.next_card,
                IdKind::Rider => &mut self.next_rider,
            };
            let candidate = format!("{}{:08}", kind.prefix(), *counter);
            *counter += 1;
            if self.issued.insert(candidate.clone()) {
                return Uid(candidate);
            }
        }
    }

    /// Register an ID read from an input file. If it is already taken, the
    /// next free integer after it is used instead.
    ///
    /// Returns `None` if `text` is not a numeric ID.
    pub fn claim(&mut self, text: &str) -> Option<Uid> {
        let text = text.trim();
        if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let mut value: u64 = text.parse().ok()?;
        let mut candidate = text.to_string();
        while self.issued.contains(&candidate) {
            value = value.checked_add(1)?;
            candidate = value.to_string();
        }
        if candidate != text {
            log::warn!("ID {text} already issued, assigned {candidate} instead");
        }
        self.issued.insert(candidate.clone());
        Some(Uid(candidate))
    }

    /// Look up an already-issued ID without registering anything.
    pub fn find(&self, text: &str) -> Option<Uid> {
        self.issued.get(text.trim()).map(|s| Uid(s.clone()))
    }
}
