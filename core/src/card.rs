//! Fare cards: balance, activation, and the trip ledger.

use crate::{
    ids::Uid,
    topology::StopId,
    trip::{Direction, TapEvent, Trip},
    types::{Cents, Timestamp},
};

/// The most recent tap applied to an open trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastTap {
    pub stop:      StopId,
    pub direction: Direction,
    pub at:        Timestamp,
}

impl LastTap {
    fn of(event: &TapEvent) -> Self {
        Self {
            stop:      event.stop(),
            direction: event.direction().unwrap_or(Direction::Enter),
            at:        event.at(),
        }
    }
}

/// Where a card stands between taps.
///
/// `OpenTrip` with `last.direction == Exit` means the rider has left the
/// vehicle but the trip can still be continued by a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TripState {
    #[default]
    NoOpenTrip,
    OpenTrip { trip: usize, last: LastTap },
}

#[derive(Debug, Clone)]
pub struct Card {
    id:      Uid,
    bearer:  Uid,
    balance: Cents,
    active:  bool,
    trips:   Vec<Trip>,
    state:   TripState,
}

impl Card {
    pub fn new(id: Uid, bearer: Uid, balance: Cents) -> Self {
        Self {
            id,
            bearer,
            balance,
            active: true,
            trips: Vec::new(),
            state: TripState::NoOpenTrip,
        }
    }

    pub fn id(&self) -> &Uid { &self.id }
    pub fn bearer(&self) -> &Uid { &self.bearer }
    pub fn balance(&self) -> Cents { self.balance }
    pub fn is_active(&self) -> bool { self.active }
    pub fn trips(&self) -> &[Trip] { &self.trips }
    pub fn trip_state(&self) -> TripState { self.state }

    pub fn trip(&self, index: usize) -> Option<&Trip> {
        self.trips.get(index)
    }

    pub(crate) fn trip_mut(&mut self, index: usize) -> Option<&mut Trip> {
        self.trips.get_mut(index)
    }

    pub(crate) fn set_state(&mut self, state: TripState) {
        self.state = state;
    }

    /// A card may be charged (and may start a trip) only while active with
    /// a strictly positive balance.
    pub fn can_charge(&self) -> bool {
        self.active && self.balance > 0
    }

    /// Deduct `amount`. The balance may go negative, but only a card that
    /// is active and positive at charge time can be charged at all.
    pub fn charge(&mut self, amount: Cents) -> bool {
        if !self.can_charge() {
            return false;
        }
        self.balance -= amount;
        true
    }

    pub fn add_balance(&mut self, amount: Cents) {
        self.balance += amount;
    }

    /// Only the bearer may suspend their card.
    pub fn suspend(&mut self, requester: &Uid) -> bool {
        if *requester != self.bearer {
            return false;
        }
        self.active = false;
        true
    }

    /// Only the bearer may reactivate their card.
    pub fn reactivate(&mut self, requester: &Uid) -> bool {
        if *requester != self.bearer {
            return false;
        }
        self.active = true;
        true
    }

    /// Open a new trip seeded with `initial` and make it the open trip.
    /// Returns its index in the ledger.
    pub fn start_trip(&mut self, initial: TapEvent, cap: Cents) -> usize {
        let last = LastTap::of(&initial);
        let index = self.trips.len();
        self.trips.push(Trip::new(initial, cap));
        self.state = TripState::OpenTrip { trip: index, last };
        index
    }

    /// Undo the latest tap on trip `index`. A trip left with no taps is
    /// dropped from the ledger. Returns true if the trip was dropped.
    pub fn remove_latest_event_from_trip(&mut self, index: usize) -> bool {
        let Some(trip) = self.trips.get_mut(index) else {
            return false;
        };
        if trip.pop_latest().is_some() {
            if let TripState::OpenTrip { trip: open, .. } = self.state {
                if open == index {
                    let last = LastTap::of(trip.latest_event());
                    self.state = TripState::OpenTrip { trip: index, last };
                }
            }
            return false;
        }

        self.trips.remove(index);
        self.state = match self.state {
            TripState::OpenTrip { trip: open, .. } if open == index => TripState::NoOpenTrip,
            TripState::OpenTrip { trip: open, last } if open > index => {
                TripState::OpenTrip { trip: open - 1, last }
            }
            other => other,
        };
        true
    }
}
