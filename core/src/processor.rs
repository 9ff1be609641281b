//! The tap processor: turns one tap into a trip mutation, a fare delta,
//! and at most one pair of metrics notifications.
//!
//! STATE MACHINE (per card, held explicitly in `Card::trip_state`):
//!
//!   NoOpenTrip
//!     tap            -> trip start (card must be active and positive)
//!
//!   OpenTrip, last tap = enter
//!     same stop      -> duplicate: the previous tap is undone
//!     transfer point -> continuation: enter on the new line, same trip
//!     anything else  -> exit: price the ride, charge, publish metrics
//!
//!   OpenTrip, last tap = exit
//!     same stop, explicit exit -> duplicate exit, ignored
//!     transfer point           -> continuation
//!     anything else            -> trip start (the old trip is finished)
//!
//! An explicit "exit" on the tap always takes the exit branch while the
//! rider is on board. Entry and transfer taps publish nothing.

use crate::{
    card::{Card, LastTap, TripState},
    config::FareConfig,
    error::TapError,
    metrics::{MetricEvent, MetricsHub},
    outcome::TapOutcome,
    topology::{Network, StopId},
    trip::{Direction, TapEvent},
    types::Timestamp,
};

/// A tap that has already been resolved against the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tap {
    pub stop: StopId,
    pub at:   Timestamp,
    /// Direction printed on the tap record, if any. Only an explicit exit
    /// changes how a tap is read; the state decides everything else.
    pub hint: Option<Direction>,
}

impl Tap {
    pub fn new(stop: StopId, at: Timestamp) -> Self {
        Self { stop, at, hint: None }
    }

    pub fn with_hint(stop: StopId, at: Timestamp, hint: Option<Direction>) -> Self {
        Self { stop, at, hint }
    }

    fn is_explicit_exit(&self) -> bool {
        self.hint == Some(Direction::Exit)
    }
}

#[derive(Debug, Clone)]
pub struct TapProcessor {
    config: FareConfig,
}

impl TapProcessor {
    pub fn new(config: FareConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FareConfig {
        &self.config
    }

    /// Apply one tap to `card`. On error nothing about the card changes.
    pub fn process(
        &self,
        card: &mut Card,
        tap: Tap,
        network: &Network,
        metrics: &mut MetricsHub,
    ) -> Result<TapOutcome, TapError> {
        match card.trip_state() {
            TripState::NoOpenTrip => self.start_trip(card, tap, network),
            TripState::OpenTrip { trip, .. } if card.trip(trip).is_none() => {
                log::warn!("card {}: open trip #{trip} missing from ledger, starting fresh", card.id());
                self.start_trip(card, tap, network)
            }
            TripState::OpenTrip { trip, last } => match last.direction {
                Direction::Enter => self.after_entry(card, trip, last, tap, network, metrics),
                Direction::Exit  => self.after_exit(card, trip, last, tap, network),
            },
        }
    }

    fn after_entry(
        &self,
        card: &mut Card,
        trip: usize,
        last: LastTap,
        tap: Tap,
        network: &Network,
        metrics: &mut MetricsHub,
    ) -> Result<TapOutcome, TapError> {
        if tap.is_explicit_exit() {
            return Ok(self.exit(card, trip, last, tap, network, metrics));
        }
        if tap.stop == last.stop {
            return Ok(self.reverse_duplicate(card, trip, tap, network));
        }
        if self.is_transfer(network, &last, &tap) {
            return Ok(self.continue_trip(card, trip, last, tap, network));
        }
        Ok(self.exit(card, trip, last, tap, network, metrics))
    }

    fn after_exit(
        &self,
        card: &mut Card,
        trip: usize,
        last: LastTap,
        tap: Tap,
        network: &Network,
    ) -> Result<TapOutcome, TapError> {
        if tap.is_explicit_exit() && tap.stop == last.stop {
            let (stop, line) = names(network, tap.stop);
            log::debug!("card {}: repeated exit at {stop} ({line}) ignored", card.id());
            return Ok(TapOutcome::DuplicateIgnored {
                card: card.id().clone(),
                stop,
                line,
                at: tap.at,
            });
        }
        if !tap.is_explicit_exit() && self.is_transfer(network, &last, &tap) {
            return Ok(self.continue_trip(card, trip, last, tap, network));
        }
        self.start_trip(card, tap, network)
    }

    fn start_trip(&self, card: &mut Card, tap: Tap, network: &Network) -> Result<TapOutcome, TapError> {
        if !card.is_active() {
            return Err(TapError::CardInactive { card: card.id().to_string() });
        }
        if card.balance() <= 0 {
            return Err(TapError::InsufficientBalance {
                card:    card.id().to_string(),
                balance: card.balance(),
            });
        }
        if tap.is_explicit_exit() {
            log::debug!("card {}: exit tap with no ride in progress, treated as entry", card.id());
        }

        let mut event = TapEvent::new(tap.stop, tap.at, card.id().clone());
        event.set_direction(Direction::Enter);
        let trip = card.start_trip(event, self.config.trip_cap);

        let (stop, line) = names(network, tap.stop);
        log::debug!("card {}: trip #{trip} started at {stop} ({line})", card.id());
        Ok(TapOutcome::TripStarted {
            card: card.id().clone(),
            stop,
            line,
            at: tap.at,
            trip,
        })
    }

    fn continue_trip(
        &self,
        card: &mut Card,
        trip: usize,
        last: LastTap,
        tap: Tap,
        network: &Network,
    ) -> TapOutcome {
        let mut event = TapEvent::new(tap.stop, tap.at, card.id().clone());
        event.set_direction(Direction::Enter);
        if let Some(t) = card.trip_mut(trip) {
            t.add_event(event);
        }
        card.set_state(TripState::OpenTrip {
            trip,
            last: LastTap { stop: tap.stop, direction: Direction::Enter, at: tap.at },
        });

        let (stop, to_line) = names(network, tap.stop);
        let (_, from_line) = names(network, last.stop);
        log::debug!("card {}: transfer at {stop} from {from_line} to {to_line}", card.id());
        TapOutcome::TransferContinued {
            card: card.id().clone(),
            stop,
            from_line,
            to_line,
            at: tap.at,
            trip,
        }
    }

    fn exit(
        &self,
        card: &mut Card,
        trip: usize,
        entry: LastTap,
        tap: Tap,
        network: &Network,
        metrics: &mut MetricsHub,
    ) -> TapOutcome {
        let stops = network.distance_between(entry.stop.line, entry.stop, tap.stop);
        let fare = self.config.fare_for(stops);
        let charged = card.can_charge();

        let mut event = TapEvent::new(tap.stop, tap.at, card.id().clone());
        event.set_direction(Direction::Exit);

        let (delta, trip_fare) = match card.trip_mut(trip) {
            Some(t) => {
                t.add_event(event);
                let delta = if charged { t.add_cost(fare) } else { 0 };
                (delta, t.current_fare())
            }
            None => (0, 0),
        };
        if charged {
            card.charge(delta);
        }
        card.set_state(TripState::OpenTrip {
            trip,
            last: LastTap { stop: tap.stop, direction: Direction::Exit, at: tap.at },
        });

        let (stop, line) = names(network, tap.stop);
        if charged {
            log::debug!(
                "card {}: exit at {stop} ({line}), {stops} stops, fare {delta} (trip {trip_fare})",
                card.id()
            );
        } else {
            log::warn!(
                "card {}: exit at {stop} ({line}) could not be charged {fare} (active={}, balance={})",
                card.id(),
                card.is_active(),
                card.balance()
            );
        }

        let date = tap.at.date();
        metrics.publish(MetricEvent::FareCollected { date, amount: delta });
        metrics.publish(MetricEvent::StopsTravelled { date, stops: u64::from(stops) });

        TapOutcome::SegmentCompleted {
            card: card.id().clone(),
            stop,
            line,
            at: tap.at,
            trip,
            stops,
            fare: delta,
            trip_fare,
            charged,
        }
    }

    fn reverse_duplicate(&self, card: &mut Card, trip: usize, tap: Tap, network: &Network) -> TapOutcome {
        let trip_discarded = card.remove_latest_event_from_trip(trip);
        let (stop, line) = names(network, tap.stop);
        log::debug!(
            "card {}: double tap at {stop} ({line}), previous tap undone{}",
            card.id(),
            if trip_discarded { ", trip discarded" } else { "" }
        );
        TapOutcome::DuplicateReversed {
            card: card.id().clone(),
            stop,
            line,
            at: tap.at,
            trip_discarded,
        }
    }

    fn is_transfer(&self, network: &Network, last: &LastTap, tap: &Tap) -> bool {
        if !network.is_transfer_point(last.stop, tap.stop) {
            return false;
        }
        match self.config.transfer_window() {
            Some(window) => tap.at.signed_duration_since(last.at) <= window,
            None => true,
        }
    }
}

fn names(network: &Network, id: StopId) -> (String, String) {
    let stop = network.stop(id).map(|s| s.name().to_string()).unwrap_or_default();
    let line = network.line(id.line).map(|l| l.name().to_string()).unwrap_or_default();
    (stop, line)
}
