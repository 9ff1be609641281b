//! Riders, the cards they hold, and the directory the engine resolves
//! card IDs through.

use crate::{
    card::Card,
    error::{TransitError, TransitResult},
    ids::Uid,
    trip::Trip,
    types::Cents,
};
use chrono::Datelike;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

pub const RECENT_TRIP_COUNT: usize = 3;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RiderError {
    #[error("Invalid name: {reason}")]
    InvalidName { reason: &'static str },

    #[error("Cannot reload with {amount} cents; valid amounts are {allowed:?}")]
    InvalidReload { amount: Cents, allowed: Vec<Cents> },

    #[error("Rider {rider} holds no card {card}")]
    NotCardHolder { rider: String, card: String },
}

#[derive(Debug, Clone)]
pub struct Rider {
    id:    Uid,
    name:  String,
    email: String,
    cards: Vec<Card>,
}

impl Rider {
    pub fn new(id: Uid, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into(),
            cards: Vec::new(),
        }
    }

    pub fn id(&self) -> &Uid { &self.id }
    pub fn name(&self) -> &str { &self.name }
    pub fn email(&self) -> &str { &self.email }
    pub fn cards(&self) -> &[Card] { &self.cards }

    pub fn card(&self, id: &str) -> Option<&Card> {
        self.cards.iter().find(|c| c.id().as_str() == id)
    }

    pub fn card_mut(&mut self, id: &str) -> Option<&mut Card> {
        self.cards.iter_mut().find(|c| c.id().as_str() == id)
    }

    /// Take ownership of `card` if this rider is its bearer.
    pub fn issue_card(&mut self, card: Card) -> bool {
        if *card.bearer() != self.id {
            return false;
        }
        self.cards.push(card);
        true
    }

    pub fn suspend_card(&mut self, card_id: &str) -> Result<(), RiderError> {
        let rider = self.id.clone();
        let card = self.held_card_mut(card_id)?;
        card.suspend(&rider);
        log::info!("rider {rider}: card {card_id} suspended");
        Ok(())
    }

    pub fn reactivate_card(&mut self, card_id: &str) -> Result<(), RiderError> {
        let rider = self.id.clone();
        let card = self.held_card_mut(card_id)?;
        card.reactivate(&rider);
        log::info!("rider {rider}: card {card_id} reactivated");
        Ok(())
    }

    /// Top up a card with one of the `allowed` amounts. Returns the new
    /// balance.
    pub fn reload_card(&mut self, card_id: &str, amount: Cents, allowed: &[Cents]) -> Result<Cents, RiderError> {
        if !allowed.contains(&amount) {
            log::warn!("rider {}: rejected reload of {amount} cents", self.id);
            return Err(RiderError::InvalidReload { amount, allowed: allowed.to_vec() });
        }
        let card = self.held_card_mut(card_id)?;
        card.add_balance(amount);
        Ok(card.balance())
    }

    /// Names are letters and whitespace only, and not blank.
    pub fn change_name(&mut self, name: &str) -> Result<(), RiderError> {
        if name.trim().is_empty() {
            return Err(RiderError::InvalidName { reason: "name must not be empty" });
        }
        if !name.chars().all(|c| c.is_ascii_alphabetic() || c.is_whitespace()) {
            return Err(RiderError::InvalidName { reason: "name must not contain special characters" });
        }
        log::info!("rider {}: name changed to {name}", self.id);
        self.name = name.to_string();
        Ok(())
    }

    /// Up to three trips across all cards, most recently ended first.
    pub fn recent_trips(&self) -> Vec<&Trip> {
        let mut trips: Vec<&Trip> = self.cards.iter().flat_map(|c| c.trips()).collect();
        trips.sort_by(|a, b| b.end_time().cmp(&a.end_time()));
        trips.truncate(RECENT_TRIP_COUNT);
        trips
    }

    /// Mean of per-month fare totals, months keyed by trip start. Zero
    /// for a rider who has never travelled.
    pub fn average_monthly_cost(&self) -> Cents {
        let mut monthly: BTreeMap<(i32, u32), Cents> = BTreeMap::new();
        for trip in self.cards.iter().flat_map(|c| c.trips()) {
            let start = trip.start_time();
            *monthly.entry((start.year(), start.month())).or_insert(0) += trip.current_fare();
        }
        if monthly.is_empty() {
            return 0;
        }
        monthly.values().sum::<Cents>() / monthly.len() as Cents
    }

    fn held_card_mut(&mut self, card_id: &str) -> Result<&mut Card, RiderError> {
        let rider = self.id.to_string();
        self.card_mut(card_id).ok_or_else(|| RiderError::NotCardHolder {
            rider,
            card: card_id.to_string(),
        })
    }
}

/// Every rider in the run, with an index from card ID to holder.
#[derive(Debug, Default)]
pub struct RiderDirectory {
    riders:     Vec<Rider>,
    card_index: HashMap<String, usize>,
}

impl RiderDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_rider(&mut self, rider: Rider) -> TransitResult<()> {
        if self.find_rider(rider.id().as_str()).is_some() {
            return Err(TransitError::Config(format!("duplicate rider {}", rider.id())));
        }
        let slot = self.riders.len();
        for card in rider.cards() {
            self.card_index.insert(card.id().to_string(), slot);
        }
        self.riders.push(rider);
        Ok(())
    }

    /// Hand `card` to its bearer.
    pub fn issue_card(&mut self, card: Card) -> TransitResult<()> {
        let card_id = card.id().to_string();
        if self.card_index.contains_key(&card_id) {
            return Err(TransitError::Config(format!("card {card_id} issued twice")));
        }
        let slot = self
            .riders
            .iter()
            .position(|r| r.id() == card.bearer())
            .ok_or_else(|| TransitError::Config(format!("card {card_id}: unknown bearer {}", card.bearer())))?;
        self.riders[slot].issue_card(card);
        self.card_index.insert(card_id, slot);
        Ok(())
    }

    pub fn riders(&self) -> &[Rider] {
        &self.riders
    }

    pub fn card_count(&self) -> usize {
        self.card_index.len()
    }

    pub fn find_rider(&self, id: &str) -> Option<&Rider> {
        self.riders.iter().find(|r| r.id().as_str() == id)
    }

    pub fn find_rider_mut(&mut self, id: &str) -> Option<&mut Rider> {
        self.riders.iter_mut().find(|r| r.id().as_str() == id)
    }

    pub fn find_card(&self, id: &str) -> Option<&Card> {
        let slot = *self.card_index.get(id)?;
        self.riders.get(slot)?.card(id)
    }

    pub fn find_card_mut(&mut self, id: &str) -> Option<&mut Card> {
        let slot = *self.card_index.get(id)?;
        self.riders.get_mut(slot)?.card_mut(id)
    }

    /// Card IDs in issue order, rider by rider.
    pub fn card_ids(&self) -> Vec<Uid> {
        self.riders
            .iter()
            .flat_map(|r| r.cards().iter().map(|c| c.id().clone()))
            .collect()
    }
}
