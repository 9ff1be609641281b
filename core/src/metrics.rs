//! Metrics fan-out and the per-date totals admins report from.
//!
//! RULE: Totals change only through `MetricsHub::publish`, called by the
//! tap processor in the same step as the tap that produced the figure.
//! Per-date totals are sums, so subscriber order never matters.

use crate::types::{Cents, DateKey};
use serde::{Deserialize, Serialize};
use std::{any::Any, collections::BTreeMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Fare,
    Stops,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MetricEvent {
    FareCollected {
        date:   DateKey,
        amount: Cents,
    },
    StopsTravelled {
        date:  DateKey,
        stops: u64,
    },
}

impl MetricEvent {
    pub fn kind(&self) -> MetricKind {
        match self {
            Self::FareCollected { .. }  => MetricKind::Fare,
            Self::StopsTravelled { .. } => MetricKind::Stops,
        }
    }
}

/// Anything that wants to hear about collected fares or travelled stops.
pub trait MetricsObserver: Send {
    fn name(&self) -> &'static str;

    fn update(&mut self, event: &MetricEvent);

    /// For downcasting in reporting and tests.
    fn as_any(&self) -> &dyn Any;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id:       SubscriptionId,
    kinds:    Vec<MetricKind>,
    observer: Box<dyn MetricsObserver>,
}

#[derive(Default)]
pub struct MetricsHub {
    subscriptions: Vec<Subscription>,
    next_id:       u64,
}

impl MetricsHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `observer` to the given kinds of metric.
    pub fn attach(&mut self, kinds: &[MetricKind], observer: Box<dyn MetricsObserver>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        log::debug!("metrics: attached '{}' for {kinds:?}", observer.name());
        self.subscriptions.push(Subscription {
            id,
            kinds: kinds.to_vec(),
            observer,
        });
        id
    }

    /// Unsubscribe and hand the observer back to the caller.
    pub fn detach(&mut self, id: SubscriptionId) -> Option<Box<dyn MetricsObserver>> {
        let pos = self.subscriptions.iter().position(|s| s.id == id)?;
        let sub = self.subscriptions.remove(pos);
        log::debug!("metrics: detached '{}'", sub.observer.name());
        Some(sub.observer)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Deliver `event` synchronously to every subscriber of its kind.
    pub fn publish(&mut self, event: MetricEvent) {
        let kind = event.kind();
        for sub in self.subscriptions.iter_mut().filter(|s| s.kinds.contains(&kind)) {
            sub.observer.update(&event);
        }
    }

    /// Borrow a subscribed observer as its concrete type.
    pub fn observer<T: 'static>(&self, id: SubscriptionId) -> Option<&T> {
        self.subscriptions
            .iter()
            .find(|s| s.id == id)
            .and_then(|s| s.observer.as_any().downcast_ref::<T>())
    }
}

/// Fare collected and stops travelled, per calendar date.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DailyTotals {
    fare:  BTreeMap<DateKey, Cents>,
    stops: BTreeMap<DateKey, u64>,
}

impl DailyTotals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fare_on(&self, date: DateKey) -> Cents {
        self.fare.get(&date).copied().unwrap_or(0)
    }

    pub fn stops_on(&self, date: DateKey) -> u64 {
        self.stops.get(&date).copied().unwrap_or(0)
    }

    pub fn total_fare(&self) -> Cents {
        self.fare.values().sum()
    }

    pub fn total_stops(&self) -> u64 {
        self.stops.values().sum()
    }

    /// Every date with any recorded activity, ascending.
    pub fn dates(&self) -> Vec<DateKey> {
        let mut dates: Vec<DateKey> = self.fare.keys().chain(self.stops.keys()).copied().collect();
        dates.sort_unstable();
        dates.dedup();
        dates
    }
}

impl MetricsObserver for DailyTotals {
    fn name(&self) -> &'static str {
        "daily_totals"
    }

    fn update(&mut self, event: &MetricEvent) {
        match *event {
            MetricEvent::FareCollected { date, amount } => {
                *self.fare.entry(date).or_insert(0) += amount;
            }
            MetricEvent::StopsTravelled { date, stops } => {
                *self.stops.entry(date).or_insert(0) += stops;
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
