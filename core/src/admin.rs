//! Read-only reporting over an engine's daily totals.

use crate::{
    engine::FareEngine,
    types::{Cents, DateKey},
};
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyReport {
    pub date:  DateKey,
    pub fare:  Cents,
    pub stops: u64,
}

pub struct Admin<'a> {
    engine: &'a FareEngine,
}

impl<'a> Admin<'a> {
    pub fn new(engine: &'a FareEngine) -> Self {
        Self { engine }
    }

    /// Fare collected on a calendar date. Dates that do not exist read as
    /// zero.
    pub fn fare_on_date(&self, day: u32, month: u32, year: i32) -> Cents {
        NaiveDate::from_ymd_opt(year, month, day).map_or(0, |d| self.engine.daily_fare(d))
    }

    pub fn stops_on_date(&self, day: u32, month: u32, year: i32) -> u64 {
        NaiveDate::from_ymd_opt(year, month, day).map_or(0, |d| self.engine.daily_stops(d))
    }

    /// One row per date that saw any fare or travel, oldest first.
    pub fn daily_report(&self) -> Vec<DailyReport> {
        let Some(totals) = self.engine.daily_totals() else {
            return Vec::new();
        };
        totals
            .dates()
            .into_iter()
            .map(|date| DailyReport {
                date,
                fare:  totals.fare_on(date),
                stops: totals.stops_on(date),
            })
            .collect()
    }

    pub fn total_fare(&self) -> Cents {
        self.engine.daily_totals().map_or(0, |t| t.total_fare())
    }

    pub fn total_stops(&self) -> u64 {
        self.engine.daily_totals().map_or(0, |t| t.total_stops())
    }
}
