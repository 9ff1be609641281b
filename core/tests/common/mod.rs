#![allow(dead_code)]

use chrono::NaiveDate;
use transit_core::{
    card::Card,
    config::FareConfig,
    engine::FareEngine,
    ids::Uid,
    rider::{Rider, RiderDirectory},
    topology::{LineKind, Network},
    types::{Cents, Timestamp},
};

pub const RIDER: &str = "200000000";
pub const CARD:  &str = "100000000";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Line A and line B meet at Main St; L1 is a short line of its own.
pub fn network() -> Network {
    let mut net = Network::new();
    net.add_line(
        LineKind::Subway,
        "A",
        ["A0", "A1", "A2", "A3", "Main St", "A5", "A6", "A7", "A8", "A9"],
    )
    .unwrap();
    net.add_line(LineKind::Bus, "B", ["Main St", "B1", "B2", "B3", "B4", "B5", "B6"])
        .unwrap();
    net.add_line(LineKind::Subway, "L1", ["S1", "S2", "S3", "S4"]).unwrap();
    net
}

/// One rider holding one card with `balance`, at $1 per stop and a $6 cap.
pub fn engine(balance: Cents) -> FareEngine {
    engine_with(FareConfig::default_test(), balance)
}

pub fn engine_with(config: FareConfig, balance: Cents) -> FareEngine {
    init_logging();
    let mut riders = RiderDirectory::new();
    riders
        .add_rider(Rider::new(Uid::new(RIDER), "Ada Lovelace", "ada@example.com"))
        .unwrap();
    riders
        .issue_card(Card::new(Uid::new(CARD), Uid::new(RIDER), balance))
        .unwrap();
    FareEngine::new("test-run".into(), config, network(), riders).unwrap()
}

/// 2020-11-<day> at h:m.
pub fn at(day: u32, h: u32, m: u32) -> Timestamp {
    date(day).and_hms_opt(h, m, 0).unwrap()
}

pub fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 11, day).unwrap()
}

pub fn data_dir() -> String {
    format!("{}/../data", env!("CARGO_MANIFEST_DIR"))
}
