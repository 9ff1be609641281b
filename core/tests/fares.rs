mod common;

use common::{at, date, engine, CARD, RIDER};
use transit_core::{
    error::TapError,
    outcome::TapOutcome,
    trip::Direction,
};

#[test]
fn enter_and_exit_on_one_line_charges_per_stop() {
    let mut engine = engine(1900);

    let started = engine.process_tap(CARD, "S1", "L1", at(11, 8, 0), None).unwrap();
    assert!(matches!(started, TapOutcome::TripStarted { trip: 0, .. }));

    let done = engine.process_tap(CARD, "S3", "L1", at(11, 8, 10), None).unwrap();
    match done {
        TapOutcome::SegmentCompleted { stops, fare, trip_fare, charged, .. } => {
            assert_eq!(stops, 2);
            assert_eq!(fare, 200);
            assert_eq!(trip_fare, 200);
            assert!(charged);
        }
        other => panic!("expected a completed segment, got {other:?}"),
    }

    assert_eq!(engine.card(CARD).unwrap().balance(), 1700);
    assert_eq!(engine.daily_fare(date(11)), 200);
    assert_eq!(engine.daily_stops(date(11)), 2);
}

#[test]
fn trip_fare_never_exceeds_cap() {
    let mut engine = engine(1900);

    engine.process_tap(CARD, "A0", "A", at(11, 8, 0), None).unwrap();
    let first = engine.process_tap(CARD, "Main St", "A", at(11, 8, 10), None).unwrap();
    assert_eq!(first.fare(), 400);

    let transfer = engine.process_tap(CARD, "Main St", "B", at(11, 8, 15), None).unwrap();
    assert!(matches!(transfer, TapOutcome::TransferContinued { trip: 0, .. }));

    let second = engine.process_tap(CARD, "B5", "B", at(11, 8, 40), None).unwrap();
    match second {
        TapOutcome::SegmentCompleted { stops, fare, trip_fare, .. } => {
            assert_eq!(stops, 5);
            assert_eq!(fare, 200);
            assert_eq!(trip_fare, 600);
        }
        other => panic!("expected a completed segment, got {other:?}"),
    }

    let card = engine.card(CARD).unwrap();
    assert_eq!(card.trips().len(), 1);
    assert!(card.trips()[0].is_capped());
    assert_eq!(card.balance(), 1300);
    assert_eq!(engine.daily_fare(date(11)), 600);
    // Stops are counted in full even when the fare is capped.
    assert_eq!(engine.daily_stops(date(11)), 9);
}

#[test]
fn riding_against_route_order_costs_nothing() {
    let mut engine = engine(1900);
    engine.process_tap(CARD, "A6", "A", at(11, 8, 0), None).unwrap();
    let out = engine.process_tap(CARD, "A2", "A", at(11, 8, 10), None).unwrap();
    assert!(matches!(out, TapOutcome::SegmentCompleted { stops: 0, fare: 0, .. }));
    assert_eq!(engine.card(CARD).unwrap().balance(), 1900);
    assert_eq!(engine.daily_stops(date(11)), 0);
}

#[test]
fn explicit_exit_at_entry_stop_costs_nothing() {
    let mut engine = engine(1900);
    engine.process_tap(CARD, "A2", "A", at(11, 8, 0), Some(Direction::Enter)).unwrap();
    let out = engine
        .process_tap(CARD, "A2", "A", at(11, 8, 5), Some(Direction::Exit))
        .unwrap();
    assert!(matches!(out, TapOutcome::SegmentCompleted { stops: 0, fare: 0, .. }));
    assert_eq!(engine.card(CARD).unwrap().balance(), 1900);

    // A second exit at the same reader is ignored.
    let again = engine
        .process_tap(CARD, "A2", "A", at(11, 8, 6), Some(Direction::Exit))
        .unwrap();
    assert!(matches!(again, TapOutcome::DuplicateIgnored { .. }));
    assert_eq!(engine.card(CARD).unwrap().trips().len(), 1);
}

#[test]
fn zero_balance_cannot_start_a_trip() {
    let mut engine = engine(0);
    let err = engine.process_tap(CARD, "S1", "L1", at(11, 8, 0), None).unwrap_err();
    assert_eq!(err, TapError::InsufficientBalance { card: CARD.into(), balance: 0 });
    assert!(engine.card(CARD).unwrap().trips().is_empty());
}

#[test]
fn last_positive_cents_allow_one_more_ride() {
    let mut engine = engine(100);
    engine.process_tap(CARD, "S1", "L1", at(11, 8, 0), None).unwrap();
    engine.process_tap(CARD, "S4", "L1", at(11, 8, 20), None).unwrap();
    assert_eq!(engine.card(CARD).unwrap().balance(), -200);

    let err = engine.process_tap(CARD, "S4", "L1", at(11, 17, 0), None).unwrap_err();
    assert!(matches!(err, TapError::InsufficientBalance { balance: -200, .. }));
    assert_eq!(engine.card(CARD).unwrap().trips().len(), 1);
}

#[test]
fn suspended_card_is_refused_until_reactivated() {
    let mut engine = engine(1900);
    engine.suspend_card(RIDER, CARD).unwrap();

    let err = engine.process_tap(CARD, "S1", "L1", at(11, 8, 0), None).unwrap_err();
    assert!(matches!(err, TapError::CardInactive { .. }));
    assert!(err.is_rejection());

    engine.reactivate_card(RIDER, CARD).unwrap();
    assert!(engine.process_tap(CARD, "S1", "L1", at(11, 8, 5), None).is_ok());
}

#[test]
fn exit_on_a_card_suspended_mid_ride_is_not_charged() {
    let mut engine = engine(1900);
    engine.process_tap(CARD, "S1", "L1", at(11, 8, 0), None).unwrap();
    engine.suspend_card(RIDER, CARD).unwrap();

    let out = engine.process_tap(CARD, "S3", "L1", at(11, 8, 10), None).unwrap();
    match out {
        TapOutcome::SegmentCompleted { stops, fare, charged, .. } => {
            assert_eq!(stops, 2);
            assert_eq!(fare, 0);
            assert!(!charged);
        }
        other => panic!("expected a completed segment, got {other:?}"),
    }
    assert_eq!(engine.card(CARD).unwrap().balance(), 1900);
    assert_eq!(engine.daily_fare(date(11)), 0);
    assert_eq!(engine.daily_stops(date(11)), 2);
}

#[test]
fn reload_tops_up_only_with_listed_amounts() {
    let mut engine = engine(0);
    assert_eq!(engine.reload_card(RIDER, CARD, 2000).unwrap(), 2000);
    assert!(engine.reload_card(RIDER, CARD, 1234).is_err());
    assert!(engine.reload_card("200000042", CARD, 1000).is_err());
    assert!(engine.process_tap(CARD, "S1", "L1", at(11, 8, 0), None).is_ok());
}

#[test]
fn daily_totals_are_the_sum_of_realised_fares() {
    let mut engine = engine(5000);
    let taps = [
        ("S1", "L1", at(11, 7, 0)),
        ("S4", "L1", at(11, 7, 20)),
        ("A0", "A", at(11, 12, 0)),
        ("A9", "A", at(11, 12, 30)),
        ("S2", "L1", at(12, 9, 0)),
        ("S3", "L1", at(12, 9, 5)),
    ];
    let mut realised = std::collections::BTreeMap::new();
    for (stop, line, when) in taps {
        let out = engine.process_tap(CARD, stop, line, when, None).unwrap();
        *realised.entry(when.date()).or_insert(0) += out.fare();
    }
    assert_eq!(realised[&date(11)], 300 + 600);
    assert_eq!(realised[&date(12)], 100);
    for (day, fare) in realised {
        assert_eq!(engine.daily_fare(day), fare);
    }
    assert_eq!(engine.daily_fare(date(13)), 0);
}

#[test]
fn exit_after_balance_ran_out_mid_trip_is_not_charged() {
    let mut engine = engine(100);
    engine.process_tap(CARD, "A0", "A", at(11, 8, 0), None).unwrap();
    let first = engine.process_tap(CARD, "Main St", "A", at(11, 8, 10), None).unwrap();
    assert_eq!(first.fare(), 400);
    assert_eq!(engine.card(CARD).unwrap().balance(), -300);

    // Changing lines is not gated on the balance.
    let transfer = engine.process_tap(CARD, "Main St", "B", at(11, 8, 12), None).unwrap();
    assert!(matches!(transfer, TapOutcome::TransferContinued { trip: 0, .. }));

    let out = engine.process_tap(CARD, "B1", "B", at(11, 8, 20), None).unwrap();
    match out {
        TapOutcome::SegmentCompleted { stops, fare, trip_fare, charged, .. } => {
            assert_eq!(stops, 1);
            assert_eq!(fare, 0);
            assert_eq!(trip_fare, 400);
            assert!(!charged);
        }
        other => panic!("expected a completed segment, got {other:?}"),
    }
    assert_eq!(out.fare(), 0);

    let card = engine.card(CARD).unwrap();
    assert_eq!(card.balance(), -300);
    assert_eq!(card.trips()[0].current_fare(), 400);
    assert_eq!(engine.daily_fare(date(11)), 400);
    assert_eq!(engine.daily_stops(date(11)), 5);
}
