mod common;

use common::{data_dir, date, engine, init_logging, CARD};
use transit_core::{
    admin::Admin,
    engine::{FareEngine, RunSummary},
    error::TapError,
    metrics::{MetricEvent, MetricKind, MetricsObserver},
    outcome::TapRejection,
};

const LOG: &str = "\
100000000;enter;S1;L1;2020-11-11T08:00:00

100000000;exit;S3;L1;2020-11-11T08:10:00
100000000;enter;S1;L1;not-a-time
100000077;enter;S1;L1;2020-11-11T09:00:00
100000000;enter;S9;L1;2020-11-11T09:30:00
100000000;enter;S1;L7;2020-11-11T09:40:00
100000000;enter;S2;L1;2020-11-11T10:00:00
";

#[test]
fn bad_records_are_counted_and_skipped() {
    let mut engine = engine(1900);
    let summary = engine.run_log(LOG);

    assert_eq!(
        summary,
        RunSummary {
            records:         7,
            accepted:        3,
            trips_started:   2,
            transfers:       0,
            segments:        1,
            duplicates:      0,
            rejected:        0,
            unknown:         3,
            malformed:       1,
            fare_collected:  200,
            stops_travelled: 2,
        }
    );
    assert_eq!(engine.daily_fare(date(11)), 200);
    assert_eq!(engine.card(CARD).unwrap().trips().len(), 2);
}

#[test]
fn unknown_references_are_reported_by_kind() {
    let mut engine = engine(1900);
    let when = date(11).and_hms_opt(8, 0, 0).unwrap();

    let err = engine.process_tap("100000077", "S1", "L1", when, None).unwrap_err();
    assert_eq!(err, TapError::UnknownCard { card: "100000077".into() });
    let err = engine.process_tap(CARD, "S1", "L7", when, None).unwrap_err();
    assert_eq!(err, TapError::UnknownLine { line: "L7".into() });
    let err = engine.process_tap(CARD, "A1", "L1", when, None).unwrap_err();
    assert_eq!(err, TapError::UnknownStop { stop: "A1".into(), line: "L1".into() });
    assert!(!err.is_rejection());

    assert!(engine.card(CARD).unwrap().trips().is_empty());
}

#[test]
fn every_tap_gets_one_audit_row() {
    let mut engine = engine(1900);
    engine.run_log(LOG);

    let log = engine.tap_log();
    let run = engine.run_id.clone();
    // The malformed line never reaches the engine.
    assert_eq!(log.count(&run).unwrap(), 6);
    assert_eq!(engine.taps_processed(), 6);
    assert_eq!(engine.audit_failures(), 0);
    assert_eq!(log.count_by_type(&run, "trip_started").unwrap(), 2);
    assert_eq!(log.count_by_type(&run, "segment_completed").unwrap(), 1);
    assert_eq!(log.count_by_type(&run, "unknown_card").unwrap(), 1);
    assert_eq!(log.count_by_type(&run, "unknown_stop").unwrap(), 1);
    assert_eq!(log.count_by_type(&run, "unknown_line").unwrap(), 1);

    let unknown = log.entries_for_card(&run, "100000077").unwrap();
    assert_eq!(unknown.len(), 1);
    let rejection: TapRejection = serde_json::from_str(&unknown[0].payload).unwrap();
    assert_eq!(rejection.reason, "Card '100000077' not found");
    assert_eq!(log.entries_for_date(&run, "2020-11-11").unwrap().len(), 6);
}

#[derive(Default)]
struct FareCounter {
    events: usize,
    total:  i64,
}

impl MetricsObserver for FareCounter {
    fn name(&self) -> &'static str {
        "fare_counter"
    }

    fn update(&mut self, event: &MetricEvent) {
        if let MetricEvent::FareCollected { amount, .. } = event {
            self.events += 1;
            self.total += amount;
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[test]
fn extra_observers_see_the_same_fares() {
    let mut engine = engine(1900);
    let id = engine.attach_observer(&[MetricKind::Fare], Box::new(FareCounter::default()));
    engine.run_log(LOG);

    let counter = engine.observer::<FareCounter>(id).unwrap();
    assert_eq!(counter.events, 1);
    assert_eq!(counter.total, engine.daily_fare(date(11)));

    assert!(engine.detach_observer(id).is_some());
    assert!(engine.observer::<FareCounter>(id).is_none());
}

#[test]
fn sample_data_directory_runs_end_to_end() {
    init_logging();
    let dir = data_dir();
    let mut engine = FareEngine::build_from_dir("sample-run".into(), &dir).unwrap();
    assert_eq!(engine.config().rate_per_stop, 50);
    assert_eq!(engine.riders().riders().len(), 3);
    assert_eq!(engine.riders().card_count(), 4);
    assert_eq!(engine.card("100000001").unwrap().balance(), 550);

    let events = transit_core::loader::read_events(&dir).unwrap();
    let summary = engine.run_log(&events);

    assert_eq!(summary.records, 14);
    assert_eq!(summary.accepted, 10);
    assert_eq!(summary.trips_started, 4);
    assert_eq!(summary.transfers, 1);
    assert_eq!(summary.segments, 4);
    assert_eq!(summary.duplicates, 1);
    assert_eq!(summary.rejected, 1);
    assert_eq!(summary.unknown, 2);
    assert_eq!(summary.malformed, 1);
    assert_eq!(summary.fare_collected, 550);

    let admin = Admin::new(&engine);
    assert_eq!(admin.fare_on_date(11, 11, 2020), 350);
    assert_eq!(admin.stops_on_date(11, 11, 2020), 7);
    assert_eq!(admin.fare_on_date(12, 11, 2020), 200);
    assert_eq!(admin.stops_on_date(12, 11, 2020), 4);
    assert_eq!(admin.fare_on_date(31, 2, 2020), 0);
    assert_eq!(admin.total_fare(), 550);
    assert_eq!(admin.daily_report().len(), 2);
}
