//! The fare engine: owns the network, the riders and their cards, the
//! metrics hub and the tap audit log, and feeds taps through the processor.
//!
//! RULES:
//!   - Taps are processed strictly in the order they are given.
//!   - Each tap is fully committed (card state, metrics, audit row) before
//!     the next one starts.
//!   - A bad tap or a malformed record never stops a run.
//!   - Every tap that reaches the engine gets exactly one audit row.

use crate::{
    card::Card,
    config::FareConfig,
    error::{TapError, TransitError, TransitResult},
    ids::{IdAllocator, IdKind, Uid},
    loader::{self, TapRecord},
    metrics::{DailyTotals, MetricKind, MetricsHub, MetricsObserver, SubscriptionId},
    outcome::{TapOutcome, TapRejection},
    processor::{Tap, TapProcessor},
    rider::{Rider, RiderDirectory},
    store::{TapLog, TapLogEntry},
    topology::Network,
    trip::Direction,
    types::{Cents, DateKey, RunId, Timestamp},
};
use serde::Serialize;

/// Counts for one batch of taps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub records:         u64,
    pub accepted:        u64,
    pub trips_started:   u64,
    pub transfers:       u64,
    pub segments:        u64,
    pub duplicates:      u64,
    pub rejected:        u64,
    pub unknown:         u64,
    pub malformed:       u64,
    pub fare_collected:  Cents,
    pub stops_travelled: u64,
}

/// Mark `id` as taken. Two entities sharing an ID keep it; the allocator
/// only reserves the next free one, so the clash is logged.
fn reserve(ids: &mut IdAllocator, id: &Uid) {
    match ids.claim(id.as_str()) {
        Some(claimed) if claimed == *id => {}
        Some(claimed) => log::warn!("ID {id} is used more than once (reserved {claimed} as well)"),
        None => log::warn!("ID {id} is not numeric and cannot be reserved"),
    }
}

impl RunSummary {
    fn tally(&mut self, result: &Result<TapOutcome, TapError>) {
        match result {
            Ok(outcome) => {
                self.accepted += 1;
                match outcome {
                    TapOutcome::TripStarted { .. } => self.trips_started += 1,
                    TapOutcome::TransferContinued { .. } => self.transfers += 1,
                    TapOutcome::SegmentCompleted { stops, .. } => {
                        self.segments += 1;
                        self.stops_travelled += u64::from(*stops);
                    }
                    TapOutcome::DuplicateReversed { .. }
                    | TapOutcome::DuplicateIgnored { .. } => self.duplicates += 1,
                }
                self.fare_collected += outcome.fare();
            }
            Err(e) if e.is_rejection() => self.rejected += 1,
            Err(_) => self.unknown += 1,
        }
    }
}

pub struct FareEngine {
    pub run_id:     RunId,
    network:        Network,
    riders:         RiderDirectory,
    ids:            IdAllocator,
    processor:      TapProcessor,
    metrics:        MetricsHub,
    daily:          SubscriptionId,
    log:            TapLog,
    seq:            u64,
    audit_failures: u64,
}

impl FareEngine {
    pub fn new(
        run_id: RunId,
        config: FareConfig,
        network: Network,
        riders: RiderDirectory,
    ) -> TransitResult<Self> {
        let mut ids = IdAllocator::new();
        for rider in riders.riders() {
            reserve(&mut ids, rider.id());
            for card in rider.cards() {
                reserve(&mut ids, card.id());
            }
        }
        Self::with_ids(run_id, config, network, riders, ids)
    }

    /// Like `new`, but keeps allocating from `ids`, which must already hold
    /// every rider and card ID in `riders`.
    pub fn with_ids(
        run_id: RunId,
        config: FareConfig,
        network: Network,
        riders: RiderDirectory,
        ids: IdAllocator,
    ) -> TransitResult<Self> {
        config.validate()?;

        let log = TapLog::in_memory()?;
        log.migrate()?;
        log.insert_run(&run_id, env!("CARGO_PKG_VERSION"))?;

        let mut metrics = MetricsHub::new();
        let daily = metrics.attach(
            &[MetricKind::Fare, MetricKind::Stops],
            Box::new(DailyTotals::new()),
        );

        log::info!(
            "engine {run_id}: {} lines, {} riders, {} cards",
            network.lines().len(),
            riders.riders().len(),
            riders.card_count()
        );
        Ok(Self {
            run_id,
            network,
            riders,
            ids,
            processor: TapProcessor::new(config),
            metrics,
            daily,
            log,
            seq: 0,
            audit_failures: 0,
        })
    }

    /// Load config, lines, riders and cards from `data_dir` and wire an
    /// engine over them.
    pub fn build_from_dir(run_id: RunId, data_dir: &str) -> TransitResult<Self> {
        let config = FareConfig::load(data_dir)?;
        let mut ids = IdAllocator::new();
        let (network, riders) = loader::load_data_dir(data_dir, &config, &mut ids)?;
        Self::with_ids(run_id, config, network, riders, ids)
    }

    // ── Taps ───────────────────────────────────────────────────

    /// Apply a single tap. Unknown references and refused taps come back
    /// as errors; the card is untouched in that case.
    pub fn process_tap(
        &mut self,
        card_id: &str,
        stop_name: &str,
        line_name: &str,
        at: Timestamp,
        hint: Option<Direction>,
    ) -> Result<TapOutcome, TapError> {
        let result = self.resolve_and_process(card_id, stop_name, line_name, at, hint);
        if let Err(e) = &result {
            log::warn!("tap {card_id} at {stop_name} ({line_name}) {at}: {e}");
        }
        self.audit(card_id, stop_name, line_name, at, &result);
        result
    }

    pub fn apply_record(&mut self, record: &TapRecord) -> Result<TapOutcome, TapError> {
        self.process_tap(&record.card_id, &record.stop, &record.line, record.at, record.direction)
    }

    /// Process a raw tap log, one record per line. Malformed lines are
    /// skipped and counted.
    pub fn run_log(&mut self, text: &str) -> RunSummary {
        let mut summary = RunSummary::default();
        for (i, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            summary.records += 1;
            match loader::parse_tap_line(i + 1, line) {
                Ok(record) => {
                    let result = self.apply_record(&record);
                    summary.tally(&result);
                }
                Err(e) => {
                    log::warn!("skipping record: {e}");
                    summary.malformed += 1;
                }
            }
        }
        self.log_summary(&summary);
        summary
    }

    pub fn run_records(&mut self, records: &[TapRecord]) -> RunSummary {
        let mut summary = RunSummary::default();
        for record in records {
            summary.records += 1;
            let result = self.apply_record(record);
            summary.tally(&result);
        }
        self.log_summary(&summary);
        summary
    }

    fn resolve_and_process(
        &mut self,
        card_id: &str,
        stop_name: &str,
        line_name: &str,
        at: Timestamp,
        hint: Option<Direction>,
    ) -> Result<TapOutcome, TapError> {
        let card = self
            .riders
            .find_card_mut(card_id)
            .ok_or_else(|| TapError::UnknownCard { card: card_id.to_string() })?;
        let stop = self.network.find_stop(stop_name, line_name)?;
        self.processor
            .process(card, Tap::with_hint(stop, at, hint), &self.network, &mut self.metrics)
    }

    fn audit(
        &mut self,
        card_id: &str,
        stop_name: &str,
        line_name: &str,
        at: Timestamp,
        result: &Result<TapOutcome, TapError>,
    ) {
        let seq = self.seq;
        self.seq += 1;
        if let Err(e) = self.append_audit(seq, card_id, stop_name, line_name, at, result) {
            self.audit_failures += 1;
            log::error!("tap log: could not record tap #{seq} for card {card_id}: {e}");
        }
    }

    fn append_audit(
        &self,
        seq: u64,
        card_id: &str,
        stop_name: &str,
        line_name: &str,
        at: Timestamp,
        result: &Result<TapOutcome, TapError>,
    ) -> TransitResult<()> {
        let (outcome_type, payload) = match result {
            Ok(outcome) => (outcome.kind(), serde_json::to_string(outcome)?),
            Err(e) => {
                let rejection = TapRejection::new(card_id, stop_name, line_name, at, e);
                (e.kind(), serde_json::to_string(&rejection)?)
            }
        };
        self.log.append(&TapLogEntry {
            id:           None,
            run_id:       self.run_id.clone(),
            seq,
            card_id:      card_id.to_string(),
            tapped_at:    at.format("%Y-%m-%dT%H:%M:%S").to_string(),
            date_key:     at.date().to_string(),
            outcome_type: outcome_type.to_string(),
            payload,
        })
    }

    fn log_summary(&self, s: &RunSummary) {
        log::info!(
            "engine {}: {} records, {} accepted, {} rejected, {} unknown, {} malformed, {} cents collected",
            self.run_id,
            s.records,
            s.accepted,
            s.rejected,
            s.unknown,
            s.malformed,
            s.fare_collected
        );
    }

    // ── Riders and cards ───────────────────────────────────────

    /// Register a new rider under a freshly allocated ID.
    pub fn register_rider(&mut self, name: &str, email: &str) -> TransitResult<Uid> {
        let id = self.ids.generate(IdKind::Rider);
        self.riders.add_rider(Rider::new(id.clone(), name, email))?;
        log::info!("rider {id} registered");
        Ok(id)
    }

    /// Issue a new card to `rider_id`. Without a balance the configured
    /// default is loaded.
    pub fn issue_card(&mut self, rider_id: &str, balance: Option<Cents>) -> TransitResult<Uid> {
        let bearer = self
            .riders
            .find_rider(rider_id)
            .map(|r| r.id().clone())
            .ok_or_else(|| TransitError::Config(format!("unknown rider {rider_id}")))?;
        let id = self.ids.generate(IdKind::Card);
        let balance = balance.unwrap_or(self.config().default_balance);
        self.riders.issue_card(Card::new(id.clone(), bearer, balance))?;
        log::info!("card {id} issued to rider {rider_id} with {balance} cents");
        Ok(id)
    }

    pub fn reload_card(&mut self, rider_id: &str, card_id: &str, amount: Cents) -> TransitResult<Cents> {
        let allowed = self.processor.config().reload_amounts.clone();
        let rider = self.rider_mut(rider_id)?;
        Ok(rider.reload_card(card_id, amount, &allowed)?)
    }

    pub fn suspend_card(&mut self, rider_id: &str, card_id: &str) -> TransitResult<()> {
        Ok(self.rider_mut(rider_id)?.suspend_card(card_id)?)
    }

    pub fn reactivate_card(&mut self, rider_id: &str, card_id: &str) -> TransitResult<()> {
        Ok(self.rider_mut(rider_id)?.reactivate_card(card_id)?)
    }

    fn rider_mut(&mut self, rider_id: &str) -> TransitResult<&mut Rider> {
        self.riders
            .find_rider_mut(rider_id)
            .ok_or_else(|| TransitError::Config(format!("unknown rider {rider_id}")))
    }

    // ── Metrics ────────────────────────────────────────────────

    /// Subscribe an extra observer alongside the built-in daily totals.
    pub fn attach_observer(
        &mut self,
        kinds: &[MetricKind],
        observer: Box<dyn MetricsObserver>,
    ) -> SubscriptionId {
        self.metrics.attach(kinds, observer)
    }

    /// Detach an observer added with `attach_observer`. The built-in daily
    /// totals cannot be detached.
    pub fn detach_observer(&mut self, id: SubscriptionId) -> Option<Box<dyn MetricsObserver>> {
        if id == self.daily {
            return None;
        }
        self.metrics.detach(id)
    }

    pub fn observer<T: 'static>(&self, id: SubscriptionId) -> Option<&T> {
        self.metrics.observer::<T>(id)
    }

    pub fn daily_totals(&self) -> Option<&DailyTotals> {
        self.metrics.observer::<DailyTotals>(self.daily)
    }

    pub fn daily_fare(&self, date: DateKey) -> Cents {
        self.daily_totals().map_or(0, |t| t.fare_on(date))
    }

    pub fn daily_stops(&self, date: DateKey) -> u64 {
        self.daily_totals().map_or(0, |t| t.stops_on(date))
    }

    // ── Accessors ──────────────────────────────────────────────

    pub fn network(&self) -> &Network { &self.network }
    pub fn network_mut(&mut self) -> &mut Network { &mut self.network }
    pub fn riders(&self) -> &RiderDirectory { &self.riders }
    pub fn riders_mut(&mut self) -> &mut RiderDirectory { &mut self.riders }
    pub fn config(&self) -> &FareConfig { self.processor.config() }
    pub fn tap_log(&self) -> &TapLog { &self.log }
    pub fn taps_processed(&self) -> u64 { self.seq }
    pub fn audit_failures(&self) -> u64 { self.audit_failures }

    pub fn card(&self, card_id: &str) -> Option<&Card> {
        self.riders.find_card(card_id)
    }
}
