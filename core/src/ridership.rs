//! Synthetic ridership: a reproducible tap log for a network and a set of
//! cards, used by the runner and by load-style tests.
//!
//! RULES:
//!   - Same seed, network and cards always give the same log.
//!   - Each card draws from its own RNG stream, indexed by its position.
//!   - The log is ordered by time; taps at the same instant keep card order.

use crate::{
    ids::Uid,
    loader::TapRecord,
    rng::TapRng,
    topology::{Line, Network},
    trip::Direction,
    types::Timestamp,
};
use chrono::{Duration, NaiveDate};

pub const DEFAULT_TRANSFER_RATE:   f64 = 0.25;
pub const DEFAULT_DOUBLE_TAP_RATE: f64 = 0.05;
pub const MAX_TRIPS_PER_DAY:       u64 = 2;

/// Minutes between stops on any line.
const MINUTES_PER_STOP: i64 = 2;
/// Walk between platforms when changing lines.
const TRANSFER_WALK_MINUTES: i64 = 3;

#[derive(Debug, Clone)]
pub struct RidershipGenerator {
    seed:            u64,
    transfer_rate:   f64,
    double_tap_rate: f64,
}

impl RidershipGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            transfer_rate:   DEFAULT_TRANSFER_RATE,
            double_tap_rate: DEFAULT_DOUBLE_TAP_RATE,
        }
    }

    pub fn with_rates(mut self, transfer_rate: f64, double_tap_rate: f64) -> Self {
        self.transfer_rate = transfer_rate.clamp(0.0, 1.0);
        self.double_tap_rate = double_tap_rate.clamp(0.0, 1.0);
        self
    }

    pub fn generate(
        &self,
        network: &Network,
        cards: &[Uid],
        start_date: NaiveDate,
        days: u32,
    ) -> Vec<TapRecord> {
        let rideable: Vec<&Line> = network.lines().iter().filter(|l| l.stops().len() >= 2).collect();
        if rideable.is_empty() {
            log::warn!("ridership: no line has two stops, nothing to generate");
            return Vec::new();
        }

        let mut records = Vec::new();
        for (stream, card) in cards.iter().enumerate() {
            let mut rng = TapRng::new(self.seed, stream as u64);
            for day in 0..days {
                let date = start_date + Duration::days(i64::from(day));
                let Some(mut cursor) = date.and_hms_opt(6, 0, 0) else { continue };
                for _ in 0..rng.next_u64_below(MAX_TRIPS_PER_DAY + 1) {
                    cursor += Duration::minutes(rng.next_u64_below(240) as i64);
                    cursor = self.ride(&mut rng, network, &rideable, card, cursor, &mut records);
                    cursor += Duration::minutes(30);
                }
            }
        }

        records.sort_by_key(|r| r.at);
        log::info!(
            "ridership: {} taps for {} cards over {days} days (seed {})",
            records.len(),
            cards.len(),
            self.seed
        );
        records
    }

    /// Emit one trip's taps starting at `at`. Returns the time of the last
    /// tap.
    fn ride(
        &self,
        rng: &mut TapRng,
        network: &Network,
        rideable: &[&Line],
        card: &Uid,
        mut at: Timestamp,
        out: &mut Vec<TapRecord>,
    ) -> Timestamp {
        let line = rideable[rng.pick(rideable.len())];
        let entry = rng.pick(line.stops().len());
        out.push(tap(card, Direction::Enter, line, entry, at));

        if rng.chance(self.double_tap_rate) {
            // The repeat cancels the entry, so the rider taps once more.
            at += Duration::minutes(1);
            out.push(tap(card, Direction::Enter, line, entry, at));
            at += Duration::minutes(1);
            out.push(tap(card, Direction::Enter, line, entry, at));
        }

        let transfer = if rng.chance(self.transfer_rate) {
            transfer_options(network, line, entry).and_then(|options| {
                let (here, other, there) = options[rng.pick(options.len())];
                other_exit(rng, other, there).map(|exit| (here, other, there, exit))
            })
        } else {
            None
        };

        match transfer {
            Some((here, other, there, exit)) => {
                at += ride_time(entry, here);
                out.push(tap(card, Direction::Exit, line, here, at));
                at += Duration::minutes(TRANSFER_WALK_MINUTES);
                out.push(tap(card, Direction::Enter, other, there, at));
                at += ride_time(there, exit);
                out.push(tap(card, Direction::Exit, other, exit, at));
            }
            None => {
                let exit = other_index(rng, line.stops().len(), entry);
                at += ride_time(entry, exit);
                out.push(tap(card, Direction::Exit, line, exit, at));
            }
        }
        at
    }
}

/// Render records in the tap-log file format, one per line.
pub fn to_log(records: &[TapRecord]) -> String {
    let mut text = String::new();
    for record in records {
        text.push_str(&record.to_string());
        text.push('\n');
    }
    text
}

fn tap(card: &Uid, direction: Direction, line: &Line, index: usize, at: Timestamp) -> TapRecord {
    TapRecord {
        card_id:   card.to_string(),
        direction: Some(direction),
        stop:      line.stops()[index].name().to_string(),
        line:      line.name().to_string(),
        at,
    }
}

fn ride_time(from: usize, to: usize) -> Duration {
    Duration::minutes(MINUTES_PER_STOP * from.abs_diff(to) as i64 + 1)
}

/// Any index in `0..len` except `skip`. `len` must be at least 2.
fn other_index(rng: &mut TapRng, len: usize, skip: usize) -> usize {
    let i = rng.pick(len - 1);
    if i >= skip { i + 1 } else { i }
}

/// Stops on `line`, other than the entry, that share a name with a stop
/// on another line: (index here, other line, index there).
fn transfer_options<'n>(
    network: &'n Network,
    line: &Line,
    entry: usize,
) -> Option<Vec<(usize, &'n Line, usize)>> {
    let mut options = Vec::new();
    for (here, stop) in line.stops().iter().enumerate() {
        if here == entry {
            continue;
        }
        for other in network.lines().iter().filter(|l| l.id() != line.id()) {
            if let Some(there) = other.find_stop_on_line(stop.name()) {
                options.push((here, other, there.index));
            }
        }
    }
    (!options.is_empty()).then_some(options)
}

fn other_exit(rng: &mut TapRng, line: &Line, entry: usize) -> Option<usize> {
    (line.stops().len() >= 2).then(|| other_index(rng, line.stops().len(), entry))
}
