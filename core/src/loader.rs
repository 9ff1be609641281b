//! Flat-file loaders. Every file is one record per line, fields separated
//! by `;`. Blank lines are skipped everywhere.
//!
//!   Lines.txt   Bus|Subway;<line>;<stop 1>;...;<stop n>
//!   Riders.txt  <name>;<email>;<rider id>
//!   Cards.txt   <rider id>;<card id>[;<balance in dollars>]
//!   Events.txt  <card id>;<enter|exit|>;<stop>;<line>;<ISO-8601 time>

use crate::{
    card::Card,
    config::FareConfig,
    error::{TransitError, TransitResult},
    ids::IdAllocator,
    rider::{Rider, RiderDirectory},
    topology::{LineKind, Network},
    trip::Direction,
    types::{parse_dollars, Cents, Timestamp},
};
use chrono::NaiveDateTime;
use std::{fmt, path::Path};

pub const LINES_FILE:  &str = "Lines.txt";
pub const RIDERS_FILE: &str = "Riders.txt";
pub const CARDS_FILE:  &str = "Cards.txt";
pub const EVENTS_FILE: &str = "Events.txt";

/// One raw tap, before any of its references are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapRecord {
    pub card_id:   String,
    pub direction: Option<Direction>,
    pub stop:      String,
    pub line:      String,
    pub at:        Timestamp,
}

impl fmt::Display for TapRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = self.direction.map(|d| d.to_string()).unwrap_or_default();
        write!(
            f,
            "{};{};{};{};{}",
            self.card_id,
            direction,
            self.stop,
            self.line,
            self.at.format("%Y-%m-%dT%H:%M:%S")
        )
    }
}

fn malformed(line: usize, reason: impl Into<String>) -> TransitError {
    TransitError::MalformedRecord { line, reason: reason.into() }
}

/// Non-blank lines with their 1-based line numbers.
fn records(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty())
}

/// ISO-8601 local time, with or without seconds.
pub fn parse_timestamp(text: &str) -> Option<Timestamp> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M"))
        .ok()
}

pub fn parse_tap_line(line_no: usize, line: &str) -> TransitResult<TapRecord> {
    let fields: Vec<&str> = line.split(';').map(str::trim).collect();
    if fields.len() != 5 {
        return Err(malformed(line_no, format!("expected 5 fields, found {}", fields.len())));
    }
    if fields[0].is_empty() {
        return Err(malformed(line_no, "missing card id"));
    }
    let direction = match fields[1] {
        "" => None,
        d => Some(d.parse::<Direction>().map_err(|e| malformed(line_no, e))?),
    };
    if fields[2].is_empty() || fields[3].is_empty() {
        return Err(malformed(line_no, "missing stop or line"));
    }
    let at = parse_timestamp(fields[4])
        .ok_or_else(|| malformed(line_no, format!("bad timestamp '{}'", fields[4])))?;
    Ok(TapRecord {
        card_id:   fields[0].to_string(),
        direction,
        stop:      fields[2].to_string(),
        line:      fields[3].to_string(),
        at,
    })
}

pub fn parse_lines(text: &str) -> TransitResult<Network> {
    let mut network = Network::new();
    for (line_no, line) in records(text) {
        let fields: Vec<&str> = line.split(';').map(str::trim).collect();
        if fields.len() < 3 {
            return Err(malformed(line_no, "a line needs a type, a name and at least one stop"));
        }
        let kind: LineKind = fields[0].parse().map_err(|e| malformed(line_no, e))?;
        network
            .add_line(kind, fields[1], fields[2..].iter().copied())
            .map_err(|e| malformed(line_no, e.to_string()))?;
    }
    log::info!("Loaded {} lines", network.lines().len());
    Ok(network)
}

pub fn parse_riders(text: &str, ids: &mut IdAllocator) -> TransitResult<Vec<Rider>> {
    let mut riders = Vec::new();
    for (line_no, line) in records(text) {
        let fields: Vec<&str> = line.split(';').map(str::trim).collect();
        let [name, email, id] = fields[..] else {
            return Err(malformed(line_no, format!("expected 3 fields, found {}", fields.len())));
        };
        let id = ids
            .claim(id)
            .ok_or_else(|| malformed(line_no, format!("bad rider id '{id}'")))?;
        riders.push(Rider::new(id, name, email));
    }
    Ok(riders)
}

/// Issue every card in `text` to its rider. Returns how many were issued.
pub fn parse_cards(
    text: &str,
    ids: &mut IdAllocator,
    riders: &mut RiderDirectory,
    default_balance: Cents,
) -> TransitResult<usize> {
    let mut issued = 0;
    for (line_no, line) in records(text) {
        let fields: Vec<&str> = line.split(';').map(str::trim).collect();
        let (rider_id, card_id, balance) = match fields[..] {
            [r, c] => (r, c, default_balance),
            [r, c, b] => {
                let balance = parse_dollars(b)
                    .ok_or_else(|| malformed(line_no, format!("bad balance '{b}'")))?;
                (r, c, balance)
            }
            _ => return Err(malformed(line_no, format!("expected 2 or 3 fields, found {}", fields.len()))),
        };
        let bearer = riders
            .find_rider(rider_id)
            .map(|r| r.id().clone())
            .ok_or_else(|| malformed(line_no, format!("unknown rider '{rider_id}'")))?;
        let card_id = ids
            .claim(card_id)
            .ok_or_else(|| malformed(line_no, format!("bad card id '{card_id}'")))?;
        riders
            .issue_card(Card::new(card_id, bearer, balance))
            .map_err(|e| malformed(line_no, e.to_string()))?;
        issued += 1;
    }
    Ok(issued)
}

fn read(data_dir: &Path, file: &str) -> TransitResult<String> {
    let path = data_dir.join(file);
    std::fs::read_to_string(&path).map_err(|e| {
        TransitError::Other(anyhow::anyhow!("Cannot read {}: {e}", path.display()))
    })
}

/// Load lines, riders and cards from `data_dir`.
pub fn load_data_dir(
    data_dir: &str,
    config: &FareConfig,
    ids: &mut IdAllocator,
) -> TransitResult<(Network, RiderDirectory)> {
    let dir = Path::new(data_dir);
    let network = parse_lines(&read(dir, LINES_FILE)?)?;

    let mut riders = RiderDirectory::new();
    for rider in parse_riders(&read(dir, RIDERS_FILE)?, ids)? {
        riders.add_rider(rider)?;
    }
    let cards = parse_cards(&read(dir, CARDS_FILE)?, ids, &mut riders, config.default_balance)?;
    log::info!("Loaded {} riders holding {cards} cards", riders.riders().len());
    Ok((network, riders))
}

/// Read the raw tap log from `data_dir`.
pub fn read_events(data_dir: &str) -> TransitResult<String> {
    read(Path::new(data_dir), EVENTS_FILE)
}
