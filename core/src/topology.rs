//! Static route structure: lines, their ordered stops, and the two
//! questions the fare engine asks of them.
//!
//! Stops are addressed by `StopId { line, index }` into the `Network`
//! arena. A stop's index is its position along the route, so traversal
//! distance is plain index arithmetic.

use crate::error::{TapError, TransitError, TransitResult};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LineId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StopId {
    pub line:  LineId,
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    Bus,
    Subway,
}

impl FromStr for LineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Bus"    => Ok(Self::Bus),
            "Subway" => Ok(Self::Subway),
            other    => Err(format!("unknown line type '{other}'")),
        }
    }
}

impl fmt::Display for LineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus    => f.write_str("Bus"),
            Self::Subway => f.write_str("Subway"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Stop {
    name: String,
    line: LineId,
}

impl Stop {
    pub fn name(&self) -> &str { &self.name }
    pub fn line(&self) -> LineId { self.line }
}

#[derive(Debug, Clone)]
pub struct Line {
    id:    LineId,
    name:  String,
    kind:  LineKind,
    stops: Vec<Stop>,
    /// Display color for map rendering; the fare engine never reads it.
    color: Option<String>,
}

impl Line {
    pub fn id(&self) -> LineId { self.id }
    pub fn name(&self) -> &str { &self.name }
    pub fn kind(&self) -> LineKind { self.kind }
    pub fn stops(&self) -> &[Stop] { &self.stops }
    pub fn color(&self) -> Option<&str> { self.color.as_deref() }

    pub fn set_color(&mut self, color: impl Into<String>) {
        self.color = Some(color.into());
    }

    pub fn find_stop_on_line(&self, name: &str) -> Option<StopId> {
        self.stops
            .iter()
            .position(|s| s.name == name)
            .map(|index| StopId { line: self.id, index })
    }

    fn contains(&self, stop: StopId) -> bool {
        stop.line == self.id && stop.index < self.stops.len()
    }
}

/// Every line in the system, indexed by `LineId`.
#[derive(Debug, Clone, Default)]
pub struct Network {
    lines: Vec<Line>,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a line and set its route. Route order is the order of
    /// `stop_names`. A route is set once and never edited afterwards.
    pub fn add_line<I, S>(&mut self, kind: LineKind, name: &str, stop_names: I) -> TransitResult<LineId>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.line_by_name(name).is_some() {
            return Err(TransitError::Config(format!("duplicate line '{name}'")));
        }
        let id = LineId(self.lines.len());
        let mut stops: Vec<Stop> = Vec::new();
        for stop_name in stop_names {
            let stop_name = stop_name.into();
            if stops.iter().any(|s| s.name == stop_name) {
                return Err(TransitError::Config(format!(
                    "stop '{stop_name}' appears twice on line '{name}'"
                )));
            }
            stops.push(Stop { name: stop_name, line: id });
        }
        if stops.is_empty() {
            return Err(TransitError::Config(format!("line '{name}' has no stops")));
        }
        self.lines.push(Line {
            id,
            name: name.to_string(),
            kind,
            stops,
            color: None,
        });
        Ok(id)
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn line(&self, id: LineId) -> Option<&Line> {
        self.lines.get(id.0)
    }

    pub fn line_mut(&mut self, id: LineId) -> Option<&mut Line> {
        self.lines.get_mut(id.0)
    }

    pub fn line_by_name(&self, name: &str) -> Option<&Line> {
        self.lines.iter().find(|l| l.name == name)
    }

    pub fn stop(&self, id: StopId) -> Option<&Stop> {
        self.line(id.line).and_then(|l| l.stops.get(id.index))
    }

    /// Resolve a stop by name on the named line.
    pub fn find_stop(&self, stop_name: &str, line_name: &str) -> Result<StopId, TapError> {
        let line = self.line_by_name(line_name).ok_or_else(|| TapError::UnknownLine {
            line: line_name.to_string(),
        })?;
        line.find_stop_on_line(stop_name).ok_or_else(|| TapError::UnknownStop {
            stop: stop_name.to_string(),
            line: line_name.to_string(),
        })
    }

    /// Human-readable "Stop (Line)" label, for logs.
    pub fn describe(&self, id: StopId) -> String {
        match (self.stop(id), self.line(id.line)) {
            (Some(stop), Some(line)) => format!("{} ({})", stop.name, line.name),
            _ => format!("<unknown stop {}:{}>", id.line.0, id.index),
        }
    }

    /// Stops reached riding `line` from `start` to `end`: the entry stop is
    /// excluded, the exit stop included, walking the route in order.
    ///
    /// Returns 0 if either stop is not on `line`, or if `end` comes before
    /// `start` on the route.
    pub fn distance_between(&self, line: LineId, start: StopId, end: StopId) -> u32 {
        let Some(route) = self.line(line) else {
            return 0;
        };
        if !route.contains(start) || !route.contains(end) {
            return 0;
        }
        if end.index < start.index {
            return 0;
        }
        (end.index - start.index) as u32
    }

    /// True iff a rider at `a` can transfer to `b`: same stop name,
    /// different line.
    pub fn is_transfer_point(&self, a: StopId, b: StopId) -> bool {
        match (self.stop(a), self.stop(b)) {
            (Some(sa), Some(sb)) => sa.name == sb.name && sa.line != sb.line,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network() -> (Network, LineId, LineId) {
        let mut net = Network::new();
        let a = net
            .add_line(LineKind::Subway, "Line A", ["Union", "King", "Main St", "Queen", "Dundas"])
            .unwrap();
        let b = net
            .add_line(LineKind::Bus, "Line B", ["Main St", "Spadina", "Bathurst"])
            .unwrap();
        (net, a, b)
    }

    #[test]
    fn distance_counts_stops_after_entry_up_to_exit() {
        let (net, a, _) = network();
        let union = net.find_stop("Union", "Line A").unwrap();
        let main = net.find_stop("Main St", "Line A").unwrap();
        let dundas = net.find_stop("Dundas", "Line A").unwrap();
        assert_eq!(net.distance_between(a, union, main), 2);
        assert_eq!(net.distance_between(a, union, dundas), 4);
        assert_eq!(net.distance_between(a, main, main), 0);
    }

    #[test]
    fn distance_against_route_order_is_zero() {
        let (net, a, _) = network();
        let union = net.find_stop("Union", "Line A").unwrap();
        let queen = net.find_stop("Queen", "Line A").unwrap();
        assert_eq!(net.distance_between(a, queen, union), 0);
        assert_eq!(net.distance_between(a, union, queen), 3);
    }

    #[test]
    fn distance_off_line_is_zero() {
        let (net, a, b) = network();
        let union = net.find_stop("Union", "Line A").unwrap();
        let spadina = net.find_stop("Spadina", "Line B").unwrap();
        assert_eq!(net.distance_between(a, union, spadina), 0);
        assert_eq!(net.distance_between(b, union, spadina), 0);
        assert_eq!(net.distance_between(LineId(99), union, union), 0);
    }

    #[test]
    fn transfer_point_needs_same_name_and_different_line() {
        let (net, _, _) = network();
        let main_a = net.find_stop("Main St", "Line A").unwrap();
        let main_b = net.find_stop("Main St", "Line B").unwrap();
        let king = net.find_stop("King", "Line A").unwrap();
        assert!(net.is_transfer_point(main_a, main_b));
        assert!(net.is_transfer_point(main_b, main_a));
        assert!(!net.is_transfer_point(main_a, main_a));
        assert!(!net.is_transfer_point(main_a, king));
    }

    #[test]
    fn unknown_references_are_reported() {
        let (net, _, _) = network();
        assert_eq!(
            net.find_stop("Union", "Line Z"),
            Err(TapError::UnknownLine { line: "Line Z".into() })
        );
        assert_eq!(
            net.find_stop("Nowhere", "Line A"),
            Err(TapError::UnknownStop { stop: "Nowhere".into(), line: "Line A".into() })
        );
    }

    #[test]
    fn duplicate_stop_names_on_a_line_are_rejected() {
        let mut net = Network::new();
        let err = net.add_line(LineKind::Bus, "Loop", ["X", "Y", "X"]).unwrap_err();
        assert!(matches!(err, TransitError::Config(_)));
    }
}
