//! SQLite tap audit log.
//!
//! RULE: Only store.rs talks to the database.
//! The engine appends one row per processed tap; nothing is ever updated
//! or deleted. The database lives in memory for the length of one run.

use crate::{error::TransitResult, types::RunId};
use rusqlite::{params, Connection};

/// One audit row as persisted to SQLite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapLogEntry {
    pub id:           Option<i64>,
    pub run_id:       RunId,
    pub seq:          u64,
    pub card_id:      String,
    pub tapped_at:    String,
    pub date_key:     String,
    pub outcome_type: String,
    pub payload:      String, // JSON-serialized TapOutcome or TapRejection
}

pub struct TapLog {
    conn: Connection,
}

impl TapLog {
    /// Open a fresh in-memory audit log.
    pub fn in_memory() -> TransitResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> TransitResult<()> {
        self.conn
            .execute_batch(include_str!("../../migrations/001_tap_log.sql"))?;
        Ok(())
    }

    // ── Run ────────────────────────────────────────────────────

    pub fn insert_run(&self, run_id: &str, version: &str) -> TransitResult<()> {
        self.conn.execute(
            "INSERT INTO run (run_id, version) VALUES (?1, ?2)",
            params![run_id, version],
        )?;
        Ok(())
    }

    // ── Tap log ────────────────────────────────────────────────

    pub fn append(&self, entry: &TapLogEntry) -> TransitResult<()> {
        self.conn.execute(
            "INSERT INTO tap_log (run_id, seq, card_id, tapped_at, date_key, outcome_type, payload)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entry.run_id,
                entry.seq as i64,
                entry.card_id,
                entry.tapped_at,
                entry.date_key,
                entry.outcome_type,
                entry.payload,
            ],
        )?;
        Ok(())
    }

    pub fn entries_for_card(&self, run_id: &str, card_id: &str) -> TransitResult<Vec<TapLogEntry>> {
        self.query_entries(
            "SELECT id, run_id, seq, card_id, tapped_at, date_key, outcome_type, payload
             FROM tap_log WHERE run_id = ?1 AND card_id = ?2
             ORDER BY seq ASC",
            run_id,
            card_id,
        )
    }

    pub fn entries_for_date(&self, run_id: &str, date_key: &str) -> TransitResult<Vec<TapLogEntry>> {
        self.query_entries(
            "SELECT id, run_id, seq, card_id, tapped_at, date_key, outcome_type, payload
             FROM tap_log WHERE run_id = ?1 AND date_key = ?2
             ORDER BY seq ASC",
            run_id,
            date_key,
        )
    }

    pub fn count(&self, run_id: &str) -> TransitResult<i64> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM tap_log WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(n)
    }

    pub fn count_by_type(&self, run_id: &str, outcome_type: &str) -> TransitResult<i64> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM tap_log WHERE run_id = ?1 AND outcome_type = ?2",
            params![run_id, outcome_type],
            |row| row.get(0),
        )?;
        Ok(n)
    }

    /// Every payload of a run in processing order.
    pub fn payloads(&self, run_id: &str) -> TransitResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT payload FROM tap_log WHERE run_id = ?1 ORDER BY seq ASC",
        )?;
        let payloads = stmt
            .query_map(params![run_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(payloads)
    }

    fn query_entries(&self, sql: &str, run_id: &str, key: &str) -> TransitResult<Vec<TapLogEntry>> {
        let mut stmt = self.conn.prepare(sql)?;
        let entries = stmt
            .query_map(params![run_id, key], |row| {
                Ok(TapLogEntry {
                    id:           Some(row.get(0)?),
                    run_id:       row.get(1)?,
                    seq:          row.get::<_, i64>(2)? as u64,
                    card_id:      row.get(3)?,
                    tapped_at:    row.get(4)?,
                    date_key:     row.get(5)?,
                    outcome_type: row.get(6)?,
                    payload:      row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(seq: u64, card: &str, date: &str, kind: &str) -> TapLogEntry {
        TapLogEntry {
            id:           None,
            run_id:       "run-test".into(),
            seq,
            card_id:      card.into(),
            tapped_at:    format!("{date}T08:00:00"),
            date_key:     date.into(),
            outcome_type: kind.into(),
            payload:      format!("{{\"seq\":{seq}}}"),
        }
    }

    fn log() -> TapLog {
        let log = TapLog::in_memory().unwrap();
        log.migrate().unwrap();
        log.insert_run("run-test", "0.1.0-test").unwrap();
        log
    }

    #[test]
    fn entries_round_trip_in_sequence_order() {
        let log = log();
        log.append(&entry(0, "100000000", "2020-11-11", "trip_started")).unwrap();
        log.append(&entry(1, "100000001", "2020-11-11", "rejected_balance")).unwrap();
        log.append(&entry(2, "100000000", "2020-11-12", "segment_completed")).unwrap();

        let card = log.entries_for_card("run-test", "100000000").unwrap();
        assert_eq!(card.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![0, 2]);
        assert!(card[0].id.is_some());

        let day = log.entries_for_date("run-test", "2020-11-11").unwrap();
        assert_eq!(day.len(), 2);
        assert_eq!(log.count("run-test").unwrap(), 3);
        assert_eq!(log.count_by_type("run-test", "segment_completed").unwrap(), 1);
        assert_eq!(log.payloads("run-test").unwrap()[1], "{\"seq\":1}");
    }

    #[test]
    fn unknown_run_is_refused() {
        let log = log();
        let mut orphan = entry(0, "100000000", "2020-11-11", "trip_started");
        orphan.run_id = "no-such-run".into();
        assert!(log.append(&orphan).is_err());
    }

    #[test]
    fn sequence_numbers_are_unique_per_run() {
        let log = log();
        log.append(&entry(0, "100000000", "2020-11-11", "trip_started")).unwrap();
        assert!(log.append(&entry(0, "100000000", "2020-11-11", "trip_started")).is_err());
    }
}
