//! tap-runner: headless fare run over a tap log.
//!
//! Usage:
//!   tap-runner --data-dir ./data
//!   tap-runner --data-dir ./data --events taps.txt --date 2020-11-11
//!   tap-runner --data-dir ./data --generate 30 --seed 7 --out generated.txt
//!   tap-runner --data-dir ./data --json

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use std::env;
use transit_core::{
    admin::{Admin, DailyReport},
    engine::{FareEngine, RunSummary},
    loader,
    ridership::{self, RidershipGenerator},
    types::format_cents,
};

#[derive(serde::Serialize)]
struct Report<'a> {
    run_id:  &'a str,
    summary: &'a RunSummary,
    daily:   Vec<DailyReport>,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let data_dir = str_arg(&args, "--data-dir").unwrap_or("./data");
    let seed = parse_arg(&args, "--seed", 42u64);
    let generate = parse_arg(&args, "--generate", 0u32);
    let json = args.iter().any(|a| a == "--json");
    let date = str_arg(&args, "--date")
        .map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").map_err(|e| anyhow!("Bad --date {d}: {e}")))
        .transpose()?;
    let start = str_arg(&args, "--start")
        .map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").map_err(|e| anyhow!("Bad --start {d}: {e}")))
        .transpose()?
        .or_else(|| NaiveDate::from_ymd_opt(2021, 1, 4))
        .ok_or_else(|| anyhow!("No start date"))?;

    let run_id = format!("run-{seed}");
    let mut engine = FareEngine::build_from_dir(run_id.clone(), data_dir)?;

    let events = if generate > 0 {
        let cards = engine.riders().card_ids();
        let records = RidershipGenerator::new(seed).generate(engine.network(), &cards, start, generate);
        let text = ridership::to_log(&records);
        if let Some(out) = str_arg(&args, "--out") {
            std::fs::write(out, &text).map_err(|e| anyhow!("Cannot write {out}: {e}"))?;
            log::info!("Wrote {} generated taps to {out}", records.len());
        }
        text
    } else if let Some(path) = str_arg(&args, "--events") {
        std::fs::read_to_string(path).map_err(|e| anyhow!("Cannot read {path}: {e}"))?
    } else {
        loader::read_events(data_dir)?
    };

    let summary = engine.run_log(&events);
    let admin = Admin::new(&engine);
    let daily: Vec<DailyReport> = admin
        .daily_report()
        .into_iter()
        .filter(|r| date.map_or(true, |d| r.date == d))
        .collect();

    if json {
        let report = Report { run_id: &run_id, summary: &summary, daily };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Transit fare run: tap-runner");
    println!("  run_id:    {run_id}");
    println!("  data_dir:  {data_dir}");
    if generate > 0 {
        println!("  generated: {generate} days from {start}, seed {seed}");
    }
    println!();
    print_summary(&summary);
    println!();
    println!("=== DAILY TOTALS ===");
    if daily.is_empty() {
        println!("  (No fares collected)");
    }
    for row in &daily {
        println!("  {}  fare {:>10}  stops {:>6}", row.date, format_cents(row.fare), row.stops);
    }
    if engine.audit_failures() > 0 {
        println!();
        println!("  WARNING: {} taps missing from the audit log", engine.audit_failures());
    }
    Ok(())
}

fn print_summary(s: &RunSummary) {
    println!("=== RUN SUMMARY ===");
    println!("  records:        {}", s.records);
    println!("  accepted:       {}", s.accepted);
    println!("  trips started:  {}", s.trips_started);
    println!("  transfers:      {}", s.transfers);
    println!("  segments:       {}", s.segments);
    println!("  duplicates:     {}", s.duplicates);
    println!("  rejected:       {}", s.rejected);
    println!("  unknown:        {}", s.unknown);
    println!("  malformed:      {}", s.malformed);
    println!("  fare collected: {}", format_cents(s.fare_collected));
    println!("  stops:          {}", s.stops_travelled);
}

fn str_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
