//! Deterministic daily digest over the event log and journal.
//!
//! A pure function of its inputs: same events, entries, and reference
//! instant always produce byte-identical output.

use std::fmt::Write as _;

use chrono::{TimeZone, Utc};

use crate::models::{AlertEmitted, AlertEventType};
use crate::services::journal::JournalEntry;

fn fmt_day(ts: i64) -> String {
    Utc.timestamp_opt(ts, 0)
        .single()
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| ts.to_string())
}

fn fmt_time(ts: i64) -> String {
    Utc.timestamp_opt(ts, 0)
        .single()
        .map(|d| d.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

fn count_of(events: &[&AlertEmitted], event_type: AlertEventType) -> usize {
    events.iter().filter(|e| e.event_type == event_type).count()
}

pub fn build_daily_report(now: i64, events: &[AlertEmitted], entries: &[JournalEntry]) -> String {
    let mut events: Vec<&AlertEmitted> = events.iter().collect();
    events.sort_by(|a, b| {
        a.occurred_at
            .cmp(&b.occurred_at)
            .then_with(|| a.event_id.cmp(&b.event_id))
    });

    let mut entries: Vec<&JournalEntry> = entries.iter().collect();
    entries.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut out = String::new();
    let _ = writeln!(out, "Daily alert report for {}", fmt_day(now));
    let _ = writeln!(out);

    let _ = writeln!(out, "Events: {}", events.len());
    let _ = writeln!(
        out,
        "  threshold triggered:  {}",
        count_of(&events, AlertEventType::SimpleTriggered)
    );
    let _ = writeln!(
        out,
        "  two-stage confirmed:  {}",
        count_of(&events, AlertEventType::TwoStageConfirmed)
    );
    let _ = writeln!(
        out,
        "  two-stage expired:    {}",
        count_of(&events, AlertEventType::TwoStageExpired)
    );
    let _ = writeln!(
        out,
        "  dormant stage events: {}",
        count_of(&events, AlertEventType::DormantStage)
    );
    let _ = writeln!(out);

    for event in &events {
        let _ = writeln!(
            out,
            "{} {} {} ({}, {})",
            fmt_time(event.occurred_at),
            event.event_type.as_str(),
            event.symbol_or_address,
            event.stage.as_str(),
            event.timeframe,
        );
    }

    if !entries.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Journal: {} entries", entries.len());
        for entry in &entries {
            let symbol = entry.symbol_or_address.as_deref().unwrap_or("-");
            let _ = writeln!(out, "  [{}] {} {}", entry.id, symbol, entry.text);
        }
    }

    out
}
