//! Deterministic validation and repair of a merged case record.
//!
//! Repair only reorders and removes; it never adds content.

use chrono::NaiveDate;
use extract::normalizer::{dedup_by_key, has_source_marker, normalize_key};
use extract::{CaseRecord, TimelineEntry};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileReport {
    /// Timeline was not sorted ascending with undated events last
    pub timeline_out_of_order: bool,
    pub undated_events: usize,
    /// Entity and party names equal after normalization
    pub duplicate_names: usize,
    /// Repeated statements, timeline events and quotes
    pub duplicate_statements: usize,
    /// Statements without an inline `[para n]`/`[p n]` locator
    pub unmarked_statements: usize,
    pub repaired: bool,
}

impl ReconcileReport {
    /// True when the record already satisfied the ordering and uniqueness invariants
    pub fn is_clean(&self) -> bool {
        !self.timeline_out_of_order && self.duplicate_names == 0 && self.duplicate_statements == 0
    }
}

/// Parse an ISO `YYYY-MM-DD` timeline date
pub fn parse_date(date: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").ok()
}

/// Ascending by date, undated entries after all dated ones
pub fn timeline_is_ordered(timeline: &[TimelineEntry]) -> bool {
    let keys: Vec<_> = timeline.iter().map(sort_key).collect();
    keys.windows(2).all(|pair| pair[0] <= pair[1])
}

fn sort_key(entry: &TimelineEntry) -> (bool, Option<NaiveDate>) {
    let date = parse_date(&entry.date);
    (date.is_none(), date)
}

/// Stable sort: dated entries ascending, then undated entries in input order
pub fn sort_timeline(timeline: &mut [TimelineEntry]) {
    timeline.sort_by_key(sort_key);
}

/// Report invariant violations without touching the record
pub fn check(record: &CaseRecord) -> ReconcileReport {
    let mut copy = record.clone();
    let mut report = reconcile_in_place(&mut copy);
    report.repaired = false;
    report
}

/// Sort the timeline and drop duplicates in place
pub fn repair(record: &mut CaseRecord) -> ReconcileReport {
    let mut report = reconcile_in_place(record);
    report.repaired = true;
    report
}

fn reconcile_in_place(record: &mut CaseRecord) -> ReconcileReport {
    let mut report = ReconcileReport {
        timeline_out_of_order: !timeline_is_ordered(&record.timeline),
        undated_events: record
            .timeline
            .iter()
            .filter(|e| parse_date(&e.date).is_none())
            .count(),
        unmarked_statements: count_unmarked(record),
        ..ReconcileReport::default()
    };

    sort_timeline(&mut record.timeline);

    report.duplicate_names += dedup_by_key(&mut record.entities);
    report.duplicate_names += dedup_by_key(&mut record.parties.plaintiffs);
    report.duplicate_names += dedup_by_key(&mut record.parties.defendants);
    report.duplicate_names += dedup_by_key(&mut record.parties.judges);

    for (_, list) in record.statement_lists_mut() {
        report.duplicate_statements += dedup_by_key(list);
    }

    let before = record.timeline.len();
    let mut seen = HashSet::new();
    record
        .timeline
        .retain(|e| seen.insert((e.date.trim().to_string(), normalize_key(&e.event))));
    report.duplicate_statements += before - record.timeline.len();

    let before = record.key_quotes.len();
    let mut seen = HashSet::new();
    record
        .key_quotes
        .retain(|q| !q.text.trim().is_empty() && seen.insert(normalize_key(&q.text)));
    report.duplicate_statements += before - record.key_quotes.len();

    report
}

fn count_unmarked(record: &CaseRecord) -> usize {
    let statements = record
        .statement_lists()
        .into_iter()
        .filter(|(name, _)| *name != "citations")
        .flat_map(|(_, list)| list.iter())
        .filter(|s| !has_source_marker(s))
        .count();
    let events = record
        .timeline
        .iter()
        .filter(|e| !has_source_marker(&e.source) && !has_source_marker(&e.event))
        .count();
    let quotes = record
        .key_quotes
        .iter()
        .filter(|q| !has_source_marker(&q.source) && !has_source_marker(&q.text))
        .count();

    statements + events + quotes
}

pub fn log_report(case_id: &str, report: &ReconcileReport) {
    if report.is_clean() {
        info!(
            case_id,
            undated_events = report.undated_events,
            unmarked_statements = report.unmarked_statements,
            "Case record satisfies ordering and uniqueness invariants"
        );
        return;
    }

    warn!(
        case_id,
        timeline_out_of_order = report.timeline_out_of_order,
        duplicate_names = report.duplicate_names,
        duplicate_statements = report.duplicate_statements,
        unmarked_statements = report.unmarked_statements,
        repaired = report.repaired,
        "Case record violated merge invariants"
    );
}
