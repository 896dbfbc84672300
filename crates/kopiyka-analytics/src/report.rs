//! Period report assembly.
//!
//! Takes a records slice spanning at least two periods, computes current and
//! previous facts, and attaches comparison, trends, anomalies and what-if
//! blocks. `facts_for_cache` embeds the comparison into the current facts —
//! that enriched object is what the report cache stores.

use std::collections::BTreeMap;

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};

use kopiyka_core::{previous_period, range_last_days, TimeRange, TxRecord};

use crate::anomalies::{detect_anomalies, AnomalyConfig};
use crate::compare::{compare_categories, compare_totals, CategoryComparison, TotalsComparison};
use crate::compute::{compute_facts, Facts, Totals};
use crate::rows::rows_from_ledger;
use crate::trends::compute_trends;
use crate::whatif::build_whatif_suggestions;

const TRENDS_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowMeta {
    pub start_ts: i64,
    pub end_ts: i64,
    pub start_iso_utc: String,
    pub end_iso_utc: String,
}

impl WindowMeta {
    fn from_range(range: TimeRange) -> Self {
        Self {
            start_ts: range.start_ts,
            end_ts: range.end_ts,
            start_iso_utc: iso_utc(range.start_ts),
            end_iso_utc: iso_utc(range.end_ts),
        }
    }
}

fn iso_utc(ts: i64) -> String {
    Utc.timestamp_opt(ts, 0)
        .single()
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodMeta {
    pub days_back: i64,
    pub current: WindowMeta,
    pub previous: WindowMeta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompareBlock {
    pub totals: TotalsComparison,
    pub categories_real_spend: BTreeMap<String, CategoryComparison>,
}

/// Previous-period summary embedded into cached facts so the renderer can
/// show "vs last period" without loading a second envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrevPeriodSummary {
    pub dt_from: String,
    pub dt_to: String,
    pub totals: Totals,
    pub categories_real_spend: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonBlock {
    pub prev_period: PrevPeriodSummary,
    pub totals: TotalsComparison,
    pub categories: BTreeMap<String, CategoryComparison>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodReport {
    pub period: PeriodMeta,
    pub current: Facts,
    pub previous: Facts,
    pub compare: CompareBlock,
}

/// `(current, previous)` windows of equal length ending at `now_ts`.
pub fn build_period_windows(days_back: i64, now_ts: i64) -> (TimeRange, TimeRange) {
    let current = range_last_days(now_ts, days_back);
    (current, previous_period(current))
}

fn filter_records(records: &[TxRecord], window: TimeRange) -> Vec<TxRecord> {
    records
        .iter()
        .filter(|r| window.contains(r.time))
        .cloned()
        .collect()
}

pub fn build_period_report(records: &[TxRecord], days_back: i64, now_ts: i64) -> PeriodReport {
    let (current_w, prev_w) = build_period_windows(days_back, now_ts);

    let current_rows = rows_from_ledger(&filter_records(records, current_w));
    let prev_rows = rows_from_ledger(&filter_records(records, prev_w));

    let mut current = compute_facts(&current_rows);
    let previous = compute_facts(&prev_rows);

    current.whatif_suggestions = Some(build_whatif_suggestions(&current_rows, days_back));
    current.trends = Some(compute_trends(records, now_ts, TRENDS_WINDOW_DAYS));
    current.anomalies = Some(detect_anomalies(records, now_ts, &AnomalyConfig::default()));

    let compare = CompareBlock {
        totals: compare_totals(&current, &previous),
        categories_real_spend: compare_categories(
            &current.categories_real_spend,
            &previous.categories_real_spend,
        ),
    };

    PeriodReport {
        period: PeriodMeta {
            days_back,
            current: WindowMeta::from_range(current_w),
            previous: WindowMeta::from_range(prev_w),
        },
        current,
        previous,
        compare,
    }
}

/// Fold the comparison into the current facts; the result is the envelope
/// the report cache persists.
pub fn facts_for_cache(report: PeriodReport) -> Facts {
    let PeriodReport {
        period,
        mut current,
        previous,
        compare,
    } = report;

    current.comparison = Some(ComparisonBlock {
        prev_period: PrevPeriodSummary {
            dt_from: period.previous.start_iso_utc,
            dt_to: period.previous.end_iso_utc,
            totals: previous.totals,
            categories_real_spend: previous.categories_real_spend,
        },
        totals: compare.totals,
        categories: compare.categories_real_spend,
    });
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use kopiyka_core::SECONDS_PER_DAY;

    fn record(id: &str, time: i64, amount: i64, desc: &str, mcc: Option<u16>) -> TxRecord {
        TxRecord {
            id: id.to_string(),
            time,
            account_id: "acc".to_string(),
            amount,
            description: desc.to_string(),
            mcc,
            currency_code: None,
        }
    }

    #[test]
    fn windows_are_adjacent_and_equal() {
        let now = 100 * SECONDS_PER_DAY;
        let (cur, prev) = build_period_windows(7, now);
        assert_eq!(cur.end_ts, now);
        assert_eq!(cur.duration_secs(), 7 * SECONDS_PER_DAY);
        assert_eq!(prev.end_ts, cur.start_ts);
        assert_eq!(prev.duration_secs(), cur.duration_secs());
    }

    #[test]
    fn report_splits_rows_between_periods() {
        let now = 100 * SECONDS_PER_DAY;
        let records = vec![
            // current week
            record("c1", now - 2 * SECONDS_PER_DAY, -20_000, "mcd", Some(5814)),
            // previous week
            record("p1", now - 9 * SECONDS_PER_DAY, -10_000, "mcd", Some(5814)),
        ];

        let report = build_period_report(&records, 7, now);
        assert_eq!(report.current.totals.real_spend_total_uah, 200.0);
        assert_eq!(report.previous.totals.real_spend_total_uah, 100.0);

        let cmp = &report.compare.totals;
        assert_eq!(cmp.delta.real_spend_total_uah, 100.0);
        assert_eq!(cmp.pct_change.real_spend_total_uah, Some(100.0));
    }

    #[test]
    fn zero_previous_period_reports_absent_pct() {
        let now = 100 * SECONDS_PER_DAY;
        let records = vec![record("c1", now - SECONDS_PER_DAY, -5_000, "atb", Some(5411))];
        let report = build_period_report(&records, 7, now);
        assert_eq!(report.compare.totals.pct_change.real_spend_total_uah, None);
    }

    #[test]
    fn cached_facts_embed_comparison_and_signals() {
        let now = 100 * SECONDS_PER_DAY;
        let records = vec![
            record("c1", now - 2 * SECONDS_PER_DAY, -20_000, "mcd", Some(5814)),
            record("p1", now - 9 * SECONDS_PER_DAY, -10_000, "mcd", Some(5814)),
        ];
        let facts = facts_for_cache(build_period_report(&records, 7, now));

        let comparison = facts.comparison.as_ref().expect("comparison block");
        assert_eq!(comparison.prev_period.totals.real_spend_total_uah, 100.0);
        assert!(facts.trends.is_some());
        assert!(facts.anomalies.is_some());
        assert!(facts.whatif_suggestions.is_some());
    }
}
