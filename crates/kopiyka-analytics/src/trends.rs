//! Two-window merchant spend trends.
//!
//! Splits the last `2·W` days into "previous" and "last" windows, sums spend
//! per normalized merchant label, and ranks the deltas.

use serde::{Deserialize, Serialize};

use kopiyka_core::{TxRecord, SECONDS_PER_DAY};

use crate::classify::classify;
use crate::text::normalize_merchant;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendItem {
    pub label: String,
    pub prev_cents: i64,
    pub last_cents: i64,
    pub delta_cents: i64,
    /// delta / prev; 1.0 for brand-new labels, 0.0 for empty ones.
    pub delta_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendsResult {
    pub window_days: i64,
    pub last_start_ts: i64,
    pub prev_start_ts: i64,
    pub top_growing: Vec<TrendItem>,
    pub top_declining: Vec<TrendItem>,
}

const TOP_N: usize = 3;

pub fn compute_trends(records: &[TxRecord], now_ts: i64, window_days: i64) -> TrendsResult {
    let window_days = window_days.clamp(3, 31);

    let last_start = now_ts - window_days * SECONDS_PER_DAY;
    let prev_start = last_start - window_days * SECONDS_PER_DAY;

    let mut last_by: std::collections::BTreeMap<String, i64> = Default::default();
    let mut prev_by: std::collections::BTreeMap<String, i64> = Default::default();

    for r in records {
        if classify(r.amount, r.mcc, &r.description) != kopiyka_core::TxKind::Spend {
            continue;
        }
        let cents = -r.amount;
        let label = normalize_merchant(&r.description);

        if r.time >= prev_start && r.time < last_start {
            *prev_by.entry(label).or_default() += cents;
        } else if r.time >= last_start && r.time < now_ts {
            *last_by.entry(label).or_default() += cents;
        }
    }

    let labels: std::collections::BTreeSet<String> =
        prev_by.keys().chain(last_by.keys()).cloned().collect();

    let mut items: Vec<TrendItem> = labels
        .into_iter()
        .map(|label| {
            let prev = prev_by.get(&label).copied().unwrap_or(0);
            let last = last_by.get(&label).copied().unwrap_or(0);
            let delta = last - prev;
            let pct = if prev > 0 {
                delta as f64 / prev as f64
            } else if last > 0 {
                1.0
            } else {
                0.0
            };
            TrendItem {
                label,
                prev_cents: prev,
                last_cents: last,
                delta_cents: delta,
                delta_pct: pct,
            }
        })
        .collect();

    items.sort_by(|a, b| b.delta_cents.cmp(&a.delta_cents).then_with(|| a.label.cmp(&b.label)));

    let top_growing: Vec<TrendItem> = items
        .iter()
        .filter(|x| x.delta_cents > 0)
        .take(TOP_N)
        .cloned()
        .collect();

    let mut declining: Vec<TrendItem> =
        items.iter().filter(|x| x.delta_cents < 0).cloned().collect();
    declining.sort_by(|a, b| a.delta_cents.cmp(&b.delta_cents).then_with(|| a.label.cmp(&b.label)));
    declining.truncate(TOP_N);

    TrendsResult {
        window_days,
        last_start_ts: last_start,
        prev_start_ts: prev_start,
        top_growing,
        top_declining: declining,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, time: i64, amount: i64, desc: &str, mcc: u16) -> TxRecord {
        TxRecord {
            id: id.to_string(),
            time,
            account_id: "acc".to_string(),
            amount,
            description: desc.to_string(),
            mcc: Some(mcc),
            currency_code: None,
        }
    }

    #[test]
    fn ranks_growing_and_declining_merchants() {
        let now = 100 * SECONDS_PER_DAY;
        let records = vec![
            // previous window
            record("1", now - 10 * SECONDS_PER_DAY + 1, -1_000, "atb", 5411),
            record("2", now - 10 * SECONDS_PER_DAY + 2, -500, "atb", 5411),
            record("3", now - 9 * SECONDS_PER_DAY + 1, -2_000, "mcd", 5814),
            // last window
            record("4", now - 3 * SECONDS_PER_DAY + 1, -6_000, "mcd", 5814),
            record("5", now - 2 * SECONDS_PER_DAY + 1, -300, "atb", 5411),
        ];

        let r = compute_trends(&records, now, 7);

        assert!(!r.top_growing.is_empty());
        assert!(r.top_growing.iter().any(|x| x.label.starts_with("mcd")));
        let mcd = r.top_growing.iter().find(|x| x.label.starts_with("mcd")).unwrap();
        assert_eq!(mcd.prev_cents, 2_000);
        assert_eq!(mcd.last_cents, 6_000);
        assert_eq!(mcd.delta_cents, 4_000);
        assert_eq!(mcd.delta_pct, 2.0);

        assert!(!r.top_declining.is_empty());
        assert!(r.top_declining.iter().any(|x| x.label.starts_with("atb")));
    }

    #[test]
    fn new_label_has_pct_one() {
        let now = 100 * SECONDS_PER_DAY;
        let records = vec![record("1", now - SECONDS_PER_DAY, -500, "novus", 5411)];
        let r = compute_trends(&records, now, 7);
        assert_eq!(r.top_growing[0].delta_pct, 1.0);
    }

    #[test]
    fn transfers_and_income_are_ignored() {
        let now = 100 * SECONDS_PER_DAY;
        let records = vec![
            record("1", now - SECONDS_PER_DAY, -5_000, "переказ на картку", 4829),
            record("2", now - SECONDS_PER_DAY, 9_000, "salary", 1),
        ];
        let r = compute_trends(&records, now, 7);
        assert!(r.top_growing.is_empty());
        assert!(r.top_declining.is_empty());
    }

    #[test]
    fn window_days_is_clamped() {
        let now = 100 * SECONDS_PER_DAY;
        assert_eq!(compute_trends(&[], now, 1).window_days, 3);
        assert_eq!(compute_trends(&[], now, 99).window_days, 31);
    }
}
