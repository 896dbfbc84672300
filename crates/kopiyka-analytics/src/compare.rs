//! Period-over-period comparison and the yesterday-vs-baseline routine.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use kopiyka_core::money::round2;
use kopiyka_core::{day_floor, TxKind, SECONDS_PER_DAY};

use crate::categories::category_from_mcc;
use crate::compute::{Facts, Totals};
use crate::rows::TxRow;
use crate::text::normalize_loose;

/// Percent change, 2 decimals. `None` when the previous value is zero — the
/// renderer shows a sentinel instead of infinity.
pub fn pct_change(current: f64, prev: f64) -> Option<f64> {
    if prev == 0.0 {
        return None;
    }
    Some(round2((current - prev) / prev * 100.0))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TotalsPctChange {
    pub income_total_uah: Option<f64>,
    pub spend_total_uah: Option<f64>,
    pub transfer_in_total_uah: Option<f64>,
    pub transfer_out_total_uah: Option<f64>,
    pub real_spend_total_uah: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TotalsComparison {
    /// current − previous per total, 2 decimals.
    pub delta: Totals,
    pub pct_change: TotalsPctChange,
}

pub fn compare_totals(current: &Facts, prev: &Facts) -> TotalsComparison {
    let c = &current.totals;
    let p = &prev.totals;
    TotalsComparison {
        delta: Totals {
            income_total_uah: round2(c.income_total_uah - p.income_total_uah),
            spend_total_uah: round2(c.spend_total_uah - p.spend_total_uah),
            transfer_in_total_uah: round2(c.transfer_in_total_uah - p.transfer_in_total_uah),
            transfer_out_total_uah: round2(c.transfer_out_total_uah - p.transfer_out_total_uah),
            real_spend_total_uah: round2(c.real_spend_total_uah - p.real_spend_total_uah),
        },
        pct_change: TotalsPctChange {
            income_total_uah: pct_change(c.income_total_uah, p.income_total_uah),
            spend_total_uah: pct_change(c.spend_total_uah, p.spend_total_uah),
            transfer_in_total_uah: pct_change(c.transfer_in_total_uah, p.transfer_in_total_uah),
            transfer_out_total_uah: pct_change(c.transfer_out_total_uah, p.transfer_out_total_uah),
            real_spend_total_uah: pct_change(c.real_spend_total_uah, p.real_spend_total_uah),
        },
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryComparison {
    pub current_uah: f64,
    pub prev_uah: f64,
    pub delta_uah: f64,
    pub pct_change: Option<f64>,
}

/// Per-category comparison over the union of keys from both periods.
pub fn compare_categories(
    current: &BTreeMap<String, f64>,
    prev: &BTreeMap<String, f64>,
) -> BTreeMap<String, CategoryComparison> {
    let keys: BTreeSet<&String> = current.keys().chain(prev.keys()).collect();
    keys.into_iter()
        .map(|k| {
            let c = current.get(k).copied().unwrap_or(0.0);
            let p = prev.get(k).copied().unwrap_or(0.0);
            (
                k.clone(),
                CategoryComparison {
                    current_uah: round2(c),
                    prev_uah: round2(p),
                    delta_uah: round2(c - p),
                    pct_change: pct_change(c, p),
                },
            )
        })
        .collect()
}

// ── Yesterday vs baseline ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaselineFilter {
    /// Normalized substring match over descriptions.
    Merchant(String),
    /// Exact named-category match via the MCC table.
    Category(String),
}

impl BaselineFilter {
    fn matches(&self, row: &TxRow) -> bool {
        match self {
            BaselineFilter::Merchant(needle) => {
                normalize_loose(&row.description).contains(needle.as_str())
            }
            BaselineFilter::Category(cat) => {
                category_from_mcc(row.mcc).unwrap_or("Інше") == cat
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineComparison {
    pub yesterday_cents: i64,
    pub baseline_median_cents: i64,
    pub delta_cents: i64,
}

fn median_i64(values: &mut Vec<i64>) -> i64 {
    if values.is_empty() {
        return 0;
    }
    values.sort_unstable();
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        (values[mid - 1] + values[mid]) / 2
    }
}

/// How did yesterday compare to the usual day? Baseline = median of per-day
/// spend totals over `[today − lookback, yesterday)`, days without matching
/// spend excluded.
pub fn compare_yesterday_to_baseline(
    rows: &[TxRow],
    now_ts: i64,
    filter: &BaselineFilter,
    lookback_days: i64,
) -> BaselineComparison {
    let lookback_days = lookback_days.clamp(7, 90);
    let today0 = day_floor(now_ts);
    let yesterday0 = today0 - SECONDS_PER_DAY;
    let hist_start = today0 - lookback_days * SECONDS_PER_DAY;

    let mut yesterday_cents = 0i64;
    let mut daily: BTreeMap<i64, i64> = BTreeMap::new();

    for row in rows {
        if row.kind != TxKind::Spend || !filter.matches(row) {
            continue;
        }
        let cents = -row.amount;
        if row.ts >= yesterday0 && row.ts < today0 {
            yesterday_cents += cents;
        } else if row.ts >= hist_start && row.ts < yesterday0 {
            *daily.entry(row.ts.div_euclid(SECONDS_PER_DAY)).or_default() += cents;
        }
    }

    let mut values: Vec<i64> = daily.into_values().collect();
    let baseline_median_cents = median_i64(&mut values);
    BaselineComparison {
        yesterday_cents,
        baseline_median_cents,
        delta_cents: yesterday_cents - baseline_median_cents,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::compute_facts;
    use crate::rows::rows_from_ledger;
    use kopiyka_core::TxRecord;

    fn record(id: &str, time: i64, amount: i64, desc: &str, mcc: Option<u16>) -> TxRecord {
        TxRecord {
            id: id.to_string(),
            time,
            account_id: "acc".to_string(),
            amount,
            description: desc.to_string(),
            mcc,
            currency_code: Some(980),
        }
    }

    #[test]
    fn pct_change_zero_prev_is_absent() {
        assert_eq!(pct_change(100.0, 0.0), None);
        assert_eq!(pct_change(200.0, 100.0), Some(100.0));
        assert_eq!(pct_change(50.0, 100.0), Some(-50.0));
    }

    #[test]
    fn compare_totals_delta_and_pct() {
        let current = compute_facts(&rows_from_ledger(&[record(
            "a", 1, -20_000, "x", Some(5814),
        )]));
        let prev = compute_facts(&rows_from_ledger(&[record(
            "b", 1, -10_000, "x", Some(5814),
        )]));

        let cmp = compare_totals(&current, &prev);
        assert_eq!(cmp.delta.real_spend_total_uah, 100.0);
        assert_eq!(cmp.pct_change.real_spend_total_uah, Some(100.0));
        // previous income was zero → sentinel
        assert_eq!(cmp.pct_change.income_total_uah, None);
    }

    #[test]
    fn compare_categories_covers_union_of_keys() {
        let current = BTreeMap::from([("Транспорт".to_string(), 200.0)]);
        let prev = BTreeMap::from([
            ("Транспорт".to_string(), 100.0),
            ("Кафе/Ресторани".to_string(), 50.0),
        ]);

        let out = compare_categories(&current, &prev);
        assert_eq!(out["Транспорт"].delta_uah, 100.0);
        assert_eq!(out["Транспорт"].pct_change, Some(100.0));
        assert_eq!(out["Кафе/Ресторани"].current_uah, 0.0);
        assert_eq!(out["Кафе/Ресторани"].delta_uah, -50.0);
        assert_eq!(out["Кафе/Ресторани"].pct_change, Some(-100.0));
    }

    #[test]
    fn yesterday_vs_baseline_matches_daily_median() {
        let now = 100 * SECONDS_PER_DAY + 10;
        let today0 = day_floor(now);
        let y0 = today0 - SECONDS_PER_DAY;

        let mut records = Vec::new();
        for i in 0..10 {
            records.push(record(
                &format!("h{i}"),
                today0 - (i + 2) * SECONDS_PER_DAY + 1,
                -1_000,
                "mcd",
                Some(5814),
            ));
        }
        records.push(record("y", y0 + 10, -3_000, "mcd", Some(5814)));

        let rows = rows_from_ledger(&records);
        let out = compare_yesterday_to_baseline(
            &rows,
            now,
            &BaselineFilter::Merchant("mcd".to_string()),
            28,
        );
        assert_eq!(out.yesterday_cents, 3_000);
        assert_eq!(out.baseline_median_cents, 1_000);
        assert_eq!(out.delta_cents, 2_000);
    }

    #[test]
    fn category_filter_selects_by_mcc() {
        let now = 100 * SECONDS_PER_DAY + 10;
        let today0 = day_floor(now);
        let y0 = today0 - SECONDS_PER_DAY;

        let records = vec![
            record("1", y0 + 5, -2_000, "some cafe", Some(5814)),
            record("2", y0 + 6, -9_000, "uber", Some(4121)),
        ];
        let rows = rows_from_ledger(&records);

        let out = compare_yesterday_to_baseline(
            &rows,
            now,
            &BaselineFilter::Category("Кафе/Ресторани".to_string()),
            28,
        );
        assert_eq!(out.yesterday_cents, 2_000);
        assert_eq!(out.baseline_median_cents, 0);
    }
}
