//! Long-term spending profile.
//!
//! Computed over a wide ledger slice (the bot uses 90 days) and stored per
//! user; the LLM prompt receives it next to the period facts so insights can
//! reference the user's "normal".

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use kopiyka_core::money::{minor_to_uah, round2};
use kopiyka_core::{TxKind, TxRecord, SECONDS_PER_DAY};

use crate::categories::category_from_mcc;
use crate::rows::rows_from_ledger;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopAmount {
    pub name: String,
    pub amount_uah: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub avg_check_uah: f64,
    pub total_real_spend_uah: f64,
    pub real_spend_tx_count: usize,
    pub top_categories_long_term: Vec<TopAmount>,
    pub top_merchants_long_term: Vec<TopAmount>,
}

const TOP_N: usize = 5;

fn top5(map: BTreeMap<String, i64>) -> Vec<TopAmount> {
    let mut items: Vec<_> = map.into_iter().collect();
    items.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    items
        .into_iter()
        .take(TOP_N)
        .map(|(name, v)| TopAmount {
            name,
            amount_uah: minor_to_uah(v),
        })
        .collect()
}

/// `None` when the slice is empty — a fresh user has no "normal" yet.
pub fn build_user_profile(records: &[TxRecord]) -> Option<UserProfile> {
    if records.is_empty() {
        return None;
    }
    let rows = rows_from_ledger(records);

    let mut total_minor = 0i64;
    let mut spend_count = 0usize;
    let mut by_category: BTreeMap<String, i64> = BTreeMap::new();
    let mut by_merchant: BTreeMap<String, i64> = BTreeMap::new();

    for row in &rows {
        if row.kind != TxKind::Spend {
            continue;
        }
        let amt = row.amount.abs();
        total_minor += amt;
        spend_count += 1;
        if let Some(cat) = category_from_mcc(row.mcc) {
            *by_category.entry(cat.to_string()).or_default() += amt;
        }
        *by_merchant.entry(row.description.clone()).or_default() += amt;
    }

    let total_uah = minor_to_uah(total_minor);
    let avg_check_uah = if spend_count > 0 {
        round2(total_uah / spend_count as f64)
    } else {
        0.0
    };

    Some(UserProfile {
        avg_check_uah,
        total_real_spend_uah: total_uah,
        real_spend_tx_count: spend_count,
        top_categories_long_term: top5(by_category),
        top_merchants_long_term: top5(by_merchant),
    })
}

// ── Daily baseline ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendBaseline {
    pub total_spend_cents: i64,
    pub daily_avg_cents: i64,
    pub daily_median_cents: i64,
}

/// Per-day spend statistics over a fixed window. Days without spending count
/// as zeros, so the median reflects how spiky the habit is.
pub fn compute_baseline(records: &[TxRecord], window_days: i64) -> SpendBaseline {
    let window_days = window_days.max(1);
    let rows = rows_from_ledger(records);

    let mut daily: BTreeMap<i64, i64> = BTreeMap::new();
    let mut total = 0i64;
    for row in &rows {
        if row.kind != TxKind::Spend {
            continue;
        }
        let cents = -row.amount;
        total += cents;
        *daily.entry(row.ts.div_euclid(SECONDS_PER_DAY)).or_default() += cents;
    }

    let mut values: Vec<i64> = daily.into_values().collect();
    while (values.len() as i64) < window_days {
        values.push(0);
    }
    values.sort_unstable();

    let mid = values.len() / 2;
    let median = if values.len() % 2 == 1 {
        values[mid]
    } else {
        (values[mid - 1] + values[mid]) / 2
    };

    SpendBaseline {
        total_spend_cents: total,
        daily_avg_cents: total / window_days,
        daily_median_cents: median,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn baseline_counts_zero_days() {
        let records = vec![
            record("1", SECONDS_PER_DAY + 10, -1_000, "ATB", Some(5411)),
            record("2", SECONDS_PER_DAY + 20, -2_000, "ATB", Some(5411)),
            record("3", 2 * SECONDS_PER_DAY + 10, -500, "ATB", Some(5411)),
            record("4", 2 * SECONDS_PER_DAY + 20, 10_000, "Top up", None),
        ];
        let b = compute_baseline(&records, 7);
        assert_eq!(b.total_spend_cents, 3_500);
        assert_eq!(b.daily_avg_cents, 500);
        assert_eq!(b.daily_median_cents, 0);
    }

    #[test]
    fn profile_over_mixed_rows() {
        let records = vec![
            record("1", 10, -15_000, "McDonalds Kyiv", Some(5814)),
            record("2", 20, -5_000, "ATB", Some(5411)),
            record("3", 30, 100_000, "Salary", None),
            record("4", 40, -10_000, "Переказ", Some(4829)),
        ];
        let p = build_user_profile(&records).unwrap();
        assert_eq!(p.real_spend_tx_count, 2);
        assert_eq!(p.total_real_spend_uah, 200.0);
        assert_eq!(p.avg_check_uah, 100.0);
        assert_eq!(p.top_merchants_long_term.len(), 2);
        assert_eq!(p.top_merchants_long_term[0].name, "McDonalds Kyiv");
    }

    #[test]
    fn empty_slice_has_no_profile() {
        assert!(build_user_profile(&[]).is_none());
    }
}
