//! Last-day spending anomalies.
//!
//! Two passes over the same rows — merchant labels and category labels — each
//! comparing the last day against a median/MAD baseline from the lookback
//! window. Category findings are prefixed so the renderer can tell the axes
//! apart. The merged result keeps the 5 largest exceedances.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use kopiyka_core::{TxRecord, SECONDS_PER_DAY};

use crate::categories::{category_from_mcc, CATEGORY_OTHER};
use crate::classify::classify;
use crate::text::{normalize_merchant, UNKNOWN_LABEL};

pub const CATEGORY_LABEL_PREFIX: &str = "категорія: ";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyItem {
    pub label: String,
    pub last_day_cents: i64,
    pub baseline_median_cents: i64,
    /// "spike_vs_median" or "first_time_large".
    pub reason: String,
}

#[derive(Debug, Clone, Copy)]
pub struct AnomalyConfig {
    pub lookback_days: i64,
    pub spike_mult: f64,
    pub min_threshold_cents: i64,
    pub abs_delta_min_cents: i64,
    pub min_hist_days: usize,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            lookback_days: 28,
            spike_mult: 2.0,
            min_threshold_cents: 20_000,
            abs_delta_min_cents: 15_000,
            min_hist_days: 3,
        }
    }
}

const TOP_N: usize = 5;

fn median_i64(mut values: Vec<i64>) -> i64 {
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

fn mad_i64(values: &[i64], center: i64) -> i64 {
    median_i64(values.iter().map(|v| (v - center).abs()).collect())
}

fn detect_for_label<F>(
    records: &[TxRecord],
    now_ts: i64,
    label_fn: F,
    cfg: &AnomalyConfig,
) -> Vec<AnomalyItem>
where
    F: Fn(&TxRecord) -> String,
{
    let lookback_days = cfg.lookback_days.clamp(7, 90);
    let last_day_start = now_ts - SECONDS_PER_DAY;
    let hist_start = now_ts - lookback_days * SECONDS_PER_DAY;

    let mut daily_by: BTreeMap<String, BTreeMap<i64, i64>> = BTreeMap::new();
    let mut last_day_by: BTreeMap<String, i64> = BTreeMap::new();
    let mut seen_before: BTreeSet<String> = BTreeSet::new();

    for r in records {
        if classify(r.amount, r.mcc, &r.description) != kopiyka_core::TxKind::Spend {
            continue;
        }
        let label = label_fn(r);
        if label == UNKNOWN_LABEL {
            continue;
        }
        let cents = -r.amount;

        if r.time >= hist_start && r.time < last_day_start {
            seen_before.insert(label.clone());
        }
        if r.time >= last_day_start && r.time < now_ts {
            *last_day_by.entry(label.clone()).or_default() += cents;
        }
        if r.time >= hist_start && r.time < now_ts {
            let day = r.time.div_euclid(SECONDS_PER_DAY);
            *daily_by.entry(label).or_default().entry(day).or_default() += cents;
        }
    }

    let mut out = Vec::new();

    for (label, last_cents) in &last_day_by {
        let hist_vals: Vec<i64> = daily_by
            .get(label)
            .map(|days| {
                days.iter()
                    .filter(|(day, _)| **day * SECONDS_PER_DAY < last_day_start)
                    .map(|(_, v)| *v)
                    .collect()
            })
            .unwrap_or_default();
        let hist_days = hist_vals.len();

        let base_med = median_i64(hist_vals.clone());
        let base_mad = mad_i64(&hist_vals, base_med);

        if !seen_before.contains(label) && *last_cents >= cfg.min_threshold_cents {
            out.push(AnomalyItem {
                label: label.clone(),
                last_day_cents: *last_cents,
                baseline_median_cents: base_med,
                reason: "first_time_large".to_string(),
            });
            continue;
        }

        if hist_days < cfg.min_hist_days || base_med <= 0 {
            continue;
        }

        let dynamic_floor = base_med
            + cfg
                .abs_delta_min_cents
                .max((cfg.spike_mult * base_mad as f64) as i64);
        let threshold = cfg
            .min_threshold_cents
            .max((cfg.spike_mult * base_med as f64) as i64)
            .max(dynamic_floor);

        if *last_cents >= threshold {
            out.push(AnomalyItem {
                label: label.clone(),
                last_day_cents: *last_cents,
                baseline_median_cents: base_med,
                reason: "spike_vs_median".to_string(),
            });
        }
    }

    out.sort_by_key(|x| -(x.last_day_cents - x.baseline_median_cents));
    out
}

pub fn detect_anomalies(records: &[TxRecord], now_ts: i64, cfg: &AnomalyConfig) -> Vec<AnomalyItem> {
    let merchants = detect_for_label(
        records,
        now_ts,
        |r| normalize_merchant(&r.description),
        cfg,
    );

    let categories = detect_for_label(
        records,
        now_ts,
        |r| {
            category_from_mcc(r.mcc)
                .unwrap_or(CATEGORY_OTHER)
                .to_string()
        },
        cfg,
    );

    let mut merged: Vec<AnomalyItem> = merchants;
    merged.extend(categories.into_iter().map(|x| AnomalyItem {
        label: format!("{CATEGORY_LABEL_PREFIX}{}", x.label),
        ..x
    }));

    merged.sort_by_key(|x| -(x.last_day_cents - x.baseline_median_cents));
    merged.truncate(TOP_N);
    merged
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
    fn detects_spike_and_first_time_large() {
        let now = 100 * SECONDS_PER_DAY;

        let mut records = Vec::new();
        for d in (1..=10).rev() {
            records.push(record(
                &format!("h{d}"),
                now - (d + 1) * SECONDS_PER_DAY + 10,
                -10_000,
                "mcd",
                5814,
            ));
        }
        records.push(record("y1", now - SECONDS_PER_DAY + 10, -30_000, "mcd", 5814));
        records.push(record(
            "y2",
            now - SECONDS_PER_DAY + 20,
            -50_000,
            "new_merchant",
            5814,
        ));

        let out = detect_anomalies(&records, now, &AnomalyConfig::default());

        assert!(out
            .iter()
            .any(|x| x.label.starts_with("mcd") && x.reason == "spike_vs_median"));
        assert!(out
            .iter()
            .any(|x| x.label.starts_with("new_merchant") && x.reason == "first_time_large"));
    }

    #[test]
    fn detects_category_spike_across_merchants() {
        let now = 200 * SECONDS_PER_DAY;

        let mut records = Vec::new();
        for d in (1..=10).rev() {
            records.push(record(
                &format!("h{d}"),
                now - (d + 1) * SECONDS_PER_DAY + 10,
                -12_000,
                &format!("merchant_{d}"),
                5814,
            ));
        }
        records.push(record("y", now - SECONDS_PER_DAY + 10, -60_000, "one_off", 5814));

        let out = detect_anomalies(&records, now, &AnomalyConfig::default());
        assert!(out
            .iter()
            .any(|x| x.label.starts_with(CATEGORY_LABEL_PREFIX) && x.label.contains("Кафе/Ресторани")));
    }

    #[test]
    fn spike_threshold_boundaries() {
        // baseline median 1000 → spike at 6000 flags, 1800 does not
        let now = 100 * SECONDS_PER_DAY;
        let mut base = Vec::new();
        for d in (1..=10).rev() {
            base.push(record(
                &format!("h{d}"),
                now - (d + 1) * SECONDS_PER_DAY + 10,
                -1_000,
                "atb",
                5411,
            ));
        }
        let cfg = AnomalyConfig {
            min_threshold_cents: 20_000,
            abs_delta_min_cents: 0,
            ..Default::default()
        };

        let mut spiked = base.clone();
        spiked.push(record("y", now - SECONDS_PER_DAY + 10, -6_000, "atb", 5411));
        // 6000 < min_threshold 20000 → not flagged with default floor
        assert!(detect_anomalies(&spiked, now, &cfg).is_empty());

        let low_floor = AnomalyConfig {
            min_threshold_cents: 2_000,
            abs_delta_min_cents: 0,
            ..Default::default()
        };
        let out = detect_anomalies(&spiked, now, &low_floor);
        assert!(out.iter().any(|x| x.label == "atb" && x.reason == "spike_vs_median"));

        let mut mild = base;
        mild.push(record("y", now - SECONDS_PER_DAY + 10, -1_800, "atb", 5411));
        assert!(detect_anomalies(&mild, now, &low_floor).is_empty());
    }

    #[test]
    fn result_is_capped_at_five() {
        let now = 300 * SECONDS_PER_DAY;
        let mut records = Vec::new();
        // ten distinct first-time-large merchants across distinct categories
        for i in 0..10 {
            records.push(record(
                &format!("y{i}"),
                now - SECONDS_PER_DAY + 10 + i,
                -90_000,
                &format!("fresh_{i}"),
                5814,
            ));
        }
        let out = detect_anomalies(&records, now, &AnomalyConfig::default());
        assert_eq!(out.len(), 5);
    }
}
