//! What-if savings projections.
//!
//! Two generators feed one ranked list: fixed keyword buckets (taxi,
//! delivery, cafes) and high-share named categories. Period spend is
//! projected to a 30-day month; each bucket carries reduction scenarios with
//! their monthly savings. Concentrated buckets (≥ 30% of real spend) get the
//! deeper 15/25% scenarios alongside the base 10/20% pair so the standard
//! scenarios stay visible.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use kopiyka_core::money::round2;
use kopiyka_core::{TxKind, SECONDS_PER_DAY};

use crate::categories::category_from_mcc;
use crate::rows::TxRow;
use crate::text::normalize_loose;

const TAXI_KEYWORDS: [&str; 6] = ["uber", "bolt", "uklon", "taxi", "такси", "таксі"];
const DELIVERY_KEYWORDS: [&str; 7] = [
    "glovo",
    "wolt",
    "raketa",
    "bolt food",
    "uber eats",
    "ubereats",
    "delivery",
];
const CAFES_CATEGORY: &str = "Кафе/Ресторани";

/// Monthly-spend floors below which a keyword bucket is noise.
const TAXI_FLOOR_UAH: f64 = 400.0;
const DELIVERY_FLOOR_UAH: f64 = 350.0;
const CAFES_FLOOR_UAH: f64 = 600.0;

/// Bucket share of real spend at which the deeper scenarios kick in.
const CONCENTRATED_SHARE_PCT: f64 = 30.0;

/// Minimum monthly savings for a keyword-bucket scenario to be worth showing.
const MIN_SCENARIO_SAVINGS_UAH: f64 = 100.0;

/// Category-generator gates.
const CATEGORY_MIN_SHARE_PCT: f64 = 15.0;
const CATEGORY_MIN_ACTIVE_DAYS: usize = 4;
const CATEGORY_MIN_MONTHLY_UAH: f64 = 800.0;
const CATEGORY_MIN_BEST_SAVINGS_UAH: f64 = 150.0;

const MAX_SUGGESTIONS: usize = 3;

#[derive(Debug, Clone, Copy)]
pub enum Reduction {
    Pct(u32),
    AmountUah(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SavingsProjection {
    pub monthly_savings_uah: f64,
    pub projected_monthly_uah: f64,
}

/// Project the effect of a reduction on a monthly spend figure.
pub fn project_savings(monthly_spend_uah: f64, reduction: Reduction) -> SavingsProjection {
    let savings = match reduction {
        Reduction::Pct(pct) => monthly_spend_uah * pct as f64 / 100.0,
        Reduction::AmountUah(amount) => amount.min(monthly_spend_uah),
    };
    SavingsProjection {
        monthly_savings_uah: round2(savings),
        projected_monthly_uah: round2(monthly_spend_uah - savings),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhatIfScenario {
    pub reduction_pct: u32,
    pub monthly_savings_uah: f64,
    pub projected_monthly_uah: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhatIfSuggestion {
    pub key: String,
    pub title: String,
    pub period_spend_uah: f64,
    pub monthly_spend_uah: f64,
    pub share_pct: f64,
    pub scenarios: Vec<WhatIfScenario>,
}

impl WhatIfSuggestion {
    fn best_savings(&self) -> f64 {
        self.scenarios
            .iter()
            .map(|s| s.monthly_savings_uah)
            .fold(0.0, f64::max)
    }
}

fn project_monthly(period_spend_uah: f64, period_days: i64) -> f64 {
    if period_days <= 0 {
        return 0.0;
    }
    round2(period_spend_uah * (30.0 / period_days as f64))
}

fn scenario_pcts(share_pct: f64) -> Vec<u32> {
    if share_pct >= CONCENTRATED_SHARE_PCT {
        vec![10, 15, 20, 25]
    } else {
        vec![10, 20]
    }
}

fn build_scenarios(monthly_spend_uah: f64, share_pct: f64, min_savings: f64) -> Vec<WhatIfScenario> {
    scenario_pcts(share_pct)
        .into_iter()
        .map(|pct| {
            let p = project_savings(monthly_spend_uah, Reduction::Pct(pct));
            WhatIfScenario {
                reduction_pct: pct,
                monthly_savings_uah: p.monthly_savings_uah,
                projected_monthly_uah: p.projected_monthly_uah,
            }
        })
        .filter(|s| s.monthly_savings_uah >= min_savings)
        .collect()
}

fn sum_spend_uah<F: Fn(&TxRow) -> bool>(rows: &[TxRow], pred: F) -> f64 {
    let minor: i64 = rows
        .iter()
        .filter(|r| r.kind == TxKind::Spend && pred(r))
        .map(|r| r.amount.abs())
        .sum();
    round2(minor as f64 / 100.0)
}

pub fn build_whatif_suggestions(rows: &[TxRow], period_days: i64) -> Vec<WhatIfSuggestion> {
    if period_days <= 0 {
        return Vec::new();
    }

    let total_spend_uah = sum_spend_uah(rows, |_| true);
    let share_of_total = |spend: f64| -> f64 {
        if total_spend_uah <= 0.0 {
            0.0
        } else {
            round2(spend / total_spend_uah * 100.0)
        }
    };

    let mut out: Vec<WhatIfSuggestion> = Vec::new();

    // ── Keyword buckets ──────────────────────────────────────────────────────
    let keyword_buckets: [(&str, &str, f64, f64); 3] = [
        (
            "taxi",
            "Таксі",
            sum_spend_uah(rows, |r| {
                let d = normalize_loose(&r.description);
                TAXI_KEYWORDS.iter().any(|k| d.contains(k))
            }),
            TAXI_FLOOR_UAH,
        ),
        (
            "delivery",
            "Доставка",
            sum_spend_uah(rows, |r| {
                let d = normalize_loose(&r.description);
                DELIVERY_KEYWORDS.iter().any(|k| d.contains(k))
            }),
            DELIVERY_FLOOR_UAH,
        ),
        (
            "cafes",
            CAFES_CATEGORY,
            sum_spend_uah(rows, |r| {
                category_from_mcc(r.mcc).unwrap_or("Інше") == CAFES_CATEGORY
            }),
            CAFES_FLOOR_UAH,
        ),
    ];

    for (key, title, period_spend, floor) in keyword_buckets {
        let monthly = project_monthly(period_spend, period_days);
        if monthly < floor {
            continue;
        }
        let share = share_of_total(period_spend);
        let scenarios = build_scenarios(monthly, share, MIN_SCENARIO_SAVINGS_UAH);
        if scenarios.is_empty() {
            continue;
        }
        out.push(WhatIfSuggestion {
            key: key.to_string(),
            title: title.to_string(),
            period_spend_uah: period_spend,
            monthly_spend_uah: monthly,
            share_pct: share,
            scenarios,
        });
    }

    // ── Category buckets ─────────────────────────────────────────────────────
    let mut category_spend: BTreeMap<&'static str, i64> = BTreeMap::new();
    let mut category_days: BTreeMap<&'static str, BTreeSet<i64>> = BTreeMap::new();
    for r in rows {
        if r.kind != TxKind::Spend {
            continue;
        }
        if let Some(cat) = category_from_mcc(r.mcc) {
            *category_spend.entry(cat).or_default() += r.amount.abs();
            category_days
                .entry(cat)
                .or_default()
                .insert(r.ts.div_euclid(SECONDS_PER_DAY));
        }
    }

    let already_titled: BTreeSet<String> = out.iter().map(|s| s.title.clone()).collect();

    for (cat, minor) in category_spend {
        if already_titled.contains(cat) {
            continue;
        }
        let period_spend = round2(minor as f64 / 100.0);
        let share = share_of_total(period_spend);
        let active_days = category_days.get(cat).map(|d| d.len()).unwrap_or(0);
        let monthly = project_monthly(period_spend, period_days);

        if share < CATEGORY_MIN_SHARE_PCT
            || active_days < CATEGORY_MIN_ACTIVE_DAYS
            || monthly < CATEGORY_MIN_MONTHLY_UAH
        {
            continue;
        }

        let suggestion = WhatIfSuggestion {
            key: format!("category:{cat}"),
            title: cat.to_string(),
            period_spend_uah: period_spend,
            monthly_spend_uah: monthly,
            share_pct: share,
            scenarios: build_scenarios(monthly, share, 0.0),
        };
        if suggestion.best_savings() < CATEGORY_MIN_BEST_SAVINGS_UAH {
            continue;
        }
        out.push(suggestion);
    }

    out.sort_by(|a, b| {
        b.best_savings()
            .partial_cmp(&a.best_savings())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.key.cmp(&b.key))
    });
    out.truncate(MAX_SUGGESTIONS);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spend(ts: i64, amount: i64, desc: &str, mcc: u16) -> TxRow {
        TxRow {
            account_id: "a".to_string(),
            ts,
            amount,
            description: desc.to_string(),
            mcc: Some(mcc),
            kind: TxKind::Spend,
        }
    }

    #[test]
    fn project_savings_percent() {
        let p = project_savings(1000.0, Reduction::Pct(20));
        assert_eq!(p.monthly_savings_uah, 200.0);
        assert_eq!(p.projected_monthly_uah, 800.0);
    }

    #[test]
    fn project_savings_fixed_amount() {
        let p = project_savings(1000.0, Reduction::AmountUah(300.0));
        assert_eq!(p.monthly_savings_uah, 300.0);
        assert_eq!(p.projected_monthly_uah, 700.0);
    }

    #[test]
    fn detects_taxi_bucket_with_base_scenarios() {
        let rows = vec![
            spend(10, -20_000, "Uber trip", 4121),
            spend(20, -30_000, "Bolt ride", 4121),
            spend(30, -15_000, "Grocery", 5411),
        ];

        let out = build_whatif_suggestions(&rows, 7);
        let taxi = out.iter().find(|x| x.key == "taxi").expect("taxi bucket");

        assert!(taxi.monthly_spend_uah > 0.0);
        assert!(taxi.scenarios.len() >= 2);
        assert!(taxi.scenarios.iter().all(|s| s.monthly_savings_uah > 0.0));
        assert!(taxi.scenarios.iter().any(|s| s.reduction_pct == 20));
    }

    #[test]
    fn small_buckets_are_dropped() {
        // a single cheap taxi ride projects under the 400 UAH/month floor
        let rows = vec![spend(10, -5_000, "Uklon", 4121)];
        let out = build_whatif_suggestions(&rows, 30);
        assert!(out.iter().all(|x| x.key != "taxi"));
    }

    #[test]
    fn high_share_category_is_suggested() {
        let mut rows = Vec::new();
        for i in 0..10 {
            rows.push(spend((i + 1) * SECONDS_PER_DAY, -40_000, "Restaurant", 5812));
        }
        rows.push(spend(15 * SECONDS_PER_DAY, -10_000, "Other", 5411));

        let out = build_whatif_suggestions(&rows, 14);
        assert!(!out.is_empty());
        let top = &out[0];
        assert!(top.scenarios.len() >= 2);
        assert!(top.scenarios[0].monthly_savings_uah > 0.0);
    }

    #[test]
    fn category_needs_enough_active_days() {
        // large spend but concentrated in 2 days → below the activity gate
        let rows = vec![
            spend(SECONDS_PER_DAY, -300_000, "Cinema", 7832),
            spend(2 * SECONDS_PER_DAY, -300_000, "Cinema", 7832),
        ];
        let out = build_whatif_suggestions(&rows, 14);
        assert!(out.iter().all(|x| x.key != "category:Розваги/Ігри"));
    }

    #[test]
    fn output_is_capped_and_sorted_by_best_savings() {
        let mut rows = Vec::new();
        for i in 0..10i64 {
            rows.push(spend((i + 1) * SECONDS_PER_DAY, -50_000, "Uber", 4121));
            rows.push(spend((i + 1) * SECONDS_PER_DAY, -80_000, "Glovo", 5812));
            rows.push(spend((i + 1) * SECONDS_PER_DAY, -60_000, "Pharmacy", 5912));
            rows.push(spend((i + 1) * SECONDS_PER_DAY, -90_000, "Zara", 5651));
        }
        let out = build_whatif_suggestions(&rows, 30);
        assert!(out.len() <= 3);
        for pair in out.windows(2) {
            assert!(pair[0].best_savings() >= pair[1].best_savings());
        }
    }

    #[test]
    fn empty_period_yields_nothing() {
        assert!(build_whatif_suggestions(&[], 7).is_empty());
        assert!(build_whatif_suggestions(&[spend(1, -1000, "Uber", 4121)], 0).is_empty());
    }
}
