//! Pure analytics over classified ledger rows.
//!
//! Nothing in this crate performs I/O or looks at the wall clock — every
//! function is a deterministic map from rows (plus an explicit `now_ts`) to
//! facts, so recomputing the same window always yields byte-identical JSON.

pub mod anomalies;
pub mod categories;
pub mod classify;
pub mod compare;
pub mod compute;
pub mod profile;
pub mod report;
pub mod rows;
pub mod text;
pub mod trends;
pub mod whatif;

pub use anomalies::{detect_anomalies, AnomalyConfig, AnomalyItem};
pub use categories::{category_from_mcc, CATEGORY_OTHER};
pub use classify::{classify, is_transfer};
pub use compare::{
    compare_categories, compare_totals, compare_yesterday_to_baseline, pct_change,
    BaselineComparison, BaselineFilter, CategoryComparison, TotalsComparison,
};
pub use compute::{compute_facts, AccountFacts, Facts, Totals};
pub use profile::{build_user_profile, compute_baseline, SpendBaseline, UserProfile};
pub use report::{
    build_period_report, build_period_windows, facts_for_cache, ComparisonBlock, PeriodReport,
};
pub use rows::{rows_from_ledger, TxRow};
pub use trends::{compute_trends, TrendItem, TrendsResult};
pub use whatif::{build_whatif_suggestions, project_savings, Reduction, WhatIfSuggestion};
