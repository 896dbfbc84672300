//! The facts engine.
//!
//! `compute_facts` is a pure fold over classified rows. All bucket maps are
//! `BTreeMap` and every top-N list breaks amount ties by label, so the same
//! rows always serialize to the same bytes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use kopiyka_core::money::{minor_to_uah, share_pct};
use kopiyka_core::TxKind;

use crate::anomalies::AnomalyItem;
use crate::categories::category_from_mcc;
use crate::report::ComparisonBlock;
use crate::rows::TxRow;
use crate::trends::TrendsResult;
use crate::whatif::WhatIfSuggestion;

const TOP_N: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub income_total_uah: f64,
    /// All cash out: real spend plus outgoing transfers.
    pub spend_total_uah: f64,
    pub transfer_in_total_uah: f64,
    pub transfer_out_total_uah: f64,
    /// Spend only, transfers excluded.
    pub real_spend_total_uah: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountFacts {
    pub count: usize,
    pub income_uah: f64,
    pub spend_uah: f64,
    pub transfer_in_uah: f64,
    pub transfer_out_uah: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryAmount {
    pub category: String,
    pub amount_uah: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerchantAmount {
    pub merchant: String,
    pub amount_uah: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MccAmount {
    pub mcc: String,
    pub amount_uah: f64,
}

/// The serialized facts envelope. Field names are the wire contract — the
/// report cache, the renderer and the LLM prompt all read these keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facts {
    pub transactions_count: usize,
    pub totals: Totals,
    pub category_method: String,
    pub categories_real_spend: BTreeMap<String, f64>,
    pub category_shares_real_spend: BTreeMap<String, f64>,
    pub top_merchants_shares_real_spend: BTreeMap<String, f64>,
    pub top_categories_named_real_spend: Vec<CategoryAmount>,
    pub uncategorized_real_spend_total_uah: f64,
    pub top_merchants_real_spend: Vec<MerchantAmount>,
    pub top_categories_real_spend: Vec<MccAmount>,
    pub by_account: BTreeMap<String, AccountFacts>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub whatif_suggestions: Option<Vec<WhatIfSuggestion>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub trends: Option<TrendsResult>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub anomalies: Option<Vec<AnomalyItem>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub comparison: Option<ComparisonBlock>,
}

/// Descending by amount, ties by label ascending.
fn top_n(map: &BTreeMap<String, i64>, n: usize) -> Vec<(String, i64)> {
    let mut items: Vec<_> = map.iter().map(|(k, v)| (k.clone(), *v)).collect();
    items.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    items.truncate(n);
    items
}

pub fn compute_facts(rows: &[TxRow]) -> Facts {
    let mut spend_total = 0i64;
    let mut income_total = 0i64;
    let mut transfer_out_total = 0i64;
    let mut transfer_in_total = 0i64;

    let mut by_account_minor: BTreeMap<String, (usize, i64, i64, i64, i64)> = BTreeMap::new();
    let mut merchant_spend: BTreeMap<String, i64> = BTreeMap::new();
    let mut mcc_spend: BTreeMap<String, i64> = BTreeMap::new();
    let mut category_spend: BTreeMap<String, i64> = BTreeMap::new();
    let mut uncategorized_spend = 0i64;

    for row in rows {
        let acc = by_account_minor.entry(row.account_id.clone()).or_default();
        acc.0 += 1;

        match row.kind {
            TxKind::Spend => {
                let amt = row.amount.abs();
                spend_total += amt;
                acc.2 += amt;

                *merchant_spend.entry(row.description.clone()).or_default() += amt;
                if let Some(mcc) = row.mcc {
                    *mcc_spend.entry(mcc.to_string()).or_default() += amt;
                }
                match category_from_mcc(row.mcc) {
                    Some(cat) => *category_spend.entry(cat.to_string()).or_default() += amt,
                    None => uncategorized_spend += amt,
                }
            }
            TxKind::Income => {
                income_total += row.amount;
                acc.1 += row.amount;
            }
            TxKind::TransferOut => {
                let amt = row.amount.abs();
                transfer_out_total += amt;
                acc.4 += amt;
            }
            TxKind::TransferIn => {
                transfer_in_total += row.amount;
                acc.3 += row.amount;
            }
        }
    }

    let cash_out_total = spend_total + transfer_out_total;
    let real_spend_total_uah = minor_to_uah(spend_total);

    let categories_uah: BTreeMap<String, f64> = category_spend
        .iter()
        .map(|(k, v)| (k.clone(), minor_to_uah(*v)))
        .collect();
    let category_shares: BTreeMap<String, f64> = categories_uah
        .iter()
        .map(|(k, v)| (k.clone(), share_pct(*v, real_spend_total_uah)))
        .collect();

    let top_merchants = top_n(&merchant_spend, TOP_N);
    let top_merchant_shares: BTreeMap<String, f64> = top_merchants
        .iter()
        .map(|(k, v)| (k.clone(), share_pct(minor_to_uah(*v), real_spend_total_uah)))
        .collect();

    Facts {
        transactions_count: rows.len(),
        totals: Totals {
            income_total_uah: minor_to_uah(income_total),
            spend_total_uah: minor_to_uah(cash_out_total),
            transfer_in_total_uah: minor_to_uah(transfer_in_total),
            transfer_out_total_uah: minor_to_uah(transfer_out_total),
            real_spend_total_uah,
        },
        category_method: "mcc".to_string(),
        categories_real_spend: categories_uah,
        category_shares_real_spend: category_shares,
        top_merchants_shares_real_spend: top_merchant_shares,
        top_categories_named_real_spend: top_n(&category_spend, TOP_N)
            .into_iter()
            .map(|(category, v)| CategoryAmount {
                category,
                amount_uah: minor_to_uah(v),
            })
            .collect(),
        uncategorized_real_spend_total_uah: minor_to_uah(uncategorized_spend),
        top_merchants_real_spend: top_merchants
            .into_iter()
            .map(|(merchant, v)| MerchantAmount {
                merchant,
                amount_uah: minor_to_uah(v),
            })
            .collect(),
        top_categories_real_spend: top_n(&mcc_spend, TOP_N)
            .into_iter()
            .map(|(mcc, v)| MccAmount {
                mcc,
                amount_uah: minor_to_uah(v),
            })
            .collect(),
        by_account: by_account_minor
            .into_iter()
            .map(|(k, (count, income, spend, tin, tout))| {
                (
                    k,
                    AccountFacts {
                        count,
                        income_uah: minor_to_uah(income),
                        spend_uah: minor_to_uah(spend),
                        transfer_in_uah: minor_to_uah(tin),
                        transfer_out_uah: minor_to_uah(tout),
                    },
                )
            })
            .collect(),
        whatif_suggestions: None,
        trends: None,
        anomalies: None,
        comparison: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kopiyka_core::TxKind;

    fn row(account: &str, ts: i64, amount: i64, desc: &str, mcc: Option<u16>, kind: TxKind) -> TxRow {
        TxRow {
            account_id: account.to_string(),
            ts,
            amount,
            description: desc.to_string(),
            mcc,
            kind,
        }
    }

    fn sample_rows() -> Vec<TxRow> {
        vec![
            row("acc1", 1, -10_000, "McDonalds", Some(5814), TxKind::Spend),
            row("acc1", 2, -5_000, "Cafe", Some(5812), TxKind::Spend),
            row("acc2", 3, -20_000, "Uber", Some(4121), TxKind::Spend),
            row("acc1", 4, 30_000, "Salary", None, TxKind::Income),
            row("acc1", 5, -7_000, "Переказ", Some(4829), TxKind::TransferOut),
        ]
    }

    #[test]
    fn totals_split_real_spend_from_cash_out() {
        let facts = compute_facts(&sample_rows());
        assert_eq!(facts.transactions_count, 5);
        assert_eq!(facts.totals.income_total_uah, 300.0);
        assert_eq!(facts.totals.real_spend_total_uah, 350.0);
        assert_eq!(facts.totals.spend_total_uah, 420.0);
        assert_eq!(facts.totals.transfer_out_total_uah, 70.0);
        assert_eq!(facts.totals.transfer_in_total_uah, 0.0);
    }

    #[test]
    fn categories_and_uncategorized_buckets() {
        let mut rows = sample_rows();
        rows.push(row("acc1", 6, -3_000, "NoMcc", None, TxKind::Spend));
        let facts = compute_facts(&rows);

        assert_eq!(facts.categories_real_spend["Кафе/Ресторани"], 150.0);
        assert_eq!(facts.categories_real_spend["Транспорт"], 200.0);
        assert_eq!(facts.uncategorized_real_spend_total_uah, 30.0);
    }

    #[test]
    fn shares_sum_to_at_most_100() {
        let facts = compute_facts(&sample_rows());
        let total: f64 = facts.category_shares_real_spend.values().sum();
        assert!(total > 0.0 && total <= 100.1);

        let m = &facts.top_merchants_shares_real_spend;
        assert!(m["McDonalds"] > 0.0 && m["McDonalds"] <= 100.0);
    }

    #[test]
    fn tops_order_by_amount_then_label() {
        let rows = vec![
            row("a", 1, -5_000, "beta", Some(5814), TxKind::Spend),
            row("a", 2, -5_000, "alpha", Some(5814), TxKind::Spend),
            row("a", 3, -9_000, "gamma", Some(5814), TxKind::Spend),
        ];
        let facts = compute_facts(&rows);
        let names: Vec<_> = facts
            .top_merchants_real_spend
            .iter()
            .map(|m| m.merchant.as_str())
            .collect();
        assert_eq!(names, vec!["gamma", "alpha", "beta"]);
    }

    #[test]
    fn per_account_breakdown() {
        let facts = compute_facts(&sample_rows());
        let acc1 = &facts.by_account["acc1"];
        assert_eq!(acc1.count, 4);
        assert_eq!(acc1.income_uah, 300.0);
        assert_eq!(acc1.spend_uah, 150.0);
        assert_eq!(acc1.transfer_out_uah, 70.0);
        assert_eq!(facts.by_account["acc2"].spend_uah, 200.0);
    }

    #[test]
    fn facts_are_deterministic() {
        let a = serde_json::to_string(&compute_facts(&sample_rows())).unwrap();
        let b = serde_json::to_string(&compute_facts(&sample_rows())).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn facts_round_trip_through_json() {
        let facts = compute_facts(&sample_rows());
        let json = serde_json::to_string(&facts).unwrap();
        let back: Facts = serde_json::from_str(&json).unwrap();
        assert_eq!(facts, back);
    }
}
