//! Classified row — a ledger record plus its derived kind.

use kopiyka_core::{TxKind, TxRecord};

use crate::classify::classify;

/// A transaction with its classification attached. Never persisted; kind is
/// always recomputed from the raw record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRow {
    pub account_id: String,
    pub ts: i64,
    pub amount: i64,
    pub description: String,
    pub mcc: Option<u16>,
    pub kind: TxKind,
}

pub fn rows_from_ledger(records: &[TxRecord]) -> Vec<TxRow> {
    records
        .iter()
        .map(|r| {
            let description = r.description.trim().to_string();
            let kind = classify(r.amount, r.mcc, &description);
            TxRow {
                account_id: r.account_id.clone(),
                ts: r.time,
                amount: r.amount,
                description,
                mcc: r.mcc,
                kind,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_carry_classification() {
        let records = vec![
            TxRecord {
                id: "1".into(),
                time: 10,
                account_id: "acc".into(),
                amount: -5000,
                description: " ATB ".into(),
                mcc: Some(5411),
                currency_code: Some(980),
            },
            TxRecord {
                id: "2".into(),
                time: 20,
                account_id: "acc".into(),
                amount: 10_000,
                description: "Поповнення".into(),
                mcc: None,
                currency_code: Some(980),
            },
        ];
        let rows = rows_from_ledger(&records);
        assert_eq!(rows[0].kind, TxKind::Spend);
        assert_eq!(rows[0].description, "ATB");
        assert_eq!(rows[1].kind, TxKind::Income);
    }
}
