//! Upstream wire shapes. Field names mirror the bank's JSON; extra fields the
//! upstream may add are ignored.

use serde::{Deserialize, Serialize};

use kopiyka_core::TxRecord;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    /// Balance in signed minor units.
    pub balance: i64,
    #[serde(rename = "creditLimit", default)]
    pub credit_limit: i64,
    #[serde(rename = "currencyCode")]
    pub currency_code: u16,
    #[serde(rename = "cashbackType", default)]
    pub cashback_type: Option<String>,
    #[serde(rename = "type", default)]
    pub account_type: Option<String>,
    #[serde(default)]
    pub iban: Option<String>,
    #[serde(rename = "maskedPan", default)]
    pub masked_pan: Vec<String>,
}

impl Account {
    /// Human-readable card label: masked PANs joined, or the bare id.
    pub fn display_label(&self) -> String {
        if self.masked_pan.is_empty() {
            self.id.clone()
        } else {
            self.masked_pan.join(" / ")
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub accounts: Vec<Account>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementItem {
    pub id: String,
    pub time: i64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub mcc: Option<u16>,
    /// Signed minor units; negative = money out.
    pub amount: i64,
    #[serde(rename = "currencyCode", default)]
    pub currency_code: Option<u16>,
}

impl StatementItem {
    /// Normalize into the ledger row shape.
    pub fn into_record(self, account_id: &str) -> TxRecord {
        TxRecord {
            id: self.id,
            time: self.time,
            account_id: account_id.to_string(),
            amount: self.amount,
            description: self.description.unwrap_or_default().trim().to_string(),
            mcc: self.mcc,
            currency_code: self.currency_code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statement_item_parses_wire_json_and_ignores_extras() {
        let json = r#"{
            "id": "a1", "time": 1700000000, "amount": -12345,
            "description": " ATB market ", "mcc": 5411, "currencyCode": 980,
            "operationAmount": -12345, "hold": true, "balance": 99999
        }"#;
        let item: StatementItem = serde_json::from_str(json).unwrap();
        let record = item.into_record("acc");
        assert_eq!(record.description, "ATB market");
        assert_eq!(record.mcc, Some(5411));
        assert_eq!(record.account_id, "acc");
    }

    #[test]
    fn account_label_prefers_masked_pan() {
        let acc: Account = serde_json::from_str(
            r#"{"id": "x", "balance": 0, "currencyCode": 980, "maskedPan": ["537541******1234"]}"#,
        )
        .unwrap();
        assert_eq!(acc.display_label(), "537541******1234");
    }
}
