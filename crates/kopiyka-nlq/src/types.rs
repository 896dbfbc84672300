use serde::{Deserialize, Serialize};

/// Recognized intent families. The `_sum` / `_count` suffix mirrors whether
/// the user asked "how much" or "how many".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IntentName {
    SpendSum,
    SpendCount,
    IncomeSum,
    IncomeCount,
    TransferOutSum,
    TransferOutCount,
    TransferInSum,
    TransferInCount,
    CompareToBaseline,
    #[default]
    Unsupported,
}

impl IntentName {
    pub fn is_transfer_out(&self) -> bool {
        matches!(self, IntentName::TransferOutSum | IntentName::TransferOutCount)
    }
}

/// Routed intent with slots. Serializable — a pending clarification stores
/// this payload verbatim (and nothing else) until the user answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Intent {
    pub intent: IntentName,
    pub days: Option<i64>,
    pub start_ts: Option<i64>,
    pub end_ts: Option<i64>,
    pub merchant_contains: Option<String>,
    pub recipient_alias: Option<String>,
    pub period_label: Option<String>,
    pub category: Option<String>,
}
