use serde::{Deserialize, Serialize};
use std::fmt;

/// Telegram user identifier — the tenant key for every per-user store.
pub type UserId = i64;

/// Upstream account identifier (opaque string issued by the bank).
pub type AccountId = String;

/// Unix timestamp (seconds, UTC).
pub type Timestamp = i64;

// ── TxRecord ─────────────────────────────────────────────────────────────────

/// One normalized ledger row, exactly as it is appended to the per-account
/// JSONL log. Rows are immutable once appended; `id` is unique per account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRecord {
    pub id: String,
    pub time: Timestamp,
    pub account_id: AccountId,
    /// Signed minor units; negative = money out.
    pub amount: i64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub mcc: Option<u16>,
    #[serde(rename = "currencyCode", default)]
    pub currency_code: Option<u16>,
}

// ── TxKind ───────────────────────────────────────────────────────────────────

/// Derived transaction kind. Never persisted — always recomputed from
/// (amount sign, mcc, description) so classifier rules can evolve without a
/// ledger migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    Income,
    Spend,
    TransferIn,
    TransferOut,
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TxKind::Income => "income",
            TxKind::Spend => "spend",
            TxKind::TransferIn => "transfer_in",
            TxKind::TransferOut => "transfer_out",
        };
        write!(f, "{s}")
    }
}

// ── Period ───────────────────────────────────────────────────────────────────

/// The three cached report periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Today,
    Week,
    Month,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Today => "today",
            Period::Week => "week",
            Period::Month => "month",
        }
    }

    pub fn parse(s: &str) -> Option<Period> {
        match s {
            "today" => Some(Period::Today),
            "week" => Some(Period::Week),
            "month" => Some(Period::Month),
            _ => None,
        }
    }

    /// Report window length in days (today reports use the current UTC day).
    pub fn days_back(&self) -> i64 {
        match self {
            Period::Today => 1,
            Period::Week => 7,
            Period::Month => 30,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
