//! Watermarked ledger catch-up.
//!
//! Per account: resume 1 hour below the watermark (or `days_back` on a cold
//! start) and walk forward to now in windows no larger than the upstream's
//! 31-day + 1-hour cap, appending each window through the ledger's dedupe.

use serde::Serialize;
use tracing::info;

use kopiyka_core::{
    AccountId, KopiykaError, Timestamp, UserId, MAX_STATEMENT_SPAN_SECS, SECONDS_PER_DAY,
    SYNC_OVERLAP_SECS,
};
use kopiyka_store::LedgerStore;

use crate::client::BankClient;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SyncResult {
    pub accounts: usize,
    pub fetched_requests: u32,
    pub appended: usize,
}

/// Split `[start_ts, end_ts)` into consecutive windows of at most
/// `max_span_secs`, in ascending-time order.
pub fn statement_windows(
    start_ts: Timestamp,
    end_ts: Timestamp,
    max_span_secs: i64,
) -> Vec<(Timestamp, Timestamp)> {
    assert!(max_span_secs > 0, "window span must be positive");

    let mut windows = Vec::new();
    let mut cur = start_ts;
    while cur < end_ts {
        let next = end_ts.min(cur + max_span_secs);
        windows.push((cur, next));
        cur = next;
    }
    windows
}

/// Catch the ledger up for each selected account.
pub async fn sync_accounts(
    client: &BankClient,
    ledger: &LedgerStore,
    user: UserId,
    account_ids: &[AccountId],
    days_back: i64,
    now_ts: Timestamp,
) -> Result<SyncResult, KopiykaError> {
    let mut fetched_requests = 0u32;
    let mut appended = 0usize;

    for account in account_ids {
        let start = match ledger.last_ts(user, account) {
            Some(watermark) => (watermark - SYNC_OVERLAP_SECS).max(0),
            None => now_ts - days_back * SECONDS_PER_DAY,
        };

        for (from_ts, to_ts) in statement_windows(start, now_ts, MAX_STATEMENT_SPAN_SECS) {
            let items = client.statement(account, from_ts, to_ts).await?;
            fetched_requests += 1;

            let rows: Vec<_> = items
                .into_iter()
                .map(|item| item.into_record(account))
                .collect();
            appended += ledger.append_many(user, account, &rows)?;
        }
    }

    info!(
        user,
        accounts = account_ids.len(),
        fetched_requests,
        appended,
        "ledger sync complete"
    );
    Ok(SyncResult {
        accounts: account_ids.len(),
        fetched_requests,
        appended,
    })
}
