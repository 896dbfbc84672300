//! Disk-backed stores, one type per concern:
//!
//!   DiskCache    — TTL'd JSON blobs keyed by opaque string
//!   RateLimiter  — per-key minimum call interval, persistent across restarts
//!   LedgerStore  — per-(user, account) append-only transaction log + watermark
//!   UserStore    — per-user config with sealed upstream token
//!   ReportStore  — per-(user, period) computed facts envelope
//!   ProfileStore — per-user long-term spending profile
//!
//! Every store owns its own directory under the cache root and never touches
//! another store's files.

pub mod cache;
pub mod ledger;
pub mod limiter;
pub mod profiles;
pub mod reports;
pub mod users;

pub use cache::DiskCache;
pub use ledger::{AccountMeta, LedgerStore};
pub use limiter::RateLimiter;
pub use profiles::ProfileStore;
pub use reports::{ReportEnvelope, ReportStore};
pub use users::{UserConfig, UserStore, UserUpdate};

use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock unix seconds with sub-second precision, for `*_at` fields.
pub(crate) fn unix_now_f64() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
