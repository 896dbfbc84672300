//! Upstream bank client and the ledger sync pipeline.
//!
//! The client is a thin authenticated GET wrapper over reqwest with bounded
//! retries, Retry-After-aware 429 handling, response caching and persistent
//! rate limiting. The sync pipeline walks statement windows forward from the
//! per-account watermark and appends through the ledger's dedupe.

pub mod client;
pub mod models;
pub mod sync;

pub use client::{paginate_statement, BankClient, StatementFetcher};
pub use models::{Account, ClientInfo, StatementItem};
pub use sync::{statement_windows, sync_accounts, SyncResult};
