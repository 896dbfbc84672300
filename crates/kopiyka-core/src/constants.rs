//! ─── kopiyka shared constants ───────────────────────────────────────────────
//!
//! Upstream statement contract: Monobank personal API semantics.
//! All amounts are signed minor units (kopiyky); negative = money out.

// ── Time ─────────────────────────────────────────────────────────────────────

/// Seconds in one UTC day.
pub const SECONDS_PER_DAY: i64 = 86_400;

// ── Upstream statement contract ──────────────────────────────────────────────

/// Upstream caps each statement response at this many items.
pub const STATEMENT_PAGE_CAP: usize = 500;

/// Maximum statement window the upstream accepts: 31 days + 1 hour.
pub const MAX_STATEMENT_SPAN_SECS: i64 = 31 * SECONDS_PER_DAY + 3_600;

/// Minimum interval between calls to one endpoint per (token, account).
pub const MIN_CALL_INTERVAL_SECS: u64 = 60;

/// client-info responses are cached this long.
pub const CLIENT_INFO_TTL_SECS: u64 = 600;

/// Statement unions are cached this long per (token, account, from, to).
pub const STATEMENT_TTL_SECS: u64 = 900;

// ── Sync pipeline ────────────────────────────────────────────────────────────

/// Re-fetch overlap below the watermark. Absorbs eventual consistency and
/// late-arriving authorizations on the upstream side.
pub const SYNC_OVERLAP_SECS: i64 = 3_600;

// ── Upstream endpoints ───────────────────────────────────────────────────────

pub const DEFAULT_BANK_BASE_URL: &str = "https://api.monobank.ua";
