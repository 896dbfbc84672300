use thiserror::Error;

#[derive(Debug, Error)]
pub enum KopiykaError {
    // ── Upstream errors ──────────────────────────────────────────────────────
    #[error("rate limited: wait {retry_in_secs:.1}s before calling '{key}' again")]
    RateLimited { key: String, retry_in_secs: f64 },

    #[error("upstream auth failed with status {status}: token invalid or revoked")]
    Auth { status: u16 },

    #[error("upstream error: {status} {reason}. Response: {body}")]
    Upstream {
        status: u16,
        reason: String,
        body: String,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    // ── Storage errors ───────────────────────────────────────────────────────
    #[error("storage I/O: {0}")]
    Storage(#[from] std::io::Error),

    #[error("corrupt entry at {path}: {detail}")]
    Corrupt { path: String, detail: String },

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("token sealing: {0}")]
    Crypto(String),

    // ── Configuration errors ─────────────────────────────────────────────────
    #[error("environment variable {0} is not set")]
    MissingEnv(&'static str),

    #[error("no upstream token configured for this user")]
    MissingToken,

    #[error("no accounts selected for this user")]
    NoAccountsSelected,
}

impl KopiykaError {
    /// True for faults worth retrying with backoff: transient transport
    /// failures and upstream 5xx. 429 is handled separately (Retry-After).
    pub fn is_transient(&self) -> bool {
        match self {
            KopiykaError::Transport(_) => true,
            KopiykaError::Upstream { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
