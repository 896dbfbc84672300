//! Persistent per-key rate limiter.
//!
//! Last-call times live in one JSON file so restarts keep honoring the
//! upstream's per-minute budget. Keys partition as
//! `<endpoint>:<token-fingerprint>[:<account>]` — never the raw token.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use kopiyka_core::KopiykaError;

use crate::unix_now_f64;

pub struct RateLimiter {
    state_file: PathBuf,
    /// Serializes state-file access. Not held across the throttle sleep, so
    /// independent keys do not block each other.
    lock: tokio::sync::Mutex<()>,
}

impl RateLimiter {
    pub fn open(state_file: impl AsRef<Path>) -> Result<Self, KopiykaError> {
        let state_file = state_file.as_ref().to_path_buf();
        if let Some(parent) = state_file.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Self {
            state_file,
            lock: tokio::sync::Mutex::new(()),
        })
    }

    fn load(&self) -> HashMap<String, f64> {
        let Ok(text) = fs::read_to_string(&self.state_file) else {
            return HashMap::new();
        };
        serde_json::from_str(&text).unwrap_or_default()
    }

    fn save(&self, state: &HashMap<String, f64>) {
        if let Ok(text) = serde_json::to_string(state) {
            let _ = fs::write(&self.state_file, text);
        }
    }

    fn remaining_secs(&self, key: &str, min_interval_secs: u64) -> f64 {
        match self.load().get(key) {
            Some(last) => min_interval_secs as f64 - (unix_now_f64() - last),
            None => 0.0,
        }
    }

    fn record_call(&self, key: &str) {
        let mut state = self.load();
        state.insert(key.to_string(), unix_now_f64());
        self.save(&state);
    }

    /// Enforce the minimum interval for `key`. With `wait` the remainder is
    /// slept away; without it a `RateLimited` error tells the caller when to
    /// retry. Either way a successful return records "now" as the last call.
    pub async fn throttle(
        &self,
        key: &str,
        min_interval_secs: u64,
        wait: bool,
    ) -> Result<(), KopiykaError> {
        let remaining = {
            let _guard = self.lock.lock().await;
            self.remaining_secs(key, min_interval_secs)
        };

        if remaining > 0.0 {
            if !wait {
                return Err(KopiykaError::RateLimited {
                    key: key.to_string(),
                    retry_in_secs: remaining,
                });
            }
            debug!(key, remaining, "throttling upstream call");
            tokio::time::sleep(Duration::from_secs_f64(remaining)).await;
        }

        let _guard = self.lock.lock().await;
        self.record_call(key);
        Ok(())
    }
}
