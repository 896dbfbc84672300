//! Per-user, per-period report cache.
//!
//! Chat handlers serve these pre-computed envelopes instead of re-hitting the
//! upstream. Overwritten in place (write-temp, rename) on every recompute.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use kopiyka_core::{KopiykaError, Period, UserId};

use crate::unix_now_f64;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportEnvelope {
    pub period: String,
    pub generated_at: f64,
    pub facts: Value,
}

pub struct ReportStore {
    root_dir: PathBuf,
}

impl ReportStore {
    pub fn open(root_dir: impl AsRef<Path>) -> Result<Self, KopiykaError> {
        let root_dir = root_dir.as_ref().to_path_buf();
        fs::create_dir_all(&root_dir)?;
        Ok(Self { root_dir })
    }

    fn path(&self, user: UserId, period: Period) -> PathBuf {
        self.root_dir
            .join(user.to_string())
            .join(format!("facts_{period}.json"))
    }

    pub fn save<T: Serialize>(
        &self,
        user: UserId,
        period: Period,
        facts: &T,
    ) -> Result<(), KopiykaError> {
        let envelope = ReportEnvelope {
            period: period.as_str().to_string(),
            generated_at: unix_now_f64(),
            facts: serde_json::to_value(facts)?,
        };

        let path = self.path(user, period);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&envelope)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    pub fn load(&self, user: UserId, period: Period) -> Option<ReportEnvelope> {
        let text = fs::read_to_string(self.path(user, period)).ok()?;
        match serde_json::from_str(&text) {
            Ok(envelope) => Some(envelope),
            Err(e) => {
                warn!(user, period = %period, error = %e, "unreadable report envelope");
                None
            }
        }
    }
}
