//! Per-user, per-account append-only transaction ledger.
//!
//! Layout:
//!   <root>/<telegram_user_id>/<account_id>.jsonl   — one JSON row per line
//!   <root>/<telegram_user_id>/_meta.json           — account → watermark
//!
//! Appends dedupe by transaction id and advance the watermark monotonically.
//! A crash between the line append and the meta write is safe: `last_ts`
//! reconstructs from the log on the next cold read. Reads skip corrupt lines.

use std::collections::{BTreeMap, HashSet};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use kopiyka_core::{AccountId, KopiykaError, Timestamp, TxRecord, UserId};

use crate::unix_now_f64;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountMeta {
    #[serde(default)]
    pub last_ts: Option<Timestamp>,
    #[serde(default)]
    pub last_sync_at: Option<f64>,
}

pub struct LedgerStore {
    root_dir: PathBuf,
}

impl LedgerStore {
    pub fn open(root_dir: impl AsRef<Path>) -> Result<Self, KopiykaError> {
        let root_dir = root_dir.as_ref().to_path_buf();
        fs::create_dir_all(&root_dir)?;
        Ok(Self { root_dir })
    }

    fn user_dir(&self, user: UserId) -> PathBuf {
        self.root_dir.join(user.to_string())
    }

    fn log_path(&self, user: UserId, account: &str) -> PathBuf {
        self.user_dir(user).join(format!("{account}.jsonl"))
    }

    fn meta_path(&self, user: UserId) -> PathBuf {
        self.user_dir(user).join("_meta.json")
    }

    // ── Watermark meta ───────────────────────────────────────────────────────

    fn load_meta(&self, user: UserId) -> BTreeMap<String, AccountMeta> {
        let Ok(text) = fs::read_to_string(self.meta_path(user)) else {
            return BTreeMap::new();
        };
        serde_json::from_str(&text).unwrap_or_default()
    }

    /// Atomic replace: write-temp then rename.
    fn save_meta(
        &self,
        user: UserId,
        meta: &BTreeMap<String, AccountMeta>,
    ) -> Result<(), KopiykaError> {
        let path = self.meta_path(user);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(meta)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Advance the watermark; never moves it backwards.
    fn update_meta(
        &self,
        user: UserId,
        account: &str,
        last_ts: Option<Timestamp>,
    ) -> Result<(), KopiykaError> {
        let mut meta = self.load_meta(user);
        let entry = meta.entry(account.to_string()).or_default();
        if let Some(ts) = last_ts {
            if entry.last_ts.map_or(true, |prev| ts > prev) {
                entry.last_ts = Some(ts);
            }
        }
        entry.last_sync_at = Some(unix_now_f64());
        self.save_meta(user, &meta)
    }

    pub fn account_meta(&self, user: UserId, account: &str) -> AccountMeta {
        self.load_meta(user).get(account).cloned().unwrap_or_default()
    }

    // ── Log access ───────────────────────────────────────────────────────────

    fn read_rows(&self, user: UserId, account: &str) -> Vec<TxRecord> {
        let path = self.log_path(user, account);
        let Ok(text) = fs::read_to_string(&path) else {
            return Vec::new();
        };

        let mut rows = Vec::new();
        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<TxRecord>(line) {
                Ok(row) => rows.push(row),
                Err(e) => {
                    warn!(user, account, error = %e, "skipping corrupt ledger line");
                }
            }
        }
        rows
    }

    /// Watermark for (user, account). Fast path from meta; cold path scans
    /// the log once and backfills meta.
    pub fn last_ts(&self, user: UserId, account: &str) -> Option<Timestamp> {
        if let Some(ts) = self.account_meta(user, account).last_ts {
            return Some(ts);
        }

        let last = self
            .read_rows(user, account)
            .iter()
            .map(|r| r.time)
            .max()?;
        let _ = self.update_meta(user, account, Some(last));
        Some(last)
    }

    fn known_ids(&self, user: UserId, account: &str) -> HashSet<String> {
        self.read_rows(user, account)
            .into_iter()
            .map(|r| r.id)
            .collect()
    }

    /// Append rows whose id has not been seen before; returns the count
    /// actually appended. On success the watermark advances to the max row
    /// timestamp.
    pub fn append_many(
        &self,
        user: UserId,
        account: &str,
        rows: &[TxRecord],
    ) -> Result<usize, KopiykaError> {
        let dir = self.user_dir(user);
        fs::create_dir_all(&dir)?;

        let mut ids = self.known_ids(user, account);
        let path = self.log_path(user, account);
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;

        let mut appended = 0usize;
        for row in rows {
            let id = row.id.trim();
            if id.is_empty() || ids.contains(id) {
                continue;
            }
            let mut line = serde_json::to_string(row)?;
            line.push('\n');
            file.write_all(line.as_bytes())?;
            ids.insert(id.to_string());
            appended += 1;
        }
        file.flush()?;

        if appended > 0 {
            let max_ts = rows.iter().map(|r| r.time).max();
            self.update_meta(user, account, max_ts)?;
        }
        Ok(appended)
    }

    /// All rows across `accounts` with `from_ts <= time <= to_ts`, sorted by
    /// timestamp ascending.
    pub fn load_range(
        &self,
        user: UserId,
        accounts: &[AccountId],
        from_ts: Timestamp,
        to_ts: Timestamp,
    ) -> Vec<TxRecord> {
        let mut rows: Vec<TxRecord> = Vec::new();
        for account in accounts {
            rows.extend(
                self.read_rows(user, account)
                    .into_iter()
                    .filter(|r| r.time >= from_ts && r.time <= to_ts),
            );
        }
        rows.sort_by_key(|r| r.time);
        rows
    }
}
