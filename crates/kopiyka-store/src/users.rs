//! Per-user configuration store.
//!
//! One JSON file per user under `<root>/<telegram_user_id>.json`. The
//! upstream token is sealed with the process-wide codec before it touches
//! disk; values written by older installs without the codec signature are
//! re-sealed in place on first read.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use kopiyka_core::{AccountId, KopiykaError, UserId};
use kopiyka_crypto::TokenCodec;

use crate::unix_now_f64;

/// Decrypted view handed to callers. `mono_token` is plaintext here and only
/// here; it never leaves this struct except into the HTTP client.
#[derive(Debug, Clone)]
pub struct UserConfig {
    pub telegram_user_id: UserId,
    pub mono_token: String,
    pub selected_account_ids: Vec<AccountId>,
    pub chat_id: Option<i64>,
    pub autojobs_enabled: bool,
    pub updated_at: f64,
}

/// On-disk record. Token field holds the sealed form.
#[derive(Debug, Serialize, Deserialize)]
struct UserRecord {
    telegram_user_id: UserId,
    #[serde(default)]
    mono_token: String,
    #[serde(default)]
    selected_account_ids: Vec<AccountId>,
    #[serde(default)]
    chat_id: Option<i64>,
    #[serde(default = "default_autojobs")]
    autojobs_enabled: bool,
    #[serde(default)]
    updated_at: f64,
}

fn default_autojobs() -> bool {
    true
}

/// Partial update: `None` fields keep their stored value.
#[derive(Debug, Default)]
pub struct UserUpdate {
    pub mono_token: Option<String>,
    pub selected_account_ids: Option<Vec<AccountId>>,
    pub chat_id: Option<i64>,
    pub autojobs_enabled: Option<bool>,
}

pub struct UserStore {
    root_dir: PathBuf,
    codec: TokenCodec,
}

impl UserStore {
    pub fn open(root_dir: impl AsRef<Path>, codec: TokenCodec) -> Result<Self, KopiykaError> {
        let root_dir = root_dir.as_ref().to_path_buf();
        fs::create_dir_all(&root_dir)?;
        Ok(Self { root_dir, codec })
    }

    fn path(&self, user: UserId) -> PathBuf {
        self.root_dir.join(format!("{user}.json"))
    }

    fn load_record(&self, user: UserId) -> Option<UserRecord> {
        let text = fs::read_to_string(self.path(user)).ok()?;
        match serde_json::from_str(&text) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(user, error = %e, "unreadable user config");
                None
            }
        }
    }

    fn write_record(&self, user: UserId, record: &UserRecord) -> Result<(), KopiykaError> {
        let path = self.path(user);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(record)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Create or partially update a user's config. The selected-accounts list
    /// is replaced atomically when present; the token is sealed before write.
    pub fn save(&self, user: UserId, update: UserUpdate) -> Result<(), KopiykaError> {
        let existing = self.load_record(user);

        let mono_token = match update.mono_token {
            Some(plain) if plain.is_empty() => String::new(),
            Some(plain) => self.codec.seal(&plain),
            None => existing.as_ref().map(|r| r.mono_token.clone()).unwrap_or_default(),
        };

        let record = UserRecord {
            telegram_user_id: user,
            mono_token,
            selected_account_ids: update
                .selected_account_ids
                .or_else(|| existing.as_ref().map(|r| r.selected_account_ids.clone()))
                .unwrap_or_default(),
            chat_id: update
                .chat_id
                .or_else(|| existing.as_ref().and_then(|r| r.chat_id)),
            autojobs_enabled: update
                .autojobs_enabled
                .or_else(|| existing.as_ref().map(|r| r.autojobs_enabled))
                .unwrap_or(true),
            updated_at: unix_now_f64(),
        };
        self.write_record(user, &record)
    }

    /// Load and decrypt. A stored token without the codec signature is a
    /// plain-text leftover: seal it and rewrite the file before returning.
    pub fn load(&self, user: UserId) -> Option<UserConfig> {
        let mut record = self.load_record(user)?;

        if !record.mono_token.is_empty() && !TokenCodec::is_sealed(&record.mono_token) {
            info!(user, "migrating plain-text token to sealed form");
            record.mono_token = self.codec.seal(&record.mono_token.clone());
            if let Err(e) = self.write_record(user, &record) {
                warn!(user, error = %e, "token migration rewrite failed");
            }
        }

        let mono_token = if record.mono_token.is_empty() {
            String::new()
        } else {
            match self.codec.open(&record.mono_token) {
                Ok(plain) => plain,
                Err(e) => {
                    warn!(user, error = %e, "stored token cannot be unsealed");
                    return None;
                }
            }
        };

        Some(UserConfig {
            telegram_user_id: record.telegram_user_id,
            mono_token,
            selected_account_ids: record.selected_account_ids,
            chat_id: record.chat_id,
            autojobs_enabled: record.autojobs_enabled,
            updated_at: record.updated_at,
        })
    }

    /// All stored users, arbitrary order. Scheduler-only.
    pub fn iter_all(&self) -> Vec<UserConfig> {
        let Ok(entries) = fs::read_dir(&self.root_dir) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Ok(user) = stem.parse::<UserId>() else {
                continue;
            };
            if let Some(cfg) = self.load(user) {
                out.push(cfg);
            }
        }
        out
    }
}
