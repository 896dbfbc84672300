//! Per-user NLQ memory: alias tables and the pending-clarification record.
//!
//! One JSON file per user. The merchant table is seeded with common local
//! shorthands; successful fuzzy resolutions are written back so repeat
//! queries hit the exact map. At most one pending intent exists per user —
//! setting a new one overwrites the old, answering or cancelling clears it.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use kopiyka_core::{KopiykaError, UserId};

use crate::text::norm;
use crate::types::Intent;

const DEFAULT_MERCHANT_ALIASES: [(&str, &str); 24] = [
    ("мак", "mcdonalds"),
    ("макдак", "mcdonalds"),
    ("макдональдс", "mcdonalds"),
    ("макд", "mcdonalds"),
    ("mcd", "mcdonalds"),
    ("mc", "mcdonalds"),
    ("сільпо", "silpo"),
    ("силпо", "silpo"),
    ("атб", "atb"),
    ("atb", "atb"),
    ("novus", "novus"),
    ("глово", "glovo"),
    ("glovo", "glovo"),
    ("bolt", "bolt"),
    ("uber", "uber"),
    ("uklon", "uklon"),
    ("уклон", "uklon"),
    ("wolt", "wolt"),
    ("rozetka", "rozetka"),
    ("розетка", "rozetka"),
    ("аптека", "apteka"),
    ("apteka", "apteka"),
    ("eva", "eva"),
    ("watsons", "watsons"),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMemory {
    pub merchant_aliases: BTreeMap<String, String>,
    #[serde(default)]
    pub recipient_aliases: BTreeMap<String, String>,
    #[serde(default)]
    pub pending_intent: Option<Intent>,
    #[serde(default)]
    pub pending_kind: Option<String>,
    #[serde(default)]
    pub pending_options: Option<Vec<String>>,
}

impl Default for UserMemory {
    fn default() -> Self {
        Self {
            merchant_aliases: DEFAULT_MERCHANT_ALIASES
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            recipient_aliases: BTreeMap::new(),
            pending_intent: None,
            pending_kind: None,
            pending_options: None,
        }
    }
}

pub struct MemoryStore {
    root_dir: PathBuf,
}

impl MemoryStore {
    pub fn open(root_dir: impl AsRef<Path>) -> Result<Self, KopiykaError> {
        let root_dir = root_dir.as_ref().to_path_buf();
        fs::create_dir_all(&root_dir)?;
        Ok(Self { root_dir })
    }

    fn path(&self, user: UserId) -> PathBuf {
        self.root_dir.join(format!("{user}.json"))
    }

    pub fn load(&self, user: UserId) -> UserMemory {
        let path = self.path(user);
        match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(memory) => memory,
                Err(e) => {
                    warn!(user, error = %e, "resetting corrupt NLQ memory");
                    let memory = UserMemory::default();
                    let _ = self.save(user, &memory);
                    memory
                }
            },
            Err(_) => {
                let memory = UserMemory::default();
                let _ = self.save(user, &memory);
                memory
            }
        }
    }

    pub fn save(&self, user: UserId, memory: &UserMemory) -> Result<(), KopiykaError> {
        fs::write(self.path(user), serde_json::to_string_pretty(memory)?)?;
        Ok(())
    }

    /// Resolve a merchant phrase against the alias table: exact hit first,
    /// then the longest prefix/substring match. A fuzzy hit is written back
    /// under the raw phrase so the next lookup is exact. Falls back to the
    /// normalized phrase itself.
    pub fn resolve_merchant_alias(&self, user: UserId, merchant: &str) -> Option<String> {
        let raw = norm(merchant);
        if raw.is_empty() {
            return None;
        }

        let mut memory = self.load(user);

        if let Some(direct) = memory.merchant_aliases.get(&raw) {
            let direct = norm(direct);
            if !direct.is_empty() {
                return Some(direct);
            }
        }

        // short phrases are too ambiguous for substring matching
        if raw.chars().count() <= 3 {
            return Some(raw);
        }

        let mut best: Option<(usize, String)> = None;
        for (k, v) in &memory.merchant_aliases {
            let kk = norm(k);
            let vv = norm(v);
            if kk.is_empty() || vv.is_empty() {
                continue;
            }
            if raw == kk || raw.contains(&kk) || kk.contains(&raw) {
                let len = kk.chars().count();
                if best.as_ref().map_or(true, |(blen, _)| len > *blen) {
                    best = Some((len, vv));
                }
            }
        }

        match best {
            Some((_, resolved)) => {
                memory
                    .merchant_aliases
                    .insert(raw.clone(), resolved.clone());
                let _ = self.save(user, &memory);
                Some(resolved)
            }
            None => Some(raw),
        }
    }

    pub fn recipient_alias(&self, user: UserId, alias: &str) -> Option<String> {
        let key = alias.trim().to_lowercase();
        self.load(user).recipient_aliases.get(&key).cloned()
    }

    pub fn save_recipient_alias(&self, user: UserId, alias: &str, match_value: &str) {
        let alias = alias.trim().to_lowercase();
        let value = match_value.trim().to_lowercase();
        if alias.is_empty() || value.is_empty() {
            return;
        }
        let mut memory = self.load(user);
        memory.recipient_aliases.insert(alias, value);
        let _ = self.save(user, &memory);
    }

    // ── Pending clarification ────────────────────────────────────────────────

    pub fn set_pending(
        &self,
        user: UserId,
        intent: &Intent,
        kind: &str,
        options: Vec<String>,
    ) {
        let mut memory = self.load(user);
        memory.pending_intent = Some(intent.clone());
        memory.pending_kind = Some(kind.to_string());
        memory.pending_options = Some(options);
        let _ = self.save(user, &memory);
    }

    pub fn pending(&self, user: UserId) -> Option<(Intent, Vec<String>)> {
        let memory = self.load(user);
        let intent = memory.pending_intent?;
        Some((intent, memory.pending_options.unwrap_or_default()))
    }

    pub fn clear_pending(&self, user: UserId) {
        let mut memory = self.load(user);
        if memory.pending_intent.is_none() && memory.pending_options.is_none() {
            return;
        }
        memory.pending_intent = None;
        memory.pending_kind = None;
        memory.pending_options = None;
        let _ = self.save(user, &memory);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IntentName;

    fn store() -> (tempfile::TempDir, MemoryStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(dir.path().join("memory")).unwrap();
        (dir, store)
    }

    #[test]
    fn memory_file_is_seeded_with_defaults() {
        let (_dir, store) = store();
        let memory = store.load(1);
        assert_eq!(memory.merchant_aliases.get("мак").unwrap(), "mcdonalds");
        assert!(store.path(1).exists());
    }

    #[test]
    fn exact_alias_resolution() {
        let (_dir, store) = store();
        assert_eq!(store.resolve_merchant_alias(1, "мак").unwrap(), "mcdonalds");
        assert_eq!(store.resolve_merchant_alias(1, "  МАК!! ").unwrap(), "mcdonalds");
    }

    #[test]
    fn fuzzy_resolution_is_cached() {
        let (_dir, store) = store();
        assert_eq!(
            store.resolve_merchant_alias(1, "макдональдс").unwrap(),
            "mcdonalds"
        );
        let memory = store.load(1);
        assert_eq!(
            memory.merchant_aliases.get("макдональдс").unwrap(),
            "mcdonalds"
        );
    }

    #[test]
    fn unknown_merchant_falls_through_normalized() {
        let (_dir, store) = store();
        assert_eq!(
            store.resolve_merchant_alias(1, "Нова Пошта!").unwrap(),
            "нова пошта"
        );
    }

    #[test]
    fn pending_intent_lifecycle() {
        let (_dir, store) = store();
        let intent = Intent {
            intent: IntentName::TransferOutSum,
            recipient_alias: Some("дівчині".to_string()),
            ..Default::default()
        };

        store.set_pending(1, &intent, "recipient", vec!["a".into(), "b".into()]);
        let (pending, options) = store.pending(1).unwrap();
        assert_eq!(pending.intent, IntentName::TransferOutSum);
        assert_eq!(options.len(), 2);

        // overwriting replaces, clearing removes
        store.set_pending(1, &intent, "recipient", vec!["c".into()]);
        assert_eq!(store.pending(1).unwrap().1, vec!["c".to_string()]);
        store.clear_pending(1);
        assert!(store.pending(1).is_none());
    }

    #[test]
    fn recipient_aliases_round_trip() {
        let (_dir, store) = store();
        assert!(store.recipient_alias(1, "дівчині").is_none());
        store.save_recipient_alias(1, " Дівчині ", "Maria K");
        assert_eq!(store.recipient_alias(1, "дівчині").unwrap(), "maria k");
    }
}
