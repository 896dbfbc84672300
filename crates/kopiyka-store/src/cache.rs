//! TTL'd JSON disk cache.
//!
//! One file per key (`<blake3(key)>.json`), each holding
//! `{ "expires_at": unix_seconds | null, "value": <blob> }`.
//! Expired and corrupt entries are deleted on the next read and reported
//! absent. There is no atomicity across entries.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use kopiyka_core::KopiykaError;

use crate::unix_now_f64;

#[derive(Serialize, Deserialize)]
struct Entry {
    expires_at: Option<f64>,
    value: Value,
}

pub struct DiskCache {
    root_dir: PathBuf,
}

impl DiskCache {
    pub fn open(root_dir: impl AsRef<Path>) -> Result<Self, KopiykaError> {
        let root_dir = root_dir.as_ref().to_path_buf();
        fs::create_dir_all(&root_dir)?;
        Ok(Self { root_dir })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        let digest = blake3::hash(key.as_bytes()).to_hex();
        self.root_dir.join(format!("{digest}.json"))
    }

    /// Fetch a value; expired or unparseable entries are removed and `None`
    /// is returned.
    pub fn get(&self, key: &str) -> Option<Value> {
        let path = self.key_path(key);
        let text = fs::read_to_string(&path).ok()?;

        let entry: Entry = match serde_json::from_str(&text) {
            Ok(e) => e,
            Err(e) => {
                debug!(key, error = %e, "dropping corrupt cache entry");
                let _ = fs::remove_file(&path);
                return None;
            }
        };

        if let Some(expires_at) = entry.expires_at {
            if unix_now_f64() >= expires_at {
                let _ = fs::remove_file(&path);
                return None;
            }
        }
        Some(entry.value)
    }

    pub fn set(
        &self,
        key: &str,
        value: &Value,
        ttl_seconds: Option<u64>,
    ) -> Result<(), KopiykaError> {
        let entry = Entry {
            expires_at: ttl_seconds.map(|t| unix_now_f64() + t as f64),
            value: value.clone(),
        };
        fs::write(self.key_path(key), serde_json::to_string(&entry)?)?;
        Ok(())
    }

    pub fn delete(&self, key: &str) {
        let _ = fs::remove_file(self.key_path(key));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cache() -> (tempfile::TempDir, DiskCache) {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(dir.path().join("cache")).unwrap();
        (dir, cache)
    }

    #[test]
    fn set_get_round_trip() {
        let (_dir, cache) = cache();
        cache.set("k", &json!({"a": [1, 2, 3]}), None).unwrap();
        assert_eq!(cache.get("k"), Some(json!({"a": [1, 2, 3]})));
    }

    #[test]
    fn missing_key_is_absent() {
        let (_dir, cache) = cache();
        assert_eq!(cache.get("nope"), None);
    }

    #[test]
    fn zero_ttl_expires_immediately() {
        let (_dir, cache) = cache();
        cache.set("k", &json!(1), Some(0)).unwrap();
        assert_eq!(cache.get("k"), None);
        // and the expired file is gone
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn corrupt_entry_is_deleted_and_absent() {
        let (_dir, cache) = cache();
        cache.set("k", &json!(1), None).unwrap();
        fs::write(cache.key_path("k"), "{not json").unwrap();
        assert_eq!(cache.get("k"), None);
        assert!(!cache.key_path("k").exists());
    }

    #[test]
    fn delete_removes_entry() {
        let (_dir, cache) = cache();
        cache.set("k", &json!(true), None).unwrap();
        cache.delete("k");
        assert_eq!(cache.get("k"), None);
    }
}
