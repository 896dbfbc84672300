//! Per-user long-term spending profile blob.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use kopiyka_core::{KopiykaError, UserId};

pub struct ProfileStore {
    root_dir: PathBuf,
}

impl ProfileStore {
    pub fn open(root_dir: impl AsRef<Path>) -> Result<Self, KopiykaError> {
        let root_dir = root_dir.as_ref().to_path_buf();
        fs::create_dir_all(&root_dir)?;
        Ok(Self { root_dir })
    }

    fn path(&self, user: UserId) -> PathBuf {
        self.root_dir.join(format!("{user}.json"))
    }

    pub fn save<T: Serialize>(&self, user: UserId, profile: &T) -> Result<(), KopiykaError> {
        fs::write(
            self.path(user),
            serde_json::to_string_pretty(&serde_json::to_value(profile)?)?,
        )?;
        Ok(())
    }

    pub fn load(&self, user: UserId) -> Option<Value> {
        let text = fs::read_to_string(self.path(user)).ok()?;
        serde_json::from_str(&text).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::open(dir.path().join("profiles")).unwrap();

        store.save(9, &json!({"avg_check_uah": 123.45})).unwrap();
        assert_eq!(store.load(9).unwrap()["avg_check_uah"], 123.45);
        assert!(store.load(10).is_none());
    }
}
