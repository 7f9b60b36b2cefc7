//! Saved per-user timezone preferences.
//!
//! The pipeline only ever needs `get` and `set`; the trait keeps the real
//! persistence a swappable collaborator. Two bindings ship with the crate:
//! an in-memory map (tests, ephemeral deployments) and a JSON file under the
//! user's home directory.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub type UserId = i64;

/// One row per user. `timezone` stays `None` until the user completes a set
/// command; rows are never deleted here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preference {
    pub user_id: UserId,
    pub timezone: Option<String>,
}

#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn get(&self, user_id: UserId) -> Result<Option<String>>;
    async fn set(&self, user_id: UserId, timezone: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    entries: Mutex<HashMap<UserId, String>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PreferenceStore for MemoryPreferenceStore {
    async fn get(&self, user_id: UserId) -> Result<Option<String>> {
        Ok(self.entries.lock().unwrap().get(&user_id).cloned())
    }

    async fn set(&self, user_id: UserId, timezone: &str) -> Result<()> {
        self.entries.lock().unwrap().insert(user_id, timezone.to_string());
        Ok(())
    }
}

const STATE_DIR: &str = ".localzone";
const PREFERENCES_FILE: &str = "preferences.json";
// Cap reads so a corrupt or hostile state file cannot exhaust memory
const MAX_FILE_SIZE: u64 = 1024 * 1024;

/// File-backed store: the whole preference table as one JSON array,
/// rewritten on every set. A mutex serializes read-modify-write cycles
/// within the process.
pub struct JsonPreferenceStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonPreferenceStore {
    pub fn new() -> Result<Self> {
        let home_dir = dirs::home_dir().ok_or_else(|| anyhow!("could not find home directory"))?;
        let state_dir = home_dir.join(STATE_DIR);
        std::fs::create_dir_all(&state_dir)?;
        Ok(Self::with_path(state_dir.join(PREFERENCES_FILE)))
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { path, lock: Mutex::new(()) }
    }

    fn load(&self) -> Result<Vec<Preference>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let metadata = std::fs::metadata(&self.path)?;
        if metadata.len() > MAX_FILE_SIZE {
            return Err(anyhow!("preference file exceeds size limits"));
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader)
            .map_err(|e| anyhow!("failed to parse preference file: {}", e))
    }

    fn save(&self, items: &[Preference]) -> Result<()> {
        let file =
            OpenOptions::new().write(true).create(true).truncate(true).open(&self.path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, items)?;
        Ok(())
    }
}

#[async_trait]
impl PreferenceStore for JsonPreferenceStore {
    async fn get(&self, user_id: UserId) -> Result<Option<String>> {
        let _guard = self.lock.lock().unwrap();
        let items = self.load()?;
        Ok(items.into_iter().find(|p| p.user_id == user_id).and_then(|p| p.timezone))
    }

    async fn set(&self, user_id: UserId, timezone: &str) -> Result<()> {
        let _guard = self.lock.lock().unwrap();
        let mut items = self.load()?;
        match items.iter_mut().find(|p| p.user_id == user_id) {
            Some(existing) => existing.timezone = Some(timezone.to_string()),
            None => items.push(Preference { user_id, timezone: Some(timezone.to_string()) }),
        }
        self.save(&items)
    }
}
