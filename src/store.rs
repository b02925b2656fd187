//! JSON files holding the backend's settings and download history.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use log::warn;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::gateway::GatewayResult;
use crate::model::HistoryEntry;

const APP_DIR: &str = "ytd-desktop";
const SETTINGS_FILE: &str = "settings.json";
const HISTORY_FILE: &str = "history.json";

/// Default location: `<config dir>/ytd-desktop`, or the working directory when
/// the platform has no config dir.
pub fn default_dir() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("."))
}

pub struct Store {
    dir: PathBuf,
    settings: Mutex<BTreeMap<String, String>>,
    history: Mutex<Vec<HistoryEntry>>,
}

impl Store {
    /// Opens the store in `dir`, creating it if needed. Unreadable files start empty.
    pub fn open(dir: impl Into<PathBuf>) -> GatewayResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            settings: Mutex::new(load(&dir.join(SETTINGS_FILE))),
            history: Mutex::new(load(&dir.join(HISTORY_FILE))),
            dir,
        })
    }

    pub fn setting(&self, key: &str) -> Option<String> {
        lock(&self.settings).get(key).cloned()
    }

    pub fn save_setting(&self, key: &str, value: &str) -> GatewayResult<()> {
        let mut settings = lock(&self.settings);
        settings.insert(key.to_string(), value.to_string());
        save(&self.dir.join(SETTINGS_FILE), &*settings)
    }

    /// Completed downloads, oldest first
    pub fn history(&self) -> Vec<HistoryEntry> {
        lock(&self.history).clone()
    }

    pub fn history_entry(&self, id: &str) -> Option<HistoryEntry> {
        lock(&self.history).iter().find(|e| e.id == id).cloned()
    }

    /// Records a completed download, replacing an older record with the same id.
    pub fn push_history(&self, entry: HistoryEntry) -> GatewayResult<()> {
        let mut history = lock(&self.history);
        history.retain(|e| e.id != entry.id);
        history.push(entry);
        save(&self.dir.join(HISTORY_FILE), &*history)
    }

    pub fn remove_history(&self, id: &str) -> GatewayResult<Option<HistoryEntry>> {
        let mut history = lock(&self.history);
        let Some(pos) = history.iter().position(|e| e.id == id) else {
            return Ok(None);
        };
        let removed = history.remove(pos);
        save(&self.dir.join(HISTORY_FILE), &*history)?;
        Ok(Some(removed))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn load<T: DeserializeOwned + Default>(path: &Path) -> T {
    let Ok(contents) = fs::read_to_string(path) else {
        return T::default();
    };
    match serde_json::from_str(&contents) {
        Ok(value) => value,
        Err(e) => {
            warn!("failed to parse {}: {}", path.display(), e);
            T::default()
        }
    }
}

fn save<T: Serialize + ?Sized>(path: &Path, value: &T) -> GatewayResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}
