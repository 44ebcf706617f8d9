use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::StoreError;

pub const DEFAULT_SETTINGS_FILE: &str = "settings.json";

pub const MONITOR_TIME_WINDOW_KEY: &str = "SelectedMonitorTimeWindow";
pub const TASK_STATUS_KEY: &str = "BackgroundTaskStatus";
pub const TASK_ENABLED_KEY: &str = "IsBackgroundTaskEnabled";

/// Key-value settings container. Values are loosely typed JSON; the typed
/// accessors return `None` when a key is absent or holds another type.
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;

    fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.as_i64())
    }

    fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|v| v.as_str().map(str::to_string))
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.as_bool())
    }

    fn set_int(&self, key: &str, value: i64) -> Result<(), StoreError> {
        self.set(key, Value::from(value))
    }

    fn set_string(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.set(key, Value::from(value))
    }

    fn set_bool(&self, key: &str, value: bool) -> Result<(), StoreError> {
        self.set(key, Value::from(value))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Settings kept as a flat JSON object on disk. Other processes may edit
/// the same file, so every `get` re-reads it and every `set` merges its key
/// into the current contents before replacing the file.
pub struct JsonSettingsStore {
    path: PathBuf,
    /// Last contents seen on disk, served when a re-read fails.
    values: Mutex<Map<String, Value>>,
}

impl JsonSettingsStore {
    /// Opens the settings file, starting empty when it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let values = read_settings(&path)?;
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    fn persist(&self, values: &Map<String, Value>) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        let json = serde_json::to_string_pretty(values).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)
    }
}

fn read_settings(path: &Path) -> Result<Map<String, Value>, StoreError> {
    match std::fs::read_to_string(path) {
        Ok(json) if json.trim().is_empty() => Ok(Map::new()),
        Ok(json) => serde_json::from_str(&json).map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        }),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Map::new()),
        Err(source) => Err(StoreError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

impl SettingsStore for JsonSettingsStore {
    fn get(&self, key: &str) -> Option<Value> {
        let mut cached = lock(&self.values);
        match read_settings(&self.path) {
            Ok(fresh) => *cached = fresh,
            Err(e) => warn!(error = %e, "using cached settings"),
        }
        cached.get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut cached = lock(&self.values);
        let mut values = read_settings(&self.path)?;
        values.insert(key.to_string(), value);
        self.persist(&values)?;
        *cached = values;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemorySettingsStore {
    values: Mutex<Map<String, Value>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self, key: &str) -> Option<Value> {
        lock(&self.values).get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        lock(&self.values).insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_getters_ignore_mismatched_types() {
        let store = MemorySettingsStore::new();
        store.set_string(MONITOR_TIME_WINDOW_KEY, "45").unwrap();
        assert_eq!(store.get_int(MONITOR_TIME_WINDOW_KEY), None);

        store.set_int(MONITOR_TIME_WINDOW_KEY, 45).unwrap();
        assert_eq!(store.get_int(MONITOR_TIME_WINDOW_KEY), Some(45));
        assert_eq!(store.get_string(MONITOR_TIME_WINDOW_KEY), None);
    }

    #[test]
    fn json_settings_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_SETTINGS_FILE);

        let store = JsonSettingsStore::open(&path).unwrap();
        assert_eq!(store.get_string(TASK_STATUS_KEY), None);
        store.set_string(TASK_STATUS_KEY, "No appointments found").unwrap();
        store.set_bool(TASK_ENABLED_KEY, true).unwrap();

        let reopened = JsonSettingsStore::open(&path).unwrap();
        assert_eq!(
            reopened.get_string(TASK_STATUS_KEY).as_deref(),
            Some("No appointments found")
        );
        assert_eq!(reopened.get_bool(TASK_ENABLED_KEY), Some(true));
    }

    #[test]
    fn writes_from_another_handle_are_seen_and_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_SETTINGS_FILE);
        let watcher = JsonSettingsStore::open(&path).unwrap();
        let cli = JsonSettingsStore::open(&path).unwrap();

        cli.set_int(MONITOR_TIME_WINDOW_KEY, 60).unwrap();
        assert_eq!(watcher.get_int(MONITOR_TIME_WINDOW_KEY), Some(60));

        watcher.set_string(TASK_STATUS_KEY, "Successful").unwrap();
        let reopened = JsonSettingsStore::open(&path).unwrap();
        assert_eq!(reopened.get_int(MONITOR_TIME_WINDOW_KEY), Some(60));
        assert_eq!(reopened.get_string(TASK_STATUS_KEY).as_deref(), Some("Successful"));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn corrupt_file_after_open_falls_back_to_last_good_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_SETTINGS_FILE);
        let store = JsonSettingsStore::open(&path).unwrap();
        store.set_int(MONITOR_TIME_WINDOW_KEY, 45).unwrap();

        std::fs::write(&path, "{broken").unwrap();

        assert_eq!(store.get_int(MONITOR_TIME_WINDOW_KEY), Some(45));
        assert!(matches!(
            store.set_int(MONITOR_TIME_WINDOW_KEY, 50),
            Err(StoreError::Json { .. })
        ));
    }

    #[test]
    fn corrupt_settings_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_SETTINGS_FILE);
        std::fs::write(&path, "[1, 2").unwrap();

        assert!(matches!(
            JsonSettingsStore::open(&path),
            Err(StoreError::Json { .. })
        ));
    }
}
