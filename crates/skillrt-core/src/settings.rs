//! Settings store seam: a flat string key/value store owned by the host.
//!
//! Local-IO only, so the trait stays synchronous.

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{RuntimeError, RuntimeResult};

pub trait SettingsStore: Send + Sync {
    /// Values for the requested keys; missing keys are absent from the map.
    fn get(&self, keys: &[&str]) -> RuntimeResult<HashMap<String, String>>;

    fn upsert(&self, key: &str, value: &str) -> RuntimeResult<()>;
}

/// In-memory store for tests and embedding hosts.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: Mutex::new(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()),
        }
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self, keys: &[&str]) -> RuntimeResult<HashMap<String, String>> {
        let guard = self
            .values
            .lock()
            .map_err(|_| RuntimeError::Settings("settings lock poisoned".into()))?;
        Ok(keys
            .iter()
            .filter_map(|k| guard.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect())
    }

    fn upsert(&self, key: &str, value: &str) -> RuntimeResult<()> {
        let mut guard = self
            .values
            .lock()
            .map_err(|_| RuntimeError::Settings("settings lock poisoned".into()))?;
        guard.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// JSON object file (`settings.json`), rewritten atomically on every upsert.
#[derive(Debug)]
pub struct JsonFileSettingsStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> RuntimeResult<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            RuntimeError::Settings(format!("failed to read {}: {}", self.path.display(), e))
        })?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content).map_err(|e| {
            RuntimeError::Settings(format!("failed to parse {}: {}", self.path.display(), e))
        })
    }

    fn save(&self, values: &BTreeMap<String, String>) -> RuntimeResult<()> {
        let io_err =
            |e: std::io::Error| RuntimeError::Settings(format!("{}: {}", self.path.display(), e));
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir).map_err(io_err)?;
        let data = serde_json::to_string_pretty(values)
            .map_err(|e| RuntimeError::Settings(e.to_string()))?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
        tmp.write_all(data.as_bytes()).map_err(io_err)?;
        tmp.write_all(b"\n").map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;
        Ok(())
    }
}

impl SettingsStore for JsonFileSettingsStore {
    fn get(&self, keys: &[&str]) -> RuntimeResult<HashMap<String, String>> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| RuntimeError::Settings("settings lock poisoned".into()))?;
        let values = self.load()?;
        Ok(keys
            .iter()
            .filter_map(|k| values.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect())
    }

    fn upsert(&self, key: &str, value: &str) -> RuntimeResult<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| RuntimeError::Settings("settings lock poisoned".into()))?;
        let mut values = self.load()?;
        values.insert(key.to_string(), value.to_string());
        self.save(&values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemorySettingsStore::with_values([("a", "1")]);
        store.upsert("b", "2").unwrap();
        let got = store.get(&["a", "b", "missing"]).unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got["b"], "2");
    }

    #[test]
    fn test_json_file_store_persists_across_instances() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("nested").join("settings.json");
        let store = JsonFileSettingsStore::new(&path);
        assert!(store.get(&["python.index_url"]).unwrap().is_empty());
        store.upsert("python.index_url", "https://x.example.com/simple").unwrap();
        store.upsert("python.manual_packages", "[\"numpy\"]").unwrap();

        let reopened = JsonFileSettingsStore::new(&path);
        let got = reopened.get(&["python.index_url", "python.manual_packages"]).unwrap();
        assert_eq!(got["python.index_url"], "https://x.example.com/simple");
        assert_eq!(got["python.manual_packages"], "[\"numpy\"]");
    }

    #[test]
    fn test_json_file_store_reports_corruption() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        let store = JsonFileSettingsStore::new(&path);
        let err = store.get(&["x"]).unwrap_err();
        assert_eq!(err.code(), "SETTINGS_ERROR");
    }
}
