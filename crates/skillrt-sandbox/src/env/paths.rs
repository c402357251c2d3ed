//! Filesystem layout of the managed runtime, computed from config. Never persisted.

use serde::Serialize;
use std::path::PathBuf;

use skillrt_core::config::{Platform, RuntimeConfig};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentPaths {
    pub data_root: PathBuf,
    /// `<data root>/runtime/python`
    pub runtime_root: PathBuf,
    /// `<runtime root>/venv`
    pub venv_dir: PathBuf,
    /// Interpreter inside the venv
    pub python: PathBuf,
}

impl EnvironmentPaths {
    pub fn resolve(config: &RuntimeConfig) -> Self {
        let runtime_root = config.data_root.join("runtime").join("python");
        let venv_dir = runtime_root.join("venv");
        let python = interpreter_path(&venv_dir, config.platform);
        Self {
            data_root: config.data_root.clone(),
            runtime_root,
            venv_dir,
            python,
        }
    }

    pub fn python_str(&self) -> String {
        self.python.to_string_lossy().into_owned()
    }
}

fn interpreter_path(venv_dir: &std::path::Path, platform: Platform) -> PathBuf {
    if platform.is_windows() {
        venv_dir.join("Scripts").join("python.exe")
    } else {
        venv_dir.join("bin").join("python")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_per_platform() {
        let mut cfg = RuntimeConfig::with_data_root("/data");
        cfg.platform = Platform::Linux;
        let p = EnvironmentPaths::resolve(&cfg);
        assert_eq!(p.venv_dir, PathBuf::from("/data/runtime/python/venv"));
        assert_eq!(p.python, PathBuf::from("/data/runtime/python/venv/bin/python"));

        cfg.platform = Platform::Windows;
        let p = EnvironmentPaths::resolve(&cfg);
        assert!(p.python.ends_with("Scripts/python.exe"));
    }
}
