//! Skill registry seam. The registry (install-from-repo, versioning, activation)
//! belongs to the host; the runtime only reads which skills are active and
//! what their active version's manifest declares.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{RuntimeError, RuntimeResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillVersionRecord {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub activated_at: Option<DateTime<Utc>>,
    /// Raw manifest JSON text
    #[serde(default)]
    pub manifest: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillRecord {
    pub id: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub name: String,
    /// Whether the skill itself is active
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub default_version_id: Option<String>,
    #[serde(default)]
    pub versions: Vec<SkillVersionRecord>,
}

impl SkillRecord {
    /// The version whose manifest counts: the default version if it is itself
    /// active, otherwise the most recently activated active version.
    pub fn active_version(&self) -> Option<&SkillVersionRecord> {
        if let Some(ref default_id) = self.default_version_id {
            if let Some(v) = self.versions.iter().find(|v| &v.id == default_id && v.active) {
                return Some(v);
            }
        }
        self.versions
            .iter()
            .filter(|v| v.active)
            .max_by_key(|v| v.activated_at)
    }
}

pub trait SkillRegistry: Send + Sync {
    /// Skills that are currently active, with their versions.
    fn active_skills(&self) -> RuntimeResult<Vec<SkillRecord>>;
}

/// Fixed list held in memory; inactive records are filtered out on read.
#[derive(Debug, Default, Clone)]
pub struct StaticSkillRegistry {
    skills: Vec<SkillRecord>,
}

impl StaticSkillRegistry {
    pub fn new(skills: Vec<SkillRecord>) -> Self {
        Self { skills }
    }
}

impl SkillRegistry for StaticSkillRegistry {
    fn active_skills(&self) -> RuntimeResult<Vec<SkillRecord>> {
        Ok(self.skills.iter().filter(|s| s.enabled).cloned().collect())
    }
}

#[derive(Debug, Default, Deserialize)]
struct SkillsFile {
    #[serde(default)]
    skills: Vec<SkillRecord>,
}

/// Reads `skills.json` (`{"skills": [...]}`) on every call. A missing file means no skills.
#[derive(Debug, Clone)]
pub struct JsonFileSkillRegistry {
    path: PathBuf,
}

impl JsonFileSkillRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SkillRegistry for JsonFileSkillRegistry {
    fn active_skills(&self) -> RuntimeResult<Vec<SkillRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            RuntimeError::Registry(format!("failed to read {}: {}", self.path.display(), e))
        })?;
        let file: SkillsFile = serde_json::from_str(&content).map_err(|e| {
            RuntimeError::Registry(format!("failed to parse {}: {}", self.path.display(), e))
        })?;
        Ok(file.skills.into_iter().filter(|s| s.enabled).collect())
    }
}
