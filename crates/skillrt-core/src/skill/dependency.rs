use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A requirement declared by the active version of an active skill.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveDependencyItem {
    pub skill_id: String,
    pub skill_slug: String,
    pub skill_name: String,
    pub version_id: String,
    pub version_label: String,
    pub requirement: String,
    /// Normalized package identity
    pub package: String,
}

/// One (skill, version, requirement) contributor to a conflict or a kept package.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictContributor {
    pub skill_id: String,
    pub skill_slug: String,
    pub skill_name: String,
    pub version_id: String,
    pub version_label: String,
    pub requirement: String,
}

impl From<&ActiveDependencyItem> for ConflictContributor {
    fn from(item: &ActiveDependencyItem) -> Self {
        Self {
            skill_id: item.skill_id.clone(),
            skill_slug: item.skill_slug.clone(),
            skill_name: item.skill_name.clone(),
            version_id: item.version_id.clone(),
            version_label: item.version_label.clone(),
            requirement: item.requirement.clone(),
        }
    }
}

/// A package requested with two or more distinct requirement strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictItem {
    pub package: String,
    pub requirements: BTreeSet<String>,
    pub contributors: Vec<ConflictContributor>,
}
