//! Active-dependency aggregation and conflict detection.
//!
//! Recomputed from the registry on every call. A skill with a malformed
//! manifest declares nothing, and a bad requirement string is skipped, so one
//! broken skill never hides the dependencies of the others.

use std::collections::{BTreeMap, BTreeSet};

use skillrt_core::requirement::parse_requirements_lenient;
use skillrt_core::skill::{
    declared_python_packages, ActiveDependencyItem, ConflictContributor, ConflictItem,
    SkillRegistry,
};
use skillrt_core::RuntimeResult;

use crate::RuntimeService;

/// Requirements declared by the active version of every active skill,
/// skipping `exclude_skill_ids`. Sorted by skill id, then package.
pub fn collect_active_dependencies(
    registry: &dyn SkillRegistry,
    exclude_skill_ids: &[String],
) -> RuntimeResult<Vec<ActiveDependencyItem>> {
    let mut items = Vec::new();
    for skill in registry.active_skills()? {
        if exclude_skill_ids.iter().any(|id| *id == skill.id) {
            continue;
        }
        let Some(version) = skill.active_version() else {
            continue;
        };
        let declared = declared_python_packages(version.manifest.as_deref());
        for entry in parse_requirements_lenient(&declared) {
            items.push(ActiveDependencyItem {
                skill_id: skill.id.clone(),
                skill_slug: skill.slug.clone(),
                skill_name: skill.name.clone(),
                version_id: version.id.clone(),
                version_label: version.label.clone(),
                requirement: entry.raw,
                package: entry.name,
            });
        }
    }
    items.sort_by(|a, b| {
        a.skill_id
            .cmp(&b.skill_id)
            .then_with(|| a.package.cmp(&b.package))
            .then_with(|| a.requirement.cmp(&b.requirement))
    });
    Ok(items)
}

/// Packages requested with more than one distinct requirement string, sorted by package.
pub fn analyze_conflicts(items: &[ActiveDependencyItem]) -> Vec<ConflictItem> {
    let mut groups: BTreeMap<&str, Vec<&ActiveDependencyItem>> = BTreeMap::new();
    for item in items {
        groups.entry(item.package.as_str()).or_default().push(item);
    }
    groups
        .into_iter()
        .filter_map(|(package, group)| {
            let requirements: BTreeSet<String> =
                group.iter().map(|i| i.requirement.clone()).collect();
            if requirements.len() < 2 {
                return None;
            }
            let contributors: BTreeSet<ConflictContributor> =
                group.into_iter().map(ConflictContributor::from).collect();
            Some(ConflictItem {
                package: package.to_string(),
                requirements,
                contributors: contributors.into_iter().collect(),
            })
        })
        .collect()
}

impl RuntimeService {
    pub fn collect_active_dependencies(&self) -> RuntimeResult<Vec<ActiveDependencyItem>> {
        collect_active_dependencies(self.registry.as_ref(), &[])
    }

    pub fn analyze_conflicts(&self, items: &[ActiveDependencyItem]) -> Vec<ConflictItem> {
        analyze_conflicts(items)
    }
}
