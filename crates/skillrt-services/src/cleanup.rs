//! Package cleanup after a skill is removed.
//!
//! Every package the removed skill declared lands in exactly one bucket:
//! still needed by another active skill, kept because an administrator
//! installed it, or removable.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use skillrt_core::requirement::parse_requirements_lenient;
use skillrt_core::skill::{ActiveDependencyItem, ConflictContributor};
use skillrt_core::RuntimeResult;

use crate::dependencies::collect_active_dependencies;
use crate::RuntimeService;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupInput {
    /// Requirements the removed skill declared
    pub requirements: Vec<String>,
    /// Skills to leave out of the active set (the one being removed, while still registered)
    #[serde(default)]
    pub exclude_skill_ids: Vec<String>,
}

/// A removed-skill package still required elsewhere, with who requires it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeptByActive {
    pub package: String,
    pub contributors: Vec<ConflictContributor>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupPlan {
    pub removed_skill_packages: Vec<String>,
    pub kept_by_active_skills: Vec<String>,
    pub kept_by_active_details: Vec<KeptByActive>,
    pub kept_by_manual: Vec<String>,
    pub removable: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupExecution {
    #[serde(flatten)]
    pub plan: CleanupPlan,
    pub removed_packages: Vec<String>,
}

/// Partition `removed` (normalized names) against the active set and manual set.
pub fn plan_cleanup(
    removed: &BTreeSet<String>,
    active: &[ActiveDependencyItem],
    manual: &BTreeSet<String>,
) -> CleanupPlan {
    let mut by_package: BTreeMap<&str, BTreeSet<ConflictContributor>> = BTreeMap::new();
    for item in active {
        by_package
            .entry(item.package.as_str())
            .or_default()
            .insert(ConflictContributor::from(item));
    }

    let mut plan = CleanupPlan {
        removed_skill_packages: removed.iter().cloned().collect(),
        ..CleanupPlan::default()
    };
    for package in removed {
        if let Some(contributors) = by_package.get(package.as_str()) {
            // Set order is skill, then version, then requirement.
            plan.kept_by_active_skills.push(package.clone());
            plan.kept_by_active_details.push(KeptByActive {
                package: package.clone(),
                contributors: contributors.iter().cloned().collect(),
            });
        } else if manual.contains(package) {
            plan.kept_by_manual.push(package.clone());
        } else {
            plan.removable.push(package.clone());
        }
    }
    plan
}

impl RuntimeService {
    fn build_cleanup_plan(&self, input: &CleanupInput) -> RuntimeResult<CleanupPlan> {
        let removed: BTreeSet<String> = parse_requirements_lenient(&input.requirements)
            .into_iter()
            .map(|e| e.name)
            .collect();
        if removed.is_empty() {
            return Ok(CleanupPlan::default());
        }
        let active = collect_active_dependencies(self.registry.as_ref(), &input.exclude_skill_ids)?;
        let manual = self.manual_packages()?;
        Ok(plan_cleanup(&removed, &active, &manual))
    }

    /// Read-only plan.
    pub fn preview_cleanup_after_skill_removal(
        &self,
        input: &CleanupInput,
    ) -> RuntimeResult<CleanupPlan> {
        self.build_cleanup_plan(input)
    }

    /// Plan, then uninstall exactly the removable bucket.
    pub async fn cleanup_packages_after_skill_removal(
        &self,
        input: &CleanupInput,
    ) -> RuntimeResult<CleanupExecution> {
        self.queue.run(self.cleanup_locked(input)).await
    }

    // Planned inside the queue so the plan reflects every earlier mutation.
    async fn cleanup_locked(&self, input: &CleanupInput) -> RuntimeResult<CleanupExecution> {
        let plan = self.build_cleanup_plan(input)?;
        if plan.removable.is_empty() {
            return Ok(CleanupExecution {
                plan,
                removed_packages: Vec::new(),
            });
        }
        let targets: BTreeSet<String> = plan.removable.iter().cloned().collect();
        self.uninstall_locked(&targets, "skill_removed").await?;
        Ok(CleanupExecution {
            removed_packages: plan.removable.clone(),
            plan,
        })
    }
}
