//! Install, uninstall and reconcile against the managed environment.
//!
//! Every mutation runs inside the mutation queue and ends with `pip check`.
//! Validation and the in-use guard run before anything is queued, so rejected
//! calls never spawn a process.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use skillrt_core::error::{RuntimeError, RuntimeResult};
use skillrt_core::observability;
use skillrt_core::requirement::{normalize_package_name, parse_requirements, RequirementEntry};
use skillrt_core::skill::{ActiveDependencyItem, ConflictItem};
use skillrt_sandbox::{info_log, InstalledPackage};

use crate::dependencies::{analyze_conflicts, collect_active_dependencies};
use crate::RuntimeService;

/// Who asked for the install. Only manual installs touch the manual package set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallSource {
    Manual,
    Automatic,
}

impl InstallSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Automatic => "automatic",
        }
    }
}

/// Skill on whose behalf an automatic install runs (activation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillContext {
    pub skill_id: String,
    #[serde(default)]
    pub version_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallRequest {
    pub requirements: Vec<String>,
    pub source: InstallSource,
    #[serde(default)]
    pub skill: Option<SkillContext>,
}

impl InstallRequest {
    pub fn manual(requirements: Vec<String>) -> Self {
        Self {
            requirements,
            source: InstallSource::Manual,
            skill: None,
        }
    }

    pub fn automatic(requirements: Vec<String>, skill: Option<SkillContext>) -> Self {
        Self {
            requirements,
            source: InstallSource::Automatic,
            skill,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileResult {
    /// Distinct raw requirements that were installed
    pub requirements: Vec<String>,
    pub installed_packages: Vec<InstalledPackage>,
    pub conflicts: Vec<ConflictItem>,
}

impl RuntimeService {
    pub async fn install_requirements(
        &self,
        request: InstallRequest,
    ) -> RuntimeResult<Vec<InstalledPackage>> {
        if request.requirements.is_empty() {
            return Err(RuntimeError::EmptyRequirements);
        }
        let entries = parse_requirements(&request.requirements)?;
        self.queue
            .run(self.install_locked(&entries, &request))
            .await
    }

    async fn install_locked(
        &self,
        entries: &[RequirementEntry],
        request: &InstallRequest,
    ) -> RuntimeResult<Vec<InstalledPackage>> {
        let paths = self.env.ensure_managed_runtime().await?;
        let pip = self.env.pip(&paths);
        let index = self.get_indexes()?;
        let raws: Vec<String> = entries.iter().map(|e| e.raw.clone()).collect();

        info_log!(
            source = request.source.as_str(),
            "Installing {} requirement(s): {}",
            raws.len(),
            raws.join(" ")
        );
        pip.install(&index, &raws).await?;
        pip.check().await?;

        if request.source == InstallSource::Manual {
            let mut manual = self.manual_packages()?;
            manual.extend(entries.iter().map(|e| e.name.clone()));
            self.save_manual_packages(&manual)?;
        }
        observability::audit_packages_installed(
            &raws,
            request.source.as_str(),
            request.skill.as_ref().map(|s| s.skill_id.as_str()),
        );
        pip.list().await
    }

    /// Uninstall by package name. Names required by an active skill are refused
    /// with `PackageInUse`, even when they are also manual packages.
    pub async fn uninstall_packages(
        &self,
        names: Vec<String>,
    ) -> RuntimeResult<Vec<InstalledPackage>> {
        let packages = normalize_targets(&names)?;
        let active = collect_active_dependencies(self.registry.as_ref(), &[])?;
        guard_not_in_use(&packages, &active)?;
        self.queue
            .run(self.uninstall_locked(&packages, "manual"))
            .await
    }

    /// Uninstall without the in-use guard; callers have already partitioned.
    pub(crate) async fn uninstall_locked(
        &self,
        packages: &BTreeSet<String>,
        reason: &str,
    ) -> RuntimeResult<Vec<InstalledPackage>> {
        let paths = self.env.ensure_managed_runtime().await?;
        let pip = self.env.pip(&paths);
        let names: Vec<String> = packages.iter().cloned().collect();

        info_log!("Uninstalling {}", names.join(" "));
        pip.uninstall(&names).await?;
        pip.check().await?;

        let mut manual = self.manual_packages()?;
        let before = manual.len();
        manual.retain(|p| !packages.contains(p));
        if manual.len() != before {
            self.save_manual_packages(&manual)?;
        }
        observability::audit_packages_uninstalled(&names, reason);
        pip.list().await
    }

    /// Install the union of every active skill's requirements in one pip call.
    pub async fn reconcile(&self) -> RuntimeResult<ReconcileResult> {
        self.queue.run(self.reconcile_locked()).await
    }

    async fn reconcile_locked(&self) -> RuntimeResult<ReconcileResult> {
        let active = collect_active_dependencies(self.registry.as_ref(), &[])?;
        let requirements: Vec<String> = active
            .iter()
            .map(|i| i.requirement.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let paths = self.env.ensure_managed_runtime().await?;
        let pip = self.env.pip(&paths);
        if requirements.is_empty() {
            tracing::debug!("No active skill requirements; skipping install");
        } else {
            info_log!("Reconciling {} active requirement(s)", requirements.len());
            let index = self.get_indexes()?;
            pip.install(&index, &requirements).await?;
        }
        pip.check().await?;

        let conflicts = analyze_conflicts(&active);
        observability::audit_environment_reconciled(requirements.len(), conflicts.len());
        Ok(ReconcileResult {
            requirements,
            installed_packages: pip.list().await?,
            conflicts,
        })
    }

    /// Current listing; bypasses the mutation queue.
    pub async fn list_installed_packages(&self) -> RuntimeResult<Vec<InstalledPackage>> {
        let paths = self.env.ensure_managed_runtime().await?;
        self.env.pip(&paths).list().await
    }
}

fn normalize_targets(names: &[String]) -> RuntimeResult<BTreeSet<String>> {
    let packages = names
        .iter()
        .filter(|n| !n.trim().is_empty())
        .map(|n| normalize_package_name(n))
        .collect::<RuntimeResult<BTreeSet<String>>>()?;
    if packages.is_empty() {
        return Err(RuntimeError::EmptyPackages);
    }
    Ok(packages)
}

fn guard_not_in_use(
    packages: &BTreeSet<String>,
    active: &[ActiveDependencyItem],
) -> RuntimeResult<()> {
    let blocked: Vec<ActiveDependencyItem> = active
        .iter()
        .filter(|i| packages.contains(&i.package))
        .cloned()
        .collect();
    if blocked.is_empty() {
        return Ok(());
    }
    let in_use: BTreeSet<String> = blocked.iter().map(|i| i.package.clone()).collect();
    Err(RuntimeError::PackageInUse {
        packages: in_use.into_iter().collect(),
        blocked,
    })
}
