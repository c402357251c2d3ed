//! Runtime status snapshot.

use serde::Serialize;
use serde_json::Value;

use skillrt_core::error::{RuntimeError, RuntimeResult};
use skillrt_core::indexes::IndexConfig;
use skillrt_core::skill::{ActiveDependencyItem, ConflictItem};
use skillrt_sandbox::{EnvironmentPaths, InstalledPackage};

use crate::dependencies::analyze_conflicts;
use crate::RuntimeService;

/// Why the environment is not ready.
#[derive(Debug, Clone, Serialize)]
pub struct StatusIssue {
    pub code: String,
    pub message: String,
    pub details: Option<Value>,
}

impl From<&RuntimeError> for StatusIssue {
    fn from(err: &RuntimeError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
            details: err.details(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeStatus {
    pub paths: EnvironmentPaths,
    pub ready: bool,
    pub issue: Option<StatusIssue>,
    pub indexes: IndexConfig,
    pub manual_packages: Vec<String>,
    pub installed_packages: Vec<InstalledPackage>,
    pub active_dependencies: Vec<ActiveDependencyItem>,
    pub conflicts: Vec<ConflictItem>,
}

impl RuntimeService {
    /// Snapshot of the environment. A bootstrap that cannot get pip working
    /// yields `ready: false` with the issue instead of an error.
    pub async fn get_runtime_status(&self) -> RuntimeResult<RuntimeStatus> {
        let indexes = self.get_indexes()?;
        let manual_packages = self.manual_packages()?.into_iter().collect();
        let active_dependencies = self.collect_active_dependencies()?;
        let conflicts = analyze_conflicts(&active_dependencies);

        let bootstrap = self.env.ensure_managed_runtime().await;
        let (paths, ready, issue, installed_packages) = match bootstrap {
            Ok(paths) => {
                let installed = self.env.pip(&paths).list().await?;
                (paths, true, None, installed)
            }
            Err(e) if e.is_degraded_environment() => {
                tracing::warn!(code = e.code(), "Managed runtime not ready: {}", e);
                (self.paths(), false, Some(StatusIssue::from(&e)), Vec::new())
            }
            Err(e) => return Err(e),
        };

        Ok(RuntimeStatus {
            paths,
            ready,
            issue,
            indexes,
            manual_packages,
            installed_packages,
            active_dependencies,
            conflicts,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::installer::InstallRequest;
    use crate::testing::{skill, FakePython, Harness};

    #[tokio::test]
    async fn test_ready_status_reports_everything() {
        let h = Harness::new(vec![
            skill("A", &["numpy==2.1.0"]),
            skill("B", &["numpy==2.0.0"]),
        ]);
        h.service
            .install_requirements(InstallRequest::manual(vec!["six==1.16.0".into()]))
            .await
            .unwrap();
        let status = h.service.get_runtime_status().await.unwrap();
        assert!(status.ready);
        assert!(status.issue.is_none());
        assert_eq!(status.manual_packages, vec!["six"]);
        assert_eq!(status.installed_packages[0].name, "six");
        assert_eq!(status.active_dependencies.len(), 2);
        assert_eq!(status.conflicts.len(), 1);
        let json = serde_json::to_value(&status).unwrap();
        assert!(json["paths"]["python"].as_str().unwrap().ends_with("python"));
        assert_eq!(json["indexes"]["autoInstallOnMissing"], true);
    }

    #[tokio::test]
    async fn test_broken_pip_degrades_instead_of_failing() {
        let h = Harness::with_fake(Vec::new(), FakePython::new().with_broken_pip());
        let status = h.service.get_runtime_status().await.unwrap();
        assert!(!status.ready);
        let issue = status.issue.unwrap();
        assert_eq!(issue.code, "PACKAGE_MANAGER_UNAVAILABLE");
        assert!(issue.details.unwrap()["attempts"].as_array().unwrap().len() >= 3);
        assert!(status.installed_packages.is_empty());
    }
}
