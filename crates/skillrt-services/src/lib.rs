//! skillrt service layer.
//!
//! `RuntimeService` owns the managed environment and is the only writer to it.
//! Install, uninstall and reconcile pass through one `MutationQueue`; status and
//! listing queries do not and may observe a mutation in progress. Operations are
//! spread over the submodules as `impl RuntimeService` blocks.

pub mod cleanup;
pub mod dependencies;
pub mod indexes;
pub mod installer;
pub mod queue;
pub mod snippet;
pub mod status;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use skillrt_core::config::RuntimeConfig;
use skillrt_core::settings::SettingsStore;
use skillrt_core::skill::SkillRegistry;
use skillrt_sandbox::{CommandRunner, EnvironmentBuilder, EnvironmentPaths};

pub use cleanup::{CleanupExecution, CleanupInput, CleanupPlan, KeptByActive};
pub use dependencies::analyze_conflicts;
pub use installer::{InstallRequest, InstallSource, ReconcileResult, SkillContext};
pub use queue::MutationQueue;
pub use snippet::{SnippetRequest, SnippetResult, SnippetRunner};
pub use status::{RuntimeStatus, StatusIssue};

pub struct RuntimeService {
    env: EnvironmentBuilder,
    settings: Arc<dyn SettingsStore>,
    registry: Arc<dyn SkillRegistry>,
    queue: MutationQueue,
}

impl RuntimeService {
    pub fn new(
        config: RuntimeConfig,
        runner: Arc<dyn CommandRunner>,
        settings: Arc<dyn SettingsStore>,
        registry: Arc<dyn SkillRegistry>,
    ) -> Self {
        Self {
            env: EnvironmentBuilder::new(config, runner),
            settings,
            registry,
            queue: MutationQueue::new(),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        self.env.config()
    }

    /// Layout of the managed environment (computed, no I/O).
    pub fn paths(&self) -> EnvironmentPaths {
        self.env.paths()
    }

    /// Bootstrap or repair the managed environment.
    pub async fn ensure_managed_runtime(&self) -> skillrt_core::RuntimeResult<EnvironmentPaths> {
        self.env.ensure_managed_runtime().await
    }
}
