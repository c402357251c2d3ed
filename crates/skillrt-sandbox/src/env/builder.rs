//! Self-healing bootstrap of the managed Python venv.
//!
//! Create once from the first working bootstrap interpreter, then verify pip
//! answers a version probe. A broken pip is repaired in two steps: recreate the
//! venv with `--clear`, then `ensurepip --upgrade`. Only when both fail is the
//! environment reported unusable, with every step's output attached.

use std::sync::Arc;

use skillrt_core::config::RuntimeConfig;
use skillrt_core::error::{RuntimeError, RuntimeResult, StepDiagnostic};
use skillrt_core::observability;
use tokio::sync::Mutex;

use super::paths::EnvironmentPaths;
use crate::info_log;
use crate::pip::PipClient;
use crate::process::{render_command, CommandRunner, RunOptions};

/// One interpreter command able to run `-m venv` (program plus leading args, e.g. `py -3`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl BootstrapCommand {
    fn parse(s: &str) -> Option<Self> {
        let mut parts = s.split_whitespace().map(String::from);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }
}

/// Ordered candidate list: the override alone when set, else platform fallbacks.
pub fn bootstrap_candidates(config: &RuntimeConfig) -> Vec<BootstrapCommand> {
    if let Some(cmd) = config
        .bootstrap_override
        .as_deref()
        .and_then(BootstrapCommand::parse)
    {
        return vec![cmd];
    }
    let defaults: &[&str] = if config.platform.is_windows() {
        &["py -3", "python"]
    } else {
        &["python3", "python"]
    };
    defaults
        .iter()
        .filter_map(|s| BootstrapCommand::parse(s))
        .collect()
}

/// Candidates found on PATH; all of them when none resolves.
fn available_candidates(config: &RuntimeConfig) -> Vec<BootstrapCommand> {
    let all = bootstrap_candidates(config);
    if config.bootstrap_override.is_some() {
        return all;
    }
    let found: Vec<BootstrapCommand> = all
        .iter()
        .filter(|c| which::which(&c.program).is_ok())
        .cloned()
        .collect();
    if found.is_empty() {
        all
    } else {
        found
    }
}

pub struct EnvironmentBuilder {
    config: RuntimeConfig,
    runner: Arc<dyn CommandRunner>,
    // Status queries bootstrap outside the mutation queue; keep one bootstrap at a time.
    lock: Mutex<()>,
}

impl EnvironmentBuilder {
    pub fn new(config: RuntimeConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            config,
            runner,
            lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn runner(&self) -> Arc<dyn CommandRunner> {
        Arc::clone(&self.runner)
    }

    pub fn paths(&self) -> EnvironmentPaths {
        EnvironmentPaths::resolve(&self.config)
    }

    /// pip client bound to the managed interpreter.
    pub fn pip(&self, paths: &EnvironmentPaths) -> PipClient {
        PipClient::new(self.runner(), paths.python.clone(), self.config.timeouts)
    }

    /// Make sure the venv exists and pip works, repairing it if needed.
    pub async fn ensure_managed_runtime(&self) -> RuntimeResult<EnvironmentPaths> {
        let _guard = self.lock.lock().await;
        let paths = self.paths();

        tokio::fs::create_dir_all(&paths.runtime_root)
            .await
            .map_err(|e| RuntimeError::EnvCreateFailed {
                message: format!("failed to create {}: {}", paths.runtime_root.display(), e),
                attempts: Vec::new(),
            })?;

        if !tokio::fs::try_exists(&paths.python).await.unwrap_or(false) {
            info_log!("Creating managed Python environment at {}", paths.venv_dir.display());
            self.create_venv(&paths, false)
                .await
                .map_err(|attempts| RuntimeError::EnvCreateFailed {
                    message: "no bootstrap interpreter could create the environment".to_string(),
                    attempts,
                })?;
        }

        let mut attempts = Vec::new();
        match self.probe(&paths).await {
            Ok(()) => return Ok(paths),
            Err(d) => attempts.push(d),
        }

        tracing::warn!(
            venv = %paths.venv_dir.display(),
            "pip probe failed; recreating environment"
        );
        match self.create_venv(&paths, true).await {
            Ok(()) => match self.probe(&paths).await {
                Ok(()) => {
                    observability::audit_environment_repaired("recreate_venv", true);
                    return Ok(paths);
                }
                Err(d) => attempts.push(d),
            },
            Err(mut failed) => attempts.append(&mut failed),
        }
        observability::audit_environment_repaired("recreate_venv", false);

        tracing::warn!(
            venv = %paths.venv_dir.display(),
            "pip still unavailable; running ensurepip"
        );
        let args = vec![
            "-m".to_string(),
            "ensurepip".to_string(),
            "--upgrade".to_string(),
        ];
        let python = paths.python_str();
        let command = render_command(&python, &args);
        let opts = RunOptions::with_timeout(self.config.timeouts.venv);
        match self.runner.run(&python, &args, opts).await {
            Ok(r) if r.ok() => match self.probe(&paths).await {
                Ok(()) => {
                    observability::audit_environment_repaired("ensurepip", true);
                    return Ok(paths);
                }
                Err(d) => attempts.push(d),
            },
            Ok(r) => attempts.push(r.diagnostic("ensurepip", &command)),
            Err(e) => attempts.push(StepDiagnostic::failed_to_run(
                "ensurepip",
                &command,
                &e.to_string(),
            )),
        }
        observability::audit_environment_repaired("ensurepip", false);

        Err(RuntimeError::PackageManagerUnavailable { attempts })
    }

    async fn probe(&self, paths: &EnvironmentPaths) -> Result<(), StepDiagnostic> {
        let pip = self.pip(paths);
        let command = pip.render(&pip.version_args());
        match pip.version().await {
            Ok(r) if r.ok() => Ok(()),
            Ok(r) => Err(r.diagnostic("pip_probe", &command)),
            Err(e) => Err(StepDiagnostic::failed_to_run(
                "pip_probe",
                &command,
                &e.to_string(),
            )),
        }
    }

    /// Try each candidate in order until one exits zero.
    async fn create_venv(
        &self,
        paths: &EnvironmentPaths,
        clear: bool,
    ) -> Result<(), Vec<StepDiagnostic>> {
        let step = if clear { "recreate_venv" } else { "create_venv" };
        let mut failures = Vec::new();
        for candidate in available_candidates(&self.config) {
            let mut args = candidate.args.clone();
            args.push("-m".to_string());
            args.push("venv".to_string());
            if clear {
                args.push("--clear".to_string());
            }
            args.push(paths.venv_dir.to_string_lossy().into_owned());
            let command = render_command(&candidate.program, &args);
            let opts = RunOptions::with_timeout(self.config.timeouts.venv);
            match self.runner.run(&candidate.program, &args, opts).await {
                Ok(r) if r.ok() => {
                    info_log!("Created venv with {}", candidate.program);
                    return Ok(());
                }
                Ok(r) => {
                    tracing::debug!(command = %command, "venv bootstrap candidate failed");
                    failures.push(r.diagnostic(step, &command));
                }
                Err(e) => {
                    failures.push(StepDiagnostic::failed_to_run(step, &command, &e.to_string()))
                }
            }
        }
        Err(failures)
    }
}
