//! Error taxonomy shared by every skillrt crate.
//!
//! Each variant maps to one stable machine code (`code()`), a suggested HTTP
//! status (`http_status()`) and an optional structured payload (`details()`),
//! so callers branch on kind instead of message text.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::skill::ActiveDependencyItem;

/// Output captured from one subprocess step, attached to environment and
/// package-manager failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDiagnostic {
    /// Logical step, e.g. "create_venv", "recreate_venv", "ensurepip", "pip_install"
    pub step: String,
    /// Rendered command line
    pub command: String,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl StepDiagnostic {
    /// Diagnostic for a step that never produced a process (spawn failure, timeout).
    pub fn failed_to_run(step: &str, command: &str, reason: &str) -> Self {
        Self {
            step: step.to_string(),
            command: command.to_string(),
            exit_code: None,
            stdout: String::new(),
            stderr: reason.to_string(),
        }
    }

    /// Last non-empty stderr line (or stdout line), used in one-line messages.
    pub fn summary(&self) -> String {
        let pick = |s: &str| {
            s.lines()
                .rev()
                .map(str::trim)
                .find(|l| !l.is_empty())
                .map(String::from)
        };
        pick(&self.stderr)
            .or_else(|| pick(&self.stdout))
            .unwrap_or_else(|| match self.exit_code {
                Some(code) => format!("exit code {}", code),
                None => "no exit code".to_string(),
            })
    }
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("invalid requirement '{requirement}': {reason}")]
    InvalidRequirement { requirement: String, reason: String },

    #[error("no requirements given")]
    EmptyRequirements,

    #[error("no packages given")]
    EmptyPackages,

    #[error("invalid package name '{name}'")]
    InvalidPackageName { name: String },

    #[error("invalid index configuration ({field}): {reason}")]
    InvalidIndexConfig { field: String, reason: String },

    #[error("failed to create the managed Python environment: {message}")]
    EnvCreateFailed {
        message: String,
        attempts: Vec<StepDiagnostic>,
    },

    #[error("pip is unavailable in the managed environment after recreate and ensurepip repairs")]
    PackageManagerUnavailable { attempts: Vec<StepDiagnostic> },

    #[error("failed to spawn `{command}`: {reason}")]
    CommandSpawnFailed { command: String, reason: String },

    #[error("`{command}` timed out after {timeout_ms} ms")]
    CommandTimeout { command: String, timeout_ms: u64 },

    #[error("package installation failed: {}", .diagnostic.summary())]
    InstallFailed { diagnostic: StepDiagnostic },

    #[error("package uninstall failed: {}", .diagnostic.summary())]
    UninstallFailed { diagnostic: StepDiagnostic },

    #[error("environment consistency check failed: {}", .diagnostic.summary())]
    ConsistencyCheckFailed { diagnostic: StepDiagnostic },

    #[error("package(s) still required by active skills: {}", .packages.join(", "))]
    PackageInUse {
        packages: Vec<String>,
        blocked: Vec<ActiveDependencyItem>,
    },

    #[error("invalid snippet: {reason}")]
    InvalidSnippet { reason: String },

    #[error("unreadable installed-package listing: {reason}")]
    InvalidListing { reason: String },

    #[error("failed to {context}: {reason}")]
    Io { context: String, reason: String },

    #[error("settings store error: {0}")]
    Settings(String),

    #[error("skill registry error: {0}")]
    Registry(String),
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;

impl RuntimeError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequirement { .. } => "INVALID_REQUIREMENT",
            Self::EmptyRequirements => "EMPTY_REQUIREMENTS",
            Self::EmptyPackages => "EMPTY_PACKAGES",
            Self::InvalidPackageName { .. } => "INVALID_PACKAGE_NAME",
            Self::InvalidIndexConfig { .. } => "INVALID_INDEX_CONFIG",
            Self::EnvCreateFailed { .. } => "ENV_CREATE_FAILED",
            Self::PackageManagerUnavailable { .. } => "PACKAGE_MANAGER_UNAVAILABLE",
            Self::CommandSpawnFailed { .. } => "COMMAND_SPAWN_FAILED",
            Self::CommandTimeout { .. } => "COMMAND_TIMEOUT",
            Self::InstallFailed { .. } => "INSTALL_FAILED",
            Self::UninstallFailed { .. } => "UNINSTALL_FAILED",
            Self::ConsistencyCheckFailed { .. } => "CONSISTENCY_CHECK_FAILED",
            Self::PackageInUse { .. } => "PACKAGE_IN_USE",
            Self::InvalidSnippet { .. } => "INVALID_SNIPPET",
            Self::InvalidListing { .. } => "INVALID_LISTING",
            Self::Io { .. } => "IO_ERROR",
            Self::Settings(_) => "SETTINGS_ERROR",
            Self::Registry(_) => "REGISTRY_ERROR",
        }
    }

    /// Suggested HTTP status for the boundary layer.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidRequirement { .. }
            | Self::EmptyRequirements
            | Self::EmptyPackages
            | Self::InvalidPackageName { .. }
            | Self::InvalidIndexConfig { .. }
            | Self::InvalidSnippet { .. } => 400,
            Self::PackageInUse { .. } => 409,
            Self::EnvCreateFailed { .. } | Self::PackageManagerUnavailable { .. } => 503,
            Self::CommandTimeout { .. } => 504,
            _ => 500,
        }
    }

    /// Structured payload for the caller, if the kind carries one.
    pub fn details(&self) -> Option<Value> {
        match self {
            Self::InvalidRequirement { requirement, reason } => {
                Some(json!({ "requirement": requirement, "reason": reason }))
            }
            Self::InvalidPackageName { name } => Some(json!({ "name": name })),
            Self::InvalidIndexConfig { field, reason } => {
                Some(json!({ "field": field, "reason": reason }))
            }
            Self::EnvCreateFailed { attempts, .. }
            | Self::PackageManagerUnavailable { attempts } => {
                Some(json!({ "attempts": attempts }))
            }
            Self::CommandSpawnFailed { command, reason } => {
                Some(json!({ "command": command, "reason": reason }))
            }
            Self::CommandTimeout {
                command,
                timeout_ms,
            } => Some(json!({ "command": command, "timeout_ms": timeout_ms })),
            Self::InstallFailed { diagnostic }
            | Self::UninstallFailed { diagnostic }
            | Self::ConsistencyCheckFailed { diagnostic } => {
                Some(json!({ "diagnostic": diagnostic }))
            }
            Self::Io { context, reason } => Some(json!({ "context": context, "reason": reason })),
            Self::PackageInUse { packages, blocked } => {
                Some(json!({ "packages": packages, "blocked": blocked }))
            }
            _ => None,
        }
    }

    /// Bootstrap failures that status queries report as "not ready" instead of failing.
    pub fn is_degraded_environment(&self) -> bool {
        matches!(
            self,
            Self::EnvCreateFailed { .. }
                | Self::PackageManagerUnavailable { .. }
                | Self::CommandTimeout { .. }
                | Self::CommandSpawnFailed { .. }
        )
    }

    /// `{ code, message, details }` object for JSON boundaries.
    pub fn to_json(&self) -> Value {
        json!({
            "code": self.code(),
            "message": self.to_string(),
            "details": self.details(),
        })
    }
}
