//! pip invocations against the managed interpreter (`<python> -m pip ...`).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use skillrt_core::config::Timeouts;
use skillrt_core::error::{RuntimeError, RuntimeResult};
use skillrt_core::indexes::IndexConfig;
use skillrt_core::requirement::normalize_name;

use crate::process::{render_command, CommandResult, CommandRunner, RunOptions};

/// One row of `pip list --format=json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledPackage {
    pub name: String,
    pub version: String,
}

pub struct PipClient {
    runner: Arc<dyn CommandRunner>,
    python: PathBuf,
    timeouts: Timeouts,
}

impl PipClient {
    pub fn new(runner: Arc<dyn CommandRunner>, python: PathBuf, timeouts: Timeouts) -> Self {
        Self {
            runner,
            python,
            timeouts,
        }
    }

    fn python(&self) -> String {
        self.python.to_string_lossy().into_owned()
    }

    fn base_args(sub: &[&str]) -> Vec<String> {
        let mut args = vec![
            "-m".to_string(),
            "pip".to_string(),
            "--disable-pip-version-check".to_string(),
        ];
        args.extend(sub.iter().map(|s| s.to_string()));
        args
    }

    pub fn render(&self, args: &[String]) -> String {
        render_command(&self.python(), args)
    }

    async fn exec(&self, args: &[String], timeout: Duration) -> RuntimeResult<CommandResult> {
        self.runner
            .run(&self.python(), args, RunOptions::with_timeout(timeout))
            .await
    }

    pub fn version_args(&self) -> Vec<String> {
        Self::base_args(&["--version"])
    }

    /// Version probe; the caller decides what a non-zero exit means.
    pub async fn version(&self) -> RuntimeResult<CommandResult> {
        self.exec(&self.version_args(), self.timeouts.command).await
    }

    pub fn install_args(index: &IndexConfig, requirements: &[String]) -> Vec<String> {
        let mut args = Self::base_args(&["install", "--no-input"]);
        args.extend(index.to_pip_args());
        args.extend(requirements.iter().cloned());
        args
    }

    /// `pip install` with index flags; raw requirements are passed unchanged.
    pub async fn install(&self, index: &IndexConfig, requirements: &[String]) -> RuntimeResult<()> {
        let args = Self::install_args(index, requirements);
        let r = self.exec(&args, self.timeouts.install).await?;
        if !r.ok() {
            return Err(RuntimeError::InstallFailed {
                diagnostic: r.diagnostic("pip_install", &self.render(&args)),
            });
        }
        Ok(())
    }

    pub async fn uninstall(&self, names: &[String]) -> RuntimeResult<()> {
        let mut args = Self::base_args(&["uninstall", "-y"]);
        args.extend(names.iter().cloned());
        let r = self.exec(&args, self.timeouts.command).await?;
        if !r.ok() {
            return Err(RuntimeError::UninstallFailed {
                diagnostic: r.diagnostic("pip_uninstall", &self.render(&args)),
            });
        }
        Ok(())
    }

    /// `pip check`: fails when any installed package has unmet requirements.
    pub async fn check(&self) -> RuntimeResult<()> {
        let args = Self::base_args(&["check"]);
        let r = self.exec(&args, self.timeouts.command).await?;
        if !r.ok() {
            return Err(RuntimeError::ConsistencyCheckFailed {
                diagnostic: r.diagnostic("pip_check", &self.render(&args)),
            });
        }
        Ok(())
    }

    pub async fn list(&self) -> RuntimeResult<Vec<InstalledPackage>> {
        let args = Self::base_args(&["list", "--format=json"]);
        let r = self.exec(&args, self.timeouts.command).await?;
        if !r.ok() {
            return Err(RuntimeError::InvalidListing {
                reason: r.diagnostic("pip_list", &self.render(&args)).summary(),
            });
        }
        parse_listing(&r.stdout)
    }
}

/// Parse `pip list --format=json` output, sorted by normalized name.
pub fn parse_listing(stdout: &str) -> RuntimeResult<Vec<InstalledPackage>> {
    // pip may print warnings before the JSON array.
    let start = stdout.find('[').ok_or_else(|| RuntimeError::InvalidListing {
        reason: "no JSON array in pip output".to_string(),
    })?;
    let mut rows: Vec<InstalledPackage> =
        serde_json::from_str(stdout[start..].trim()).map_err(|e| RuntimeError::InvalidListing {
            reason: e.to_string(),
        })?;
    rows.sort_by_cached_key(|p| normalize_name(&p.name));
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use skillrt_core::indexes::IndexConfigPatch;

    #[test]
    fn test_install_args_carry_index_flags() {
        let mut index = IndexConfig::default();
        index
            .apply(IndexConfigPatch {
                index_url: Some("https://mirror.example.com/simple".into()),
                extra_index_urls: Some(vec!["https://extra.example.com/simple".into()]),
                trusted_hosts: Some(vec!["mirror.example.com".into()]),
                ..Default::default()
            })
            .unwrap();
        let args = PipClient::install_args(&index, &["numpy==2.1.0".to_string()]);
        assert_eq!(
            args,
            vec![
                "-m",
                "pip",
                "--disable-pip-version-check",
                "install",
                "--no-input",
                "--index-url",
                "https://mirror.example.com/simple",
                "--extra-index-url",
                "https://extra.example.com/simple",
                "--trusted-host",
                "mirror.example.com",
                "numpy==2.1.0",
            ]
        );
    }

    #[test]
    fn test_parse_listing_sorts_and_skips_preamble() {
        let out = concat!(
            "WARNING: something\n",
            r#"[{"name": "Requests", "version": "2.32.0"}, {"name": "numpy", "version": "2.1.0"}]"#,
            "\n"
        );
        let rows = parse_listing(out).unwrap();
        assert_eq!(rows[0].name, "numpy");
        assert_eq!(rows[1].version, "2.32.0");
    }

    #[test]
    fn test_parse_listing_rejects_garbage() {
        assert_eq!(parse_listing("oops").unwrap_err().code(), "INVALID_LISTING");
        assert_eq!(parse_listing("[{\"x\":1}]").unwrap_err().code(), "INVALID_LISTING");
    }
}
