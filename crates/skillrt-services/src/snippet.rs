//! Snippet runner: executes a short Python snippet in the managed interpreter,
//! installing missing modules and retrying when the caller is eligible.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use skillrt_core::error::{RuntimeError, RuntimeResult};
use skillrt_core::observability;
use skillrt_sandbox::module_hints::missing_requirements;
use skillrt_sandbox::process::DEFAULT_MAX_OUTPUT_BYTES;
use skillrt_sandbox::{info_log, CommandResult, EnvironmentPaths, RunOptions};

use crate::installer::InstallRequest;
use crate::RuntimeService;

/// Install rounds per run; the snippet runs at most once more than this.
pub const MAX_AUTO_INSTALL_ROUNDS: usize = 3;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_OUTPUT_CHARS: usize = 20_000;
pub const DEFAULT_MAX_SOURCE_CHARS: usize = 100_000;

#[derive(Debug, Clone)]
pub struct SnippetRequest {
    pub code: String,
    pub input: Option<String>,
    /// Who is running the snippet; anonymous runs never auto-install.
    pub actor_id: Option<String>,
    pub timeout: Duration,
    pub max_output_chars: usize,
    pub max_source_chars: usize,
}

impl SnippetRequest {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            input: None,
            actor_id: None,
            timeout: DEFAULT_TIMEOUT,
            max_output_chars: DEFAULT_MAX_OUTPUT_CHARS,
            max_source_chars: DEFAULT_MAX_SOURCE_CHARS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnippetResult {
    pub run_id: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
    pub truncated: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub auto_installed_requirements: Vec<String>,
}

pub struct SnippetRunner {
    service: Arc<RuntimeService>,
}

impl SnippetRunner {
    pub fn new(service: Arc<RuntimeService>) -> Self {
        Self { service }
    }

    pub async fn run(&self, request: SnippetRequest) -> RuntimeResult<SnippetResult> {
        let code = request.code.replace("\r\n", "\n").replace('\r', "\n");
        if code.trim().is_empty() {
            return Err(RuntimeError::InvalidSnippet {
                reason: "code is empty".to_string(),
            });
        }
        let chars = code.chars().count();
        if chars > request.max_source_chars {
            return Err(RuntimeError::InvalidSnippet {
                reason: format!(
                    "code is {} characters, limit is {}",
                    chars, request.max_source_chars
                ),
            });
        }

        let run_id = uuid::Uuid::new_v4().to_string();
        let paths = self.service.ensure_managed_runtime().await?;
        let workdir = tempfile::Builder::new()
            .prefix("skillrt-snippet-")
            .tempdir()
            .map_err(|e| snippet_io_error("create snippet directory", e))?;
        let script = workdir.path().join("snippet.py");
        tokio::fs::write(&script, &code)
            .await
            .map_err(|e| snippet_io_error("write snippet", e))?;

        let eligible =
            request.actor_id.is_some() && self.service.get_indexes()?.auto_install_on_missing;
        let mut attempted: HashSet<String> = HashSet::new();
        let mut auto_installed: Vec<String> = Vec::new();
        let mut install_note: Option<String> = None;
        let mut rounds = 0;

        let mut result = self.execute(&paths, &script, workdir.path(), &request).await?;
        while !result.ok() && eligible && rounds < MAX_AUTO_INSTALL_ROUNDS {
            let missing: Vec<_> = missing_requirements(&result.combined_output())
                .into_iter()
                .filter(|e| !attempted.contains(&e.name))
                .collect();
            if missing.is_empty() {
                break;
            }
            rounds += 1;
            attempted.extend(missing.iter().map(|e| e.name.clone()));
            let raws: Vec<String> = missing.iter().map(|e| e.raw.clone()).collect();
            info_log!(
                run_id = %run_id,
                round = rounds,
                "Auto-installing missing module(s): {}",
                raws.join(" ")
            );
            match self
                .service
                .install_requirements(InstallRequest::automatic(raws.clone(), None))
                .await
            {
                Ok(_) => auto_installed.extend(raws),
                Err(e) => {
                    tracing::warn!(run_id = %run_id, "Auto-install failed: {}", e);
                    install_note = Some(format!(
                        "[auto-install of {} failed: {}]",
                        raws.join(", "),
                        e
                    ));
                    break;
                }
            }
            result = self.execute(&paths, &script, workdir.path(), &request).await?;
        }

        let (stdout, stdout_cut) = truncate_chars(&result.stdout, request.max_output_chars);
        let (mut stderr, stderr_cut) = truncate_chars(&result.stderr, request.max_output_chars);
        if let Some(note) = install_note {
            if !stderr.is_empty() && !stderr.ends_with('\n') {
                stderr.push('\n');
            }
            stderr.push_str(&note);
        }

        observability::audit_snippet_executed(
            &run_id,
            request.actor_id.as_deref(),
            result.exit_code,
            result.duration_ms(),
            &auto_installed,
        );

        Ok(SnippetResult {
            run_id,
            stdout,
            stderr,
            exit_code: result.exit_code,
            duration_ms: result.duration_ms(),
            truncated: result.truncated() || stdout_cut || stderr_cut,
            auto_installed_requirements: auto_installed,
        })
    }

    async fn execute(
        &self,
        paths: &EnvironmentPaths,
        script: &Path,
        workdir: &Path,
        request: &SnippetRequest,
    ) -> RuntimeResult<CommandResult> {
        let opts = RunOptions {
            cwd: Some(workdir.to_path_buf()),
            timeout: request.timeout,
            stdin: request.input.clone(),
            env: vec![
                ("PYTHONIOENCODING".to_string(), "utf-8".to_string()),
                ("PYTHONDONTWRITEBYTECODE".to_string(), "1".to_string()),
            ],
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        };
        let args = vec![script.to_string_lossy().into_owned()];
        self.service
            .env
            .runner()
            .run(&paths.python_str(), &args, opts)
            .await
    }
}

fn snippet_io_error(context: &str, e: std::io::Error) -> RuntimeError {
    RuntimeError::Io {
        context: context.to_string(),
        reason: e.to_string(),
    }
}

/// Keep at most `max` characters; reports whether anything was cut.
fn truncate_chars(s: &str, max: usize) -> (String, bool) {
    match s.char_indices().nth(max) {
        Some((idx, _)) => (s[..idx].to_string(), true),
        None => (s.to_string(), false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakePython, Harness};
    use skillrt_core::indexes::IndexConfigPatch;
    use skillrt_sandbox::CommandResult;

    fn fail(stderr: &str) -> CommandResult {
        CommandResult {
            exit_code: Some(1),
            stderr: stderr.to_string(),
            ..Default::default()
        }
    }

    fn ok(stdout: &str) -> CommandResult {
        CommandResult {
            exit_code: Some(0),
            stdout: stdout.to_string(),
            ..Default::default()
        }
    }

    fn runner(h: &Harness) -> SnippetRunner {
        SnippetRunner::new(h.service.clone())
    }

    fn with_actor(code: &str) -> SnippetRequest {
        let mut req = SnippetRequest::new(code);
        req.actor_id = Some("user-1".into());
        req
    }

    #[test]
    fn test_truncate_chars_on_boundary() {
        assert_eq!(truncate_chars("héllo", 2), ("hé".to_string(), true));
        assert_eq!(truncate_chars("abc", 3), ("abc".to_string(), false));
    }

    #[tokio::test]
    async fn test_rejects_empty_and_oversized_before_spawning() {
        let h = Harness::new(Vec::new());
        let err = runner(&h).run(SnippetRequest::new(" \r\n ")).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_SNIPPET");

        let mut req = SnippetRequest::new("a\r\nb");
        req.max_source_chars = 3;
        // "a\nb" after normalization fits.
        assert!(runner(&h).run(req.clone()).await.is_ok());

        let before = h.fake.calls().len();
        req.max_source_chars = 2;
        let err = runner(&h).run(req).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_SNIPPET");
        assert_eq!(h.fake.calls().len(), before);
    }

    #[tokio::test]
    async fn test_runs_snippet_with_stdin() {
        let fake = FakePython::new().with_snippet(|code, stdin, _| {
            ok(&format!("{}|{}", code.trim(), stdin.unwrap_or_default()))
        });
        let h = Harness::with_fake(Vec::new(), fake);
        let mut req = SnippetRequest::new("print(input())");
        req.input = Some("42".into());
        let result = runner(&h).run(req).await.unwrap();
        assert_eq!(result.exit_code, Some(0));
        assert_eq!(result.stdout, "print(input())|42");
        assert!(!result.truncated);
        assert!(uuid::Uuid::parse_str(&result.run_id).is_ok());
    }

    #[tokio::test]
    async fn test_missing_module_is_installed_and_retried() {
        let fake = FakePython::new().with_snippet(|_, _, fake| {
            if fake.is_installed("requests") {
                ok("200")
            } else {
                fail("Traceback...\nModuleNotFoundError: No module named 'requests'\n")
            }
        });
        let h = Harness::with_fake(Vec::new(), fake);
        let result = runner(&h).run(with_actor("import requests")).await.unwrap();
        assert_eq!(result.exit_code, Some(0));
        assert_eq!(result.stdout, "200");
        assert_eq!(result.auto_installed_requirements, vec!["requests"]);
        // Automatic installs never become manual packages.
        assert!(h.service.manual_packages().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_alias_is_installed_under_distribution_name() {
        let fake = FakePython::new().with_snippet(|_, _, fake| {
            if fake.is_installed("pyyaml") {
                ok("")
            } else {
                fail("ModuleNotFoundError: No module named 'yaml'")
            }
        });
        let h = Harness::with_fake(Vec::new(), fake);
        let result = runner(&h).run(with_actor("import yaml")).await.unwrap();
        assert_eq!(result.auto_installed_requirements, vec!["pyyaml"]);
    }

    #[tokio::test]
    async fn test_anonymous_or_disabled_never_installs() {
        let fake = FakePython::new()
            .with_snippet(|_, _, _| fail("ModuleNotFoundError: No module named 'requests'"));
        let h = Harness::with_fake(Vec::new(), fake);

        let result = runner(&h).run(SnippetRequest::new("import requests")).await.unwrap();
        assert_eq!(result.exit_code, Some(1));
        assert!(result.auto_installed_requirements.is_empty());

        h.service
            .update_indexes(IndexConfigPatch {
                auto_install_on_missing: Some(false),
                ..Default::default()
            })
            .unwrap();
        let result = runner(&h).run(with_actor("import requests")).await.unwrap();
        assert!(result.auto_installed_requirements.is_empty());
        assert_eq!(h.fake.install_calls(), 0);
    }

    #[tokio::test]
    async fn test_auto_install_is_bounded() {
        // Every run reports a different missing module.
        let fake = FakePython::new().with_snippet(|_, _, fake| {
            fail(&format!(
                "ModuleNotFoundError: No module named 'mod{}'",
                fake.install_calls()
            ))
        });
        let h = Harness::with_fake(Vec::new(), fake);
        let result = runner(&h).run(with_actor("import anything")).await.unwrap();
        assert_eq!(result.exit_code, Some(1));
        assert_eq!(h.fake.install_calls(), MAX_AUTO_INSTALL_ROUNDS);
        assert_eq!(result.auto_installed_requirements, vec!["mod0", "mod1", "mod2"]);
        assert_eq!(h.fake.snippet_runs(), MAX_AUTO_INSTALL_ROUNDS + 1);
    }

    #[tokio::test]
    async fn test_same_module_is_not_retried() {
        let fake = FakePython::new()
            .with_snippet(|_, _, _| fail("ModuleNotFoundError: No module named 'stubborn'"));
        let h = Harness::with_fake(Vec::new(), fake);
        let result = runner(&h).run(with_actor("import stubborn")).await.unwrap();
        assert_eq!(h.fake.install_calls(), 1);
        assert_eq!(h.fake.snippet_runs(), 2);
        assert_eq!(result.auto_installed_requirements, vec!["stubborn"]);
    }

    #[tokio::test]
    async fn test_install_failure_note_follows_snippet_stderr() {
        let fake = FakePython::new()
            .with_snippet(|_, _, _| fail("ModuleNotFoundError: No module named 'nope'"));
        fake.fail_install("nope");
        let h = Harness::with_fake(Vec::new(), fake);
        let result = runner(&h).run(with_actor("import nope")).await.unwrap();
        assert_eq!(result.exit_code, Some(1));
        let expected = "ModuleNotFoundError: No module named 'nope'\n[auto-install of nope failed:";
        assert!(result.stderr.starts_with(expected));
        assert!(result.auto_installed_requirements.is_empty());
    }

    #[tokio::test]
    async fn test_output_char_cap() {
        let fake = FakePython::new().with_snippet(|_, _, _| ok(&"é".repeat(50)));
        let h = Harness::with_fake(Vec::new(), fake);
        let mut req = SnippetRequest::new("print('é' * 50)");
        req.max_output_chars = 10;
        let result = runner(&h).run(req).await.unwrap();
        assert_eq!(result.stdout.chars().count(), 10);
        assert!(result.truncated);
    }
}
