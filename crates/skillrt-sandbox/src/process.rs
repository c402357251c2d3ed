//! Bounded subprocess execution.
//!
//! One child per call. stdout and stderr are captured independently, each up
//! to its own byte ceiling; bytes past the ceiling are drained and dropped so
//! the child never blocks on a full pipe. A non-zero exit is a normal result;
//! only spawn failure and timeout are errors.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use skillrt_core::error::{RuntimeError, RuntimeResult, StepDiagnostic};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

/// Per-stream capture ceiling.
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 200_000;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub cwd: Option<PathBuf>,
    pub timeout: Duration,
    /// Written to the child's stdin, which is then closed. `None` gives the child a null stdin.
    pub stdin: Option<String>,
    /// Extra environment variables on top of the inherited environment.
    pub env: Vec<(String, String)>,
    pub max_output_bytes: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            cwd: None,
            timeout: Duration::from_secs(120),
            stdin: None,
            env: Vec::new(),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

impl RunOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was killed by a signal or never reported a code.
    pub exit_code: Option<i32>,
    pub duration: Duration,
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
}

impl CommandResult {
    pub fn ok(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn truncated(&self) -> bool {
        self.stdout_truncated || self.stderr_truncated
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration.as_millis() as u64
    }

    /// stdout followed by stderr, newline-separated when both are present.
    pub fn combined_output(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (true, _) => self.stderr.clone(),
            (_, true) => self.stdout.clone(),
            _ => format!("{}\n{}", self.stdout, self.stderr),
        }
    }

    pub fn diagnostic(&self, step: &str, command: &str) -> StepDiagnostic {
        StepDiagnostic {
            step: step.to_string(),
            command: command.to_string(),
            exit_code: self.exit_code,
            stdout: self.stdout.clone(),
            stderr: self.stderr.clone(),
        }
    }
}

/// The one seam through which every component starts a process.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        opts: RunOptions,
    ) -> RuntimeResult<CommandResult>;
}

/// Render a command line for logs and diagnostics.
pub fn render_command(program: &str, args: &[String]) -> String {
    let mut out = quote(program);
    for a in args {
        out.push(' ');
        out.push_str(&quote(a));
    }
    out
}

fn quote(s: &str) -> String {
    if s.is_empty() || s.chars().any(|c| c.is_whitespace() || c == '"' || c == '\'') {
        format!("{:?}", s)
    } else {
        s.to_string()
    }
}

/// Tokio-backed runner.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        opts: RunOptions,
    ) -> RuntimeResult<CommandResult> {
        let rendered = render_command(program, args);
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(if opts.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref cwd) = opts.cwd {
            cmd.current_dir(cwd);
        }
        for (k, v) in &opts.env {
            cmd.env(k, v);
        }

        tracing::debug!(
            command = %rendered,
            timeout_ms = opts.timeout.as_millis() as u64,
            "Spawning subprocess"
        );
        let start = Instant::now();
        let mut child = cmd.spawn().map_err(|e| RuntimeError::CommandSpawnFailed {
            command: rendered.clone(),
            reason: e.to_string(),
        })?;

        if let (Some(mut pipe), Some(data)) = (child.stdin.take(), opts.stdin) {
            tokio::spawn(async move {
                // A child that exits without reading closes the pipe; that is not our error.
                let _ = pipe.write_all(data.as_bytes()).await;
                let _ = pipe.shutdown().await;
            });
        }

        let cap = opts.max_output_bytes;
        let mut out_task = tokio::spawn(read_capped(child.stdout.take(), cap));
        let mut err_task = tokio::spawn(read_capped(child.stderr.take(), cap));

        // The deadline covers the drains too: a background process that inherited
        // the pipes keeps them open after the child itself has exited.
        let finished = tokio::time::timeout(opts.timeout, async {
            let status = child.wait().await;
            let out = (&mut out_task).await.unwrap_or_default();
            let err = (&mut err_task).await.unwrap_or_default();
            (status, out, err)
        })
        .await;

        let (status, (stdout, stdout_truncated), (stderr, stderr_truncated)) = match finished {
            Ok((Ok(status), out, err)) => (status, out, err),
            Ok((Err(e), _, _)) => {
                return Err(RuntimeError::CommandSpawnFailed {
                    command: rendered,
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                let _ = child.kill().await;
                out_task.abort();
                err_task.abort();
                tracing::warn!(command = %rendered, "Subprocess timed out, killed");
                return Err(RuntimeError::CommandTimeout {
                    command: rendered,
                    timeout_ms: opts.timeout.as_millis() as u64,
                });
            }
        };

        let duration = start.elapsed();
        tracing::debug!(
            command = %rendered,
            exit_code = ?status.code(),
            duration_ms = duration.as_millis() as u64,
            "Subprocess finished"
        );

        Ok(CommandResult {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_code: status.code(),
            duration,
            stdout_truncated,
            stderr_truncated,
        })
    }
}

async fn read_capped<R>(reader: Option<R>, cap: usize) -> (Vec<u8>, bool)
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return (Vec::new(), false);
    };
    let mut buf = Vec::new();
    let mut truncated = false;
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let room = cap.saturating_sub(buf.len());
                if n > room {
                    buf.extend_from_slice(&chunk[..room]);
                    truncated = true;
                } else {
                    buf.extend_from_slice(&chunk[..n]);
                }
            }
        }
    }
    (buf, truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_command_quotes_spaces() {
        let args = vec!["-c".to_string(), "print(1)".to_string(), "a b".to_string()];
        assert_eq!(render_command("python", &args), r#"python -c print(1) "a b""#);
    }

    #[test]
    fn test_combined_output() {
        let r = CommandResult {
            stdout: "out".into(),
            stderr: "err".into(),
            ..Default::default()
        };
        assert_eq!(r.combined_output(), "out\nerr");
        let r = CommandResult {
            stderr: "err".into(),
            ..Default::default()
        };
        assert_eq!(r.combined_output(), "err");
    }

    #[tokio::test]
    async fn test_spawn_failure_is_error() {
        let err = ProcessRunner
            .run("skillrt-no-such-binary-xyz", &[], RunOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "COMMAND_SPAWN_FAILED");
    }

    #[cfg(unix)]
    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_result() {
        let r = ProcessRunner
            .run("sh", &sh("echo hi; echo oops >&2; exit 3"), RunOptions::default())
            .await
            .unwrap();
        assert_eq!(r.exit_code, Some(3));
        assert!(!r.ok());
        assert_eq!(r.stdout.trim(), "hi");
        assert_eq!(r.stderr.trim(), "oops");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stdout_capped_at_default_ceiling() {
        let r = ProcessRunner
            .run(
                "sh",
                &sh("head -c 300000 /dev/zero | tr '\\0' a"),
                RunOptions::default(),
            )
            .await
            .unwrap();
        assert!(r.ok());
        assert_eq!(r.stdout.len(), DEFAULT_MAX_OUTPUT_BYTES);
        assert!(r.stdout_truncated);
        assert!(!r.stderr_truncated);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_streams_capped_independently() {
        let opts = RunOptions {
            max_output_bytes: 4,
            ..RunOptions::default()
        };
        let r = ProcessRunner
            .run("sh", &sh("printf 0123456789; printf ab >&2"), opts)
            .await
            .unwrap();
        assert_eq!(r.stdout, "0123");
        assert!(r.stdout_truncated);
        assert_eq!(r.stderr, "ab");
        assert!(!r.stderr_truncated);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_child() {
        let started = Instant::now();
        let err = ProcessRunner
            .run(
                "sh",
                &sh("sleep 5"),
                RunOptions::with_timeout(Duration::from_millis(200)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::CommandTimeout { timeout_ms: 200, .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_covers_background_holder_of_pipes() {
        // `sh` exits at once; the backgrounded sleep keeps stdout open.
        let started = Instant::now();
        let err = ProcessRunner
            .run(
                "sh",
                &sh("sleep 3 & echo started"),
                RunOptions::with_timeout(Duration::from_millis(300)),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "COMMAND_TIMEOUT");
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stdin_and_cwd() {
        let td = tempfile::tempdir().unwrap();
        let opts = RunOptions {
            cwd: Some(td.path().to_path_buf()),
            stdin: Some("hello from stdin".into()),
            env: vec![("SKILLRT_TEST_VAR".into(), "v1".into())],
            ..RunOptions::default()
        };
        let r = ProcessRunner
            .run("sh", &sh("cat; echo; echo $SKILLRT_TEST_VAR; pwd"), opts)
            .await
            .unwrap();
        let lines: Vec<&str> = r.stdout.lines().collect();
        assert_eq!(lines[0], "hello from stdin");
        assert_eq!(lines[1], "v1");
        let cwd = std::fs::canonicalize(td.path()).unwrap();
        assert_eq!(std::fs::canonicalize(lines[2]).unwrap(), cwd);
    }
}
