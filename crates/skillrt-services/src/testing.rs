//! Test doubles: a scripted interpreter that emulates venv and pip, and a
//! harness wiring it into a `RuntimeService` rooted in a temp directory.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use skillrt_core::config::{Platform, RuntimeConfig};
use skillrt_core::error::{RuntimeError, RuntimeResult};
use skillrt_core::requirement::parse_requirement;
use skillrt_core::settings::{MemorySettingsStore, SettingsStore};
use skillrt_core::skill::{SkillRecord, SkillVersionRecord, StaticSkillRegistry};
use skillrt_sandbox::process::render_command;
use skillrt_sandbox::{CommandResult, CommandRunner, RunOptions};

use crate::RuntimeService;

type SnippetHandler = Box<dyn Fn(&str, Option<&str>, &FakePython) -> CommandResult + Send + Sync>;

pub(crate) struct FakePython {
    /// normalized name -> (name, version)
    installed: Mutex<BTreeMap<String, (String, String)>>,
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    hanging: Mutex<HashSet<String>>,
    check_fails: AtomicBool,
    uninstall_fails: AtomicBool,
    broken_pip: bool,
    install_delay: Duration,
    install_count: AtomicUsize,
    snippet_count: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    snippet: SnippetHandler,
}

impl FakePython {
    pub fn new() -> Self {
        Self {
            installed: Mutex::new(BTreeMap::new()),
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            hanging: Mutex::new(HashSet::new()),
            check_fails: AtomicBool::new(false),
            uninstall_fails: AtomicBool::new(false),
            broken_pip: false,
            install_delay: Duration::ZERO,
            install_count: AtomicUsize::new(0),
            snippet_count: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            snippet: Box::new(|_, _, _| result(0, "", "")),
        }
    }

    pub fn with_install_delay(mut self, delay: Duration) -> Self {
        self.install_delay = delay;
        self
    }

    /// pip never answers the probe and ensurepip fails.
    pub fn with_broken_pip(mut self) -> Self {
        self.broken_pip = true;
        self
    }

    pub fn with_snippet<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, Option<&str>, &FakePython) -> CommandResult + Send + Sync + 'static,
    {
        self.snippet = Box::new(f);
        self
    }

    pub fn fail_install(&self, name: &str) {
        self.failing.lock().unwrap().insert(name.to_string());
    }

    /// Installs naming this package never finish; the runner reports a timeout.
    pub fn hang_install(&self, name: &str) {
        self.hanging.lock().unwrap().insert(name.to_string());
    }

    pub fn set_uninstall_fails(&self, fails: bool) {
        self.uninstall_fails.store(fails, Ordering::SeqCst);
    }

    pub fn set_check_fails(&self, fails: bool) {
        self.check_fails.store(fails, Ordering::SeqCst);
    }

    pub fn is_installed(&self, name: &str) -> bool {
        self.installed.lock().unwrap().contains_key(name)
    }

    /// Recorded pip/venv command lines (snippet runs excluded).
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn install_calls(&self) -> usize {
        self.install_count.load(Ordering::SeqCst)
    }

    pub fn snippet_runs(&self) -> usize {
        self.snippet_count.load(Ordering::SeqCst)
    }

    fn hangs(&self, args: &[String]) -> bool {
        let hanging = self.hanging.lock().unwrap();
        args.iter()
            .filter_map(|a| parse_requirement(a).ok())
            .any(|e| hanging.contains(&e.name))
    }

    async fn pip(&self, sub: &[String]) -> CommandResult {
        match sub.first().map(String::as_str) {
            Some("--version") if self.broken_pip => result(1, "", "No module named pip"),
            Some("--version") => result(0, "pip 24.0", ""),
            Some("install") => self.install(&sub[1..]).await,
            Some("uninstall") if self.uninstall_fails.load(Ordering::SeqCst) => {
                result(1, "", "ERROR: Cannot uninstall requirement, not installed")
            }
            Some("uninstall") => {
                let mut installed = self.installed.lock().unwrap();
                for name in sub[1..].iter().filter(|a| !a.starts_with('-')) {
                    installed.remove(name);
                }
                result(0, "", "")
            }
            Some("check") if self.check_fails.load(Ordering::SeqCst) => {
                result(1, "broken 1.0 requires missing-dep, which is not installed.", "")
            }
            Some("check") => result(0, "No broken requirements found.", ""),
            Some("list") => {
                let rows: Vec<serde_json::Value> = self
                    .installed
                    .lock()
                    .unwrap()
                    .values()
                    .map(|(n, v)| serde_json::json!({ "name": n, "version": v }))
                    .collect();
                result(0, &serde_json::Value::Array(rows).to_string(), "")
            }
            _ => result(2, "", "unknown pip command"),
        }
    }

    async fn install(&self, args: &[String]) -> CommandResult {
        self.install_count.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.install_delay.is_zero() {
            tokio::time::sleep(self.install_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        // Flags that take a value.
        let mut reqs = Vec::new();
        let mut skip_next = false;
        for a in args {
            if skip_next {
                skip_next = false;
            } else if matches!(
                a.as_str(),
                "--index-url" | "--extra-index-url" | "--trusted-host"
            ) {
                skip_next = true;
            } else if !a.starts_with('-') {
                reqs.push(a.clone());
            }
        }

        let failing = self.failing.lock().unwrap().clone();
        let mut parsed = Vec::new();
        for raw in &reqs {
            let Ok(entry) = parse_requirement(raw) else {
                return result(1, "", &format!("ERROR: Invalid requirement: '{}'", raw));
            };
            if failing.contains(&entry.name) {
                return result(
                    1,
                    "",
                    &format!("ERROR: No matching distribution found for {}", raw),
                );
            }
            let display = raw
                .split(|c: char| "=<>!~;[ ".contains(c))
                .next()
                .unwrap_or(raw)
                .to_string();
            let version = raw
                .split_once("==")
                .map(|(_, v)| v.trim().to_string())
                .unwrap_or_else(|| "1.0.0".to_string());
            parsed.push((entry.name, display, version));
        }
        let mut installed = self.installed.lock().unwrap();
        for (name, display, version) in parsed {
            installed.insert(name, (display, version));
        }
        result(0, "Successfully installed", "")
    }
}

#[async_trait]
impl CommandRunner for FakePython {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        opts: RunOptions,
    ) -> RuntimeResult<CommandResult> {
        if args.len() == 1 && args[0].ends_with("snippet.py") {
            self.snippet_count.fetch_add(1, Ordering::SeqCst);
            let code = std::fs::read_to_string(&args[0]).unwrap_or_default();
            return Ok((self.snippet)(&code, opts.stdin.as_deref(), self));
        }
        self.calls
            .lock()
            .unwrap()
            .push(render_command(program, args));

        if args.iter().any(|a| a == "venv") {
            let dir = Path::new(&args[args.len() - 1]);
            std::fs::create_dir_all(dir.join("bin")).unwrap();
            std::fs::write(dir.join("bin").join("python"), "").unwrap();
            return Ok(result(0, "", ""));
        }
        if args.iter().any(|a| a == "ensurepip") {
            return Ok(if self.broken_pip {
                result(1, "", "ensurepip is disabled")
            } else {
                result(0, "", "")
            });
        }
        if args.len() >= 3 && args[0] == "-m" && args[1] == "pip" {
            // Skip `--disable-pip-version-check`.
            let sub: Vec<String> = args[2..]
                .iter()
                .filter(|a| *a != "--disable-pip-version-check")
                .cloned()
                .collect();
            if sub.first().map(String::as_str) == Some("install") && self.hangs(&sub[1..]) {
                return Err(RuntimeError::CommandTimeout {
                    command: render_command(program, args),
                    timeout_ms: opts.timeout.as_millis() as u64,
                });
            }
            return Ok(self.pip(&sub).await);
        }
        Ok(result(127, "", "unexpected command"))
    }
}

pub(crate) fn result(code: i32, stdout: &str, stderr: &str) -> CommandResult {
    CommandResult {
        exit_code: Some(code),
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
        ..Default::default()
    }
}

/// An enabled skill with one active version declaring `packages`.
pub(crate) fn skill(id: &str, packages: &[&str]) -> SkillRecord {
    let manifest = serde_json::json!({ "name": id, "python_packages": packages }).to_string();
    SkillRecord {
        id: id.to_string(),
        slug: id.to_lowercase(),
        name: format!("Skill {}", id),
        enabled: true,
        default_version_id: None,
        versions: vec![SkillVersionRecord {
            id: format!("{}-v1", id),
            label: "1.0.0".to_string(),
            active: true,
            activated_at: Utc.timestamp_opt(1_700_000_000, 0).single(),
            manifest: Some(manifest),
        }],
    }
}

pub(crate) struct Harness {
    _dir: tempfile::TempDir,
    pub fake: Arc<FakePython>,
    pub settings: Arc<MemorySettingsStore>,
    pub service: Arc<RuntimeService>,
}

impl Harness {
    pub fn new(skills: Vec<SkillRecord>) -> Self {
        Self::with_fake(skills, FakePython::new())
    }

    pub fn with_fake(skills: Vec<SkillRecord>, fake: FakePython) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RuntimeConfig::with_data_root(dir.path());
        config.platform = Platform::Linux;
        config.bootstrap_override = Some("fakepython3".to_string());
        let fake = Arc::new(fake);
        let settings = Arc::new(MemorySettingsStore::new());
        let service = Arc::new(RuntimeService::new(
            config,
            fake.clone(),
            settings.clone(),
            Arc::new(StaticSkillRegistry::new(skills)),
        ));
        Self {
            _dir: dir,
            fake,
            settings,
            service,
        }
    }

    pub fn setting(&self, key: &str) -> Option<String> {
        self.settings.get(&[key]).unwrap().remove(key)
    }

    pub fn set_setting(&self, key: &str, value: &str) {
        self.settings.upsert(key, value).unwrap();
    }
}
