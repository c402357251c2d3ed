//! Observability: tracing init and the JSONL audit trail.
//!
//! Uses config::ObservabilityConfig for SKILLRT_QUIET, LOG_LEVEL, LOG_JSON, AUDIT_LOG.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::Utc;
use serde_json::{json, Value};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::ObservabilityConfig;

/// Install the global subscriber. `RUST_LOG` wins over SKILLRT_LOG_LEVEL;
/// quiet mode keeps warnings and errors only. Safe to call twice.
pub fn init_tracing() {
    let cfg = ObservabilityConfig::from_env();
    let directive = if cfg.quiet { "skillrt=warn" } else { cfg.log_level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    // stdout is reserved for command results.
    let layer = fmt::layer().with_writer(std::io::stderr).with_target(true);
    let registry = tracing_subscriber::registry().with(filter);
    let _ = if cfg.log_json {
        registry.with(layer.json()).try_init()
    } else {
        registry.with(layer).try_init()
    };
}

/// SKILLRT_AUDIT_LOG, resolved once; its parent directory is created on first use.
fn audit_path() -> Option<&'static Path> {
    static PATH: OnceLock<Option<PathBuf>> = OnceLock::new();
    PATH.get_or_init(|| {
        let path = PathBuf::from(ObservabilityConfig::from_env().audit_log.as_deref()?);
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        Some(path)
    })
    .as_deref()
}

fn append_jsonl(path: &Path, record: &Value) {
    if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(path) {
        if let Ok(line) = serde_json::to_string(record) {
            let _ = writeln!(f, "{}", line);
        }
    }
}

/// Build one audit record: `ts`, `event`, then the given fields.
fn audit_record(event: &str, fields: Value) -> Value {
    let mut record = json!({
        "ts": Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        "event": event,
    });
    if let (Some(obj), Value::Object(extra)) = (record.as_object_mut(), fields) {
        obj.extend(extra);
    }
    record
}

fn emit(event: &str, fields: Value) {
    if let Some(path) = audit_path() {
        append_jsonl(path, &audit_record(event, fields));
    }
}

/// Audit: packages_installed (manual or automatic)
pub fn audit_packages_installed(requirements: &[String], source: &str, skill_id: Option<&str>) {
    emit(
        "packages_installed",
        json!({
            "requirements": requirements,
            "source": source,
            "skill_id": skill_id,
        }),
    );
}

/// Audit: packages_uninstalled
pub fn audit_packages_uninstalled(packages: &[String], reason: &str) {
    emit(
        "packages_uninstalled",
        json!({ "packages": packages, "reason": reason }),
    );
}

/// Audit: environment_reconciled
pub fn audit_environment_reconciled(requirement_count: usize, conflict_count: usize) {
    emit(
        "environment_reconciled",
        json!({
            "requirement_count": requirement_count,
            "conflict_count": conflict_count,
        }),
    );
}

/// Audit: environment_repaired (recreate / ensurepip during bootstrap)
pub fn audit_environment_repaired(step: &str, success: bool) {
    emit(
        "environment_repaired",
        json!({ "step": step, "success": success }),
    );
}

/// Audit: snippet_executed
pub fn audit_snippet_executed(
    run_id: &str,
    actor_id: Option<&str>,
    exit_code: Option<i32>,
    duration_ms: u64,
    auto_installed: &[String],
) {
    emit(
        "snippet_executed",
        json!({
            "run_id": run_id,
            "actor_id": actor_id,
            "exit_code": exit_code,
            "duration_ms": duration_ms,
            "auto_installed": auto_installed,
            "success": exit_code == Some(0),
        }),
    );
}
