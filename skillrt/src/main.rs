mod cli;
mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::{json, Value};
use std::sync::Arc;

use cli::Cli;
use skillrt_core::config::RuntimeConfig;
use skillrt_core::observability;
use skillrt_core::settings::JsonFileSettingsStore;
use skillrt_core::skill::JsonFileSkillRegistry;
use skillrt_core::RuntimeError;
use skillrt_sandbox::ProcessRunner;
use skillrt_services::RuntimeService;

fn main() {
    observability::init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(value) => println!("{}", pretty(&value)),
        Err(err) => {
            println!("{}", pretty(&error_json(&err)));
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<Value> {
    let mut config = RuntimeConfig::from_env();
    if let Some(dir) = cli.data_dir {
        config.data_root = dir;
    }
    tracing::debug!(data_root = %config.data_root.display(), "Using data root");

    let settings = Arc::new(JsonFileSettingsStore::new(config.settings_file()));
    let registry = Arc::new(JsonFileSkillRegistry::new(config.skills_file()));
    let service = Arc::new(RuntimeService::new(
        config,
        Arc::new(ProcessRunner),
        settings,
        registry,
    ));

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    rt.block_on(commands::dispatch(service, cli.command))
}

/// Stable `{code, message, details}` for runtime errors; anything else is a CLI error.
fn error_json(err: &anyhow::Error) -> Value {
    match err.downcast_ref::<RuntimeError>() {
        Some(e) => e.to_json(),
        None => json!({ "code": "CLI_ERROR", "message": format!("{:#}", err) }),
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
