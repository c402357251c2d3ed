//! Subcommand handlers. Each returns the JSON value printed on success.

use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use skillrt_core::indexes::IndexConfigPatch;
use skillrt_services::snippet::SnippetRequest;
use skillrt_services::{
    CleanupInput, InstallRequest, RuntimeService, SkillContext, SnippetRunner,
};

use crate::cli::{Commands, IndexesAction};

pub async fn dispatch(service: Arc<RuntimeService>, command: Commands) -> Result<Value> {
    let value = match command {
        Commands::Status => json!(service.get_runtime_status().await?),
        Commands::Indexes { action } => match action {
            IndexesAction::Show => json!(service.get_indexes()?),
            IndexesAction::Set {
                index_url,
                extra_index_url,
                clear_extra_index_urls,
                trusted_host,
                clear_trusted_hosts,
                auto_install_on_activate,
                auto_install_on_missing,
            } => {
                let patch = IndexConfigPatch {
                    index_url,
                    extra_index_urls: list_update(extra_index_url, clear_extra_index_urls),
                    trusted_hosts: list_update(trusted_host, clear_trusted_hosts),
                    auto_install_on_activate,
                    auto_install_on_missing,
                };
                json!(service.update_indexes(patch)?)
            }
        },
        Commands::Install {
            requirements,
            skill,
        } => {
            let request = match skill {
                Some(skill_id) => InstallRequest::automatic(
                    requirements,
                    Some(SkillContext {
                        skill_id,
                        version_id: None,
                    }),
                ),
                None => InstallRequest::manual(requirements),
            };
            json!({ "installedPackages": service.install_requirements(request).await? })
        }
        Commands::Uninstall { packages } => {
            json!({ "installedPackages": service.uninstall_packages(packages).await? })
        }
        Commands::Reconcile => json!(service.reconcile().await?),
        Commands::Deps => json!(service.collect_active_dependencies()?),
        Commands::Conflicts => {
            let items = service.collect_active_dependencies()?;
            json!(service.analyze_conflicts(&items))
        }
        Commands::Installed => json!(service.list_installed_packages().await?),
        Commands::Cleanup {
            requirements,
            exclude_skill,
            execute,
        } => {
            let input = CleanupInput {
                requirements,
                exclude_skill_ids: exclude_skill,
            };
            if execute {
                json!(service.cleanup_packages_after_skill_removal(&input).await?)
            } else {
                json!(service.preview_cleanup_after_skill_removal(&input)?)
            }
        }
        Commands::Run {
            file,
            code,
            input,
            actor,
            timeout_ms,
            max_output_chars,
            max_source_chars,
        } => {
            let code = match (file, code) {
                (Some(path), _) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read snippet file {}", path.display()))?,
                (None, Some(code)) => code,
                (None, None) => anyhow::bail!("either --file or --code is required"),
            };
            let input = match input.as_deref() {
                Some("-") => {
                    let mut s = String::new();
                    std::io::stdin()
                        .read_to_string(&mut s)
                        .context("Failed to read snippet input from stdin")?;
                    Some(s)
                }
                _ => input,
            };
            let mut request = SnippetRequest::new(code);
            request.input = input;
            request.actor_id = actor;
            if let Some(ms) = timeout_ms {
                request.timeout = Duration::from_millis(ms);
            }
            if let Some(n) = max_output_chars {
                request.max_output_chars = n;
            }
            if let Some(n) = max_source_chars {
                request.max_source_chars = n;
            }
            json!(SnippetRunner::new(service).run(request).await?)
        }
    };
    Ok(value)
}

/// Repeatable list flag: replace when values are given, clear when asked, else untouched.
fn list_update(values: Vec<String>, clear: bool) -> Option<Vec<String>> {
    if !values.is_empty() {
        Some(values)
    } else if clear {
        Some(Vec::new())
    } else {
        None
    }
}
