use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// skillrt - managed Python runtime for skills
#[derive(Parser, Debug)]
#[command(name = "skillrt")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Data root (settings.json, skills.json, runtime/). Default: ~/.skillrt
    #[arg(long, global = true, env = "SKILLRT_DATA_DIR", value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show paths, readiness, index config, packages, active dependencies and conflicts
    Status,

    /// Show or change package index configuration
    Indexes {
        #[command(subcommand)]
        action: IndexesAction,
    },

    /// Install requirements (manual unless --skill is given)
    Install {
        #[arg(value_name = "REQUIREMENT", required = true)]
        requirements: Vec<String>,

        /// Install on behalf of this skill (automatic; not recorded as manual)
        #[arg(long, value_name = "SKILL_ID")]
        skill: Option<String>,
    },

    /// Uninstall packages not required by any active skill
    Uninstall {
        #[arg(value_name = "PACKAGE", required = true)]
        packages: Vec<String>,
    },

    /// Install every active skill's requirements in one pass
    Reconcile,

    /// List requirements declared by active skills
    Deps,

    /// List packages requested with different requirement strings
    Conflicts,

    /// List installed packages
    Installed,

    /// Plan (or run with --execute) package cleanup after a skill is removed
    Cleanup {
        /// Requirements the removed skill declared
        #[arg(value_name = "REQUIREMENT", required = true)]
        requirements: Vec<String>,

        /// Leave this skill out of the active set (repeatable)
        #[arg(long = "exclude-skill", value_name = "SKILL_ID")]
        exclude_skill: Vec<String>,

        /// Uninstall the removable packages
        #[arg(long, default_value = "false")]
        execute: bool,
    },

    /// Run a Python snippet in the managed interpreter
    Run {
        /// Read the snippet from a file
        #[arg(long, value_name = "FILE", conflicts_with = "code", required_unless_present = "code")]
        file: Option<PathBuf>,

        /// Snippet source
        #[arg(long, value_name = "CODE")]
        code: Option<String>,

        /// Text piped to the snippet's stdin. Use "-" to read from stdin
        #[arg(long, value_name = "TEXT")]
        input: Option<String>,

        /// Caller identity; required for auto-installing missing modules
        #[arg(long, value_name = "ACTOR_ID")]
        actor: Option<String>,

        #[arg(long, value_name = "MS")]
        timeout_ms: Option<u64>,

        #[arg(long, value_name = "N")]
        max_output_chars: Option<usize>,

        #[arg(long, value_name = "N")]
        max_source_chars: Option<usize>,
    },
}

#[derive(Subcommand, Debug)]
pub enum IndexesAction {
    /// Print the current configuration
    Show,

    /// Update only the given fields
    Set {
        /// Primary index URL ("" restores the pip default)
        #[arg(long, value_name = "URL")]
        index_url: Option<String>,

        /// Extra index URL (repeatable; replaces the current list)
        #[arg(long = "extra-index-url", value_name = "URL")]
        extra_index_url: Vec<String>,

        /// Remove every extra index URL
        #[arg(long, default_value = "false")]
        clear_extra_index_urls: bool,

        /// Trusted host[:port] (repeatable; replaces the current list)
        #[arg(long = "trusted-host", value_name = "HOST")]
        trusted_host: Vec<String>,

        /// Remove every trusted host
        #[arg(long, default_value = "false")]
        clear_trusted_hosts: bool,

        #[arg(long, value_name = "BOOL")]
        auto_install_on_activate: Option<bool>,

        #[arg(long, value_name = "BOOL")]
        auto_install_on_missing: Option<bool>,
    },
}
