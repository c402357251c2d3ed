//! skillrt sandbox: everything that spawns a process.
//!
//! - `process`: the `CommandRunner` seam and its tokio implementation
//! - `env`: managed venv layout and the self-healing bootstrapper
//! - `pip`: package-manager invocations against the managed interpreter
//! - `module_hints`: missing-module detection in interpreter output

pub mod env;
pub mod log;
pub mod module_hints;
pub mod pip;
pub mod process;

pub use env::{EnvironmentBuilder, EnvironmentPaths};
pub use pip::{InstalledPackage, PipClient};
pub use process::{CommandResult, CommandRunner, ProcessRunner, RunOptions};
