//! Managed Python environment: layout and bootstrap.

pub mod builder;
pub mod paths;

pub use builder::{bootstrap_candidates, BootstrapCommand, EnvironmentBuilder};
pub use paths::EnvironmentPaths;
