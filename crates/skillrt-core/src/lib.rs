//! skillrt core: everything the runtime needs that does not spawn a process.
//!
//! - `config`: environment-driven configuration (`SKILLRT_*`)
//! - `error`: the shared error taxonomy with stable machine codes
//! - `requirement`: requirement parsing, safety validation, name normalization
//! - `indexes`: package-index configuration and its settings keys
//! - `settings`: the key/value settings store seam
//! - `skill`: the skill registry seam and manifest parsing
//! - `observability`: tracing init and the JSONL audit trail

pub mod config;
pub mod error;
pub mod indexes;
pub mod observability;
pub mod requirement;
pub mod settings;
pub mod skill;

pub use error::{RuntimeError, RuntimeResult};
