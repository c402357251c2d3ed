//! Skill (plugin) data consumed by the runtime: the registry seam, manifest
//! parsing, and the derived dependency/conflict records.

pub mod dependency;
pub mod manifest;
pub mod registry;

pub use dependency::{ActiveDependencyItem, ConflictContributor, ConflictItem};
pub use manifest::declared_python_packages;
pub use registry::{
    JsonFileSkillRegistry, SkillRecord, SkillRegistry, SkillVersionRecord, StaticSkillRegistry,
};
