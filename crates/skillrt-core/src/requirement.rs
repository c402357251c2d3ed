//! Requirement parsing and safety validation.
//!
//! Accepts only index-resolvable specifiers: `<name>[<extras>]<constraints>[; <marker>]`.
//! Anything that could make the package manager fetch or execute code from an
//! arbitrary location (URLs, local paths, VCS references, direct references,
//! option flags) is rejected before a subprocess is ever spawned.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{RuntimeError, RuntimeResult};

lazy_static! {
    static ref NAME_EXTRAS_REST: Regex = Regex::new(
        r"^([A-Za-z0-9][A-Za-z0-9._-]*)\s*(\[\s*[A-Za-z0-9][A-Za-z0-9._-]*(?:\s*,\s*[A-Za-z0-9][A-Za-z0-9._-]*)*\s*\])?(.*)$"
    )
    .expect("requirement regex is valid");
    static ref VERSION_CLAUSE: Regex =
        Regex::new(r"^\s*(===|==|!=|~=|<=|>=|<|>)\s*[A-Za-z0-9][A-Za-z0-9.*+!_-]*\s*$")
            .expect("version clause regex is valid");
    static ref MARKER: Regex =
        Regex::new(r#"^[A-Za-z0-9_.\s'"<>=!~(),-]+$"#).expect("marker regex is valid");
    static ref PACKAGE_NAME: Regex =
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("package name regex is valid");
    static ref SEPARATOR_RUN: Regex = Regex::new(r"[-_.]+").expect("separator regex is valid");
}

const VCS_MARKERS: &[&str] = &["git+", "hg+", "svn+", "bzr+"];

/// One validated dependency declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequirementEntry {
    /// Specifier exactly as given (surrounding whitespace trimmed); passed to pip verbatim.
    pub raw: String,
    /// Normalized package identity.
    pub name: String,
}

/// Normalize a package name: lowercase, every run of `-`, `_`, `.` collapsed to `-`.
pub fn normalize_name(name: &str) -> String {
    SEPARATOR_RUN
        .replace_all(&name.trim().to_lowercase(), "-")
        .into_owned()
}

/// Parse and validate one requirement string.
pub fn parse_requirement(raw: &str) -> RuntimeResult<RequirementEntry> {
    let trimmed = raw.trim();
    let reject = |reason: &str| RuntimeError::InvalidRequirement {
        requirement: raw.to_string(),
        reason: reason.to_string(),
    };

    if trimmed.is_empty() {
        return Err(reject("requirement is empty"));
    }
    if trimmed.starts_with('-') {
        return Err(reject("option flags are not allowed"));
    }
    let lower = trimmed.to_lowercase();
    if VCS_MARKERS.iter().any(|m| lower.contains(m)) {
        return Err(reject("VCS references are not allowed"));
    }
    if trimmed.contains("://") {
        return Err(reject("URLs are not allowed"));
    }
    if trimmed.contains('/') || trimmed.contains('\\') {
        return Err(reject("local paths are not allowed"));
    }
    if trimmed.contains('@') {
        return Err(reject("direct references are not allowed"));
    }

    let caps = NAME_EXTRAS_REST
        .captures(trimmed)
        .ok_or_else(|| reject("expected <name>[extras]<version constraints>"))?;
    let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    let rest = caps.get(3).map(|m| m.as_str()).unwrap_or_default();

    let (constraints, marker) = match rest.split_once(';') {
        Some((c, m)) => (c, Some(m)),
        None => (rest, None),
    };

    let constraints = constraints.trim();
    if !constraints.is_empty() && !constraints.split(',').all(|c| VERSION_CLAUSE.is_match(c)) {
        return Err(reject("malformed version constraint"));
    }
    if let Some(marker) = marker {
        let marker = marker.trim();
        if marker.is_empty() || !MARKER.is_match(marker) {
            return Err(reject("malformed environment marker"));
        }
    }

    Ok(RequirementEntry {
        raw: trimmed.to_string(),
        name: normalize_name(name),
    })
}

/// Strict batch parse: deduplicates by raw string, fails on the first invalid entry.
pub fn parse_requirements<S: AsRef<str>>(raws: &[S]) -> RuntimeResult<Vec<RequirementEntry>> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for raw in raws {
        let entry = parse_requirement(raw.as_ref())?;
        if seen.insert(entry.raw.clone()) {
            out.push(entry);
        }
    }
    Ok(out)
}

/// Lenient batch parse used by aggregation and cleanup planning: invalid entries are skipped.
pub fn parse_requirements_lenient<S: AsRef<str>>(raws: &[S]) -> Vec<RequirementEntry> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for raw in raws {
        match parse_requirement(raw.as_ref()) {
            Ok(entry) => {
                if seen.insert(entry.raw.clone()) {
                    out.push(entry);
                }
            }
            Err(e) => tracing::debug!(requirement = %raw.as_ref(), "Skipping requirement: {}", e),
        }
    }
    out
}

/// Validate a bare package name (uninstall targets) and return it normalized.
pub fn normalize_package_name(name: &str) -> RuntimeResult<String> {
    let trimmed = name.trim();
    if !PACKAGE_NAME.is_match(trimmed) {
        return Err(RuntimeError::InvalidPackageName {
            name: name.to_string(),
        });
    }
    Ok(normalize_name(trimmed))
}
