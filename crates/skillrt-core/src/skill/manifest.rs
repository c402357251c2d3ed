//! Lenient manifest parsing: a manifest is arbitrary JSON that may carry a
//! `python_packages` string list. Anything else means "declares nothing".

use serde::Deserialize;

#[derive(Deserialize, Debug, Default)]
struct ManifestPackages {
    #[serde(default)]
    python_packages: Option<serde_json::Value>,
}

/// Declared Python requirement strings, in manifest order. Absent field, wrong
/// shape or malformed JSON all yield an empty list; non-string items are skipped.
pub fn declared_python_packages(manifest: Option<&str>) -> Vec<String> {
    let Some(text) = manifest.map(str::trim).filter(|t| !t.is_empty()) else {
        return Vec::new();
    };
    let parsed: ManifestPackages = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            tracing::debug!("Ignoring malformed skill manifest: {}", e);
            return Vec::new();
        }
    };
    match parsed.python_packages {
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}
