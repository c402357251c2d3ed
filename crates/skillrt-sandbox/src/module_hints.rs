//! Missing-module detection in interpreter output.
//!
//! Extracts the top-level module of every "No module named ..." message, maps
//! well-known import names to their distribution, and keeps only names that
//! pass requirement validation.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

use skillrt_core::requirement::{parse_requirement, RequirementEntry};

lazy_static! {
    static ref MODULE_NOT_FOUND: Regex =
        Regex::new(r#"ModuleNotFoundError: No module named ['"]([^'"\s]+)['"]"#)
            .expect("module-not-found regex is valid");
    static ref IMPORT_ERROR: Regex =
        Regex::new(r#"ImportError: No module named ['"]?([A-Za-z0-9_.]+)['"]?"#)
            .expect("import-error regex is valid");
}

/// Import names whose distribution is published under a different name.
const PYTHON_ALIASES: &[(&str, &str)] = &[
    ("cv2", "opencv-python"),
    ("PIL", "pillow"),
    ("sklearn", "scikit-learn"),
    ("bs4", "beautifulsoup4"),
    ("yaml", "pyyaml"),
    ("dotenv", "python-dotenv"),
    ("jwt", "pyjwt"),
    ("skimage", "scikit-image"),
    ("Crypto", "pycryptodome"),
    ("serial", "pyserial"),
    ("docx", "python-docx"),
    ("pptx", "python-pptx"),
    ("dateutil", "python-dateutil"),
    ("magic", "python-magic"),
    ("fitz", "pymupdf"),
    ("attr", "attrs"),
];

/// Distribution name for an import name.
pub fn distribution_for(module: &str) -> &str {
    PYTHON_ALIASES
        .iter()
        .find(|(import, _)| *import == module)
        .map(|(_, dist)| *dist)
        .unwrap_or(module)
}

/// Installable requirements for every missing module reported in `output`,
/// first-seen order, deduplicated by normalized name.
pub fn missing_requirements(output: &str) -> Vec<RequirementEntry> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    let captures = MODULE_NOT_FOUND
        .captures_iter(output)
        .chain(IMPORT_ERROR.captures_iter(output));
    for cap in captures {
        let Some(module) = cap.get(1).map(|m| m.as_str()) else {
            continue;
        };
        let top = module.split('.').next().unwrap_or(module);
        if top.is_empty() {
            continue;
        }
        match parse_requirement(distribution_for(top)) {
            Ok(entry) => {
                if seen.insert(entry.name.clone()) {
                    out.push(entry);
                }
            }
            Err(e) => tracing::debug!(module = %module, "Ignoring unsafe module hint: {}", e),
        }
    }
    out
}
