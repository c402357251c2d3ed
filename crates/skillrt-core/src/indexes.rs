//! Package-index configuration: primary index, extra indexes, trusted hosts,
//! and the two auto-install toggles. Persisted through the settings store.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::error::{RuntimeError, RuntimeResult};

pub const KEY_INDEX_URL: &str = "python.index_url";
pub const KEY_EXTRA_INDEX_URLS: &str = "python.extra_index_urls";
pub const KEY_TRUSTED_HOSTS: &str = "python.trusted_hosts";
pub const KEY_AUTO_INSTALL_ON_ACTIVATE: &str = "python.auto_install_on_activate";
pub const KEY_AUTO_INSTALL_ON_MISSING: &str = "python.auto_install_on_missing";
pub const KEY_MANUAL_PACKAGES: &str = "python.manual_packages";

/// Every key this module reads in one `get` call.
pub const INDEX_KEYS: &[&str] = &[
    KEY_INDEX_URL,
    KEY_EXTRA_INDEX_URLS,
    KEY_TRUSTED_HOSTS,
    KEY_AUTO_INSTALL_ON_ACTIVATE,
    KEY_AUTO_INSTALL_ON_MISSING,
];

lazy_static! {
    static ref TRUSTED_HOST: Regex =
        Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9.-]*[A-Za-z0-9])?(:[0-9]{1,5})?$")
            .expect("trusted host regex is valid");
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexConfig {
    /// `None` keeps the package manager's default index.
    pub index_url: Option<String>,
    pub extra_index_urls: BTreeSet<String>,
    pub trusted_hosts: BTreeSet<String>,
    pub auto_install_on_activate: bool,
    pub auto_install_on_missing: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            index_url: None,
            extra_index_urls: BTreeSet::new(),
            trusted_hosts: BTreeSet::new(),
            auto_install_on_activate: true,
            auto_install_on_missing: true,
        }
    }
}

/// Partial update; `None` fields are left untouched. `index_url: Some("")` clears the override.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexConfigPatch {
    pub index_url: Option<String>,
    pub extra_index_urls: Option<Vec<String>>,
    pub trusted_hosts: Option<Vec<String>>,
    pub auto_install_on_activate: Option<bool>,
    pub auto_install_on_missing: Option<bool>,
}

impl IndexConfig {
    /// Read from settings values; malformed values fall back to defaults.
    pub fn from_settings(values: &HashMap<String, String>) -> Self {
        let d = Self::default();
        let index_url = values
            .get(KEY_INDEX_URL)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        Self {
            index_url,
            extra_index_urls: decode_list(values.get(KEY_EXTRA_INDEX_URLS)).into_iter().collect(),
            trusted_hosts: decode_list(values.get(KEY_TRUSTED_HOSTS)).into_iter().collect(),
            auto_install_on_activate: decode_bool(
                values.get(KEY_AUTO_INSTALL_ON_ACTIVATE),
                d.auto_install_on_activate,
            ),
            auto_install_on_missing: decode_bool(
                values.get(KEY_AUTO_INSTALL_ON_MISSING),
                d.auto_install_on_missing,
            ),
        }
    }

    /// Apply a validated patch and return the settings pairs that must be written.
    pub fn apply(&mut self, patch: IndexConfigPatch) -> RuntimeResult<Vec<(String, String)>> {
        let mut next = self.clone();
        let mut writes = Vec::new();

        if let Some(url) = patch.index_url {
            let url = url.trim().to_string();
            if url.is_empty() {
                next.index_url = None;
            } else {
                validate_index_url("indexUrl", &url)?;
                next.index_url = Some(url);
            }
            writes.push((
                KEY_INDEX_URL.to_string(),
                next.index_url.clone().unwrap_or_default(),
            ));
        }
        if let Some(urls) = patch.extra_index_urls {
            let mut set = BTreeSet::new();
            for url in urls.iter().map(|u| u.trim()).filter(|u| !u.is_empty()) {
                validate_index_url("extraIndexUrls", url)?;
                set.insert(url.to_string());
            }
            next.extra_index_urls = set;
            writes.push((
                KEY_EXTRA_INDEX_URLS.to_string(),
                encode_list(&next.extra_index_urls),
            ));
        }
        if let Some(hosts) = patch.trusted_hosts {
            let mut set = BTreeSet::new();
            for host in hosts.iter().map(|h| h.trim()).filter(|h| !h.is_empty()) {
                if !TRUSTED_HOST.is_match(host) {
                    return Err(RuntimeError::InvalidIndexConfig {
                        field: "trustedHosts".to_string(),
                        reason: format!("'{}' is not a host[:port]", host),
                    });
                }
                set.insert(host.to_lowercase());
            }
            next.trusted_hosts = set;
            writes.push((KEY_TRUSTED_HOSTS.to_string(), encode_list(&next.trusted_hosts)));
        }
        if let Some(v) = patch.auto_install_on_activate {
            next.auto_install_on_activate = v;
            writes.push((KEY_AUTO_INSTALL_ON_ACTIVATE.to_string(), v.to_string()));
        }
        if let Some(v) = patch.auto_install_on_missing {
            next.auto_install_on_missing = v;
            writes.push((KEY_AUTO_INSTALL_ON_MISSING.to_string(), v.to_string()));
        }

        *self = next;
        Ok(writes)
    }

    /// Installer flags: `--index-url`, `--extra-index-url`..., `--trusted-host`...
    pub fn to_pip_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(ref url) = self.index_url {
            args.push("--index-url".to_string());
            args.push(url.clone());
        }
        for url in &self.extra_index_urls {
            args.push("--extra-index-url".to_string());
            args.push(url.clone());
        }
        for host in &self.trusted_hosts {
            args.push("--trusted-host".to_string());
            args.push(host.clone());
        }
        args
    }
}

fn validate_index_url(field: &str, raw: &str) -> RuntimeResult<()> {
    let invalid = |reason: String| RuntimeError::InvalidIndexConfig {
        field: field.to_string(),
        reason,
    };
    if raw.chars().any(char::is_whitespace) {
        return Err(invalid(format!("'{}' contains whitespace", raw)));
    }
    let parsed = url::Url::parse(raw).map_err(|e| invalid(format!("'{}': {}", raw, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(invalid(format!("'{}' must be an http(s) URL with a host", raw)));
    }
    Ok(())
}

/// Decode a JSON string list stored in settings; anything else yields an empty list.
pub fn decode_list(value: Option<&String>) -> Vec<String> {
    value
        .and_then(|s| serde_json::from_str::<Vec<String>>(s).ok())
        .unwrap_or_default()
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn encode_list<'a, I>(items: I) -> String
where
    I: IntoIterator<Item = &'a String>,
{
    let v: Vec<&String> = items.into_iter().collect();
    serde_json::to_string(&v).unwrap_or_else(|_| "[]".to_string())
}

fn decode_bool(value: Option<&String>, default: bool) -> bool {
    match value.map(|s| s.trim().to_lowercase()) {
        Some(s) if matches!(s.as_str(), "1" | "true" | "yes" | "on") => true,
        Some(s) if matches!(s.as_str(), "0" | "false" | "no" | "off") => false,
        _ => default,
    }
}
