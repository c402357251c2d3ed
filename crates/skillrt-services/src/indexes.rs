//! Index configuration and the manual package set, persisted in the settings store.

use std::collections::BTreeSet;

use skillrt_core::indexes::{
    decode_list, encode_list, IndexConfig, IndexConfigPatch, INDEX_KEYS, KEY_MANUAL_PACKAGES,
};
use skillrt_core::requirement::normalize_name;
use skillrt_core::RuntimeResult;

use crate::RuntimeService;

impl RuntimeService {
    pub fn get_indexes(&self) -> RuntimeResult<IndexConfig> {
        let values = self.settings.get(INDEX_KEYS)?;
        Ok(IndexConfig::from_settings(&values))
    }

    /// Apply provided fields only. Nothing is written when validation fails.
    pub fn update_indexes(&self, patch: IndexConfigPatch) -> RuntimeResult<IndexConfig> {
        let mut config = self.get_indexes()?;
        for (key, value) in config.apply(patch)? {
            self.settings.upsert(&key, &value)?;
        }
        tracing::info!(
            index_url = ?config.index_url,
            extras = config.extra_index_urls.len(),
            trusted_hosts = config.trusted_hosts.len(),
            "Index configuration updated"
        );
        Ok(config)
    }

    /// Normalized names an administrator installed explicitly.
    pub fn manual_packages(&self) -> RuntimeResult<BTreeSet<String>> {
        let values = self.settings.get(&[KEY_MANUAL_PACKAGES])?;
        Ok(decode_list(values.get(KEY_MANUAL_PACKAGES))
            .iter()
            .map(|n| normalize_name(n))
            .collect())
    }

    pub(crate) fn save_manual_packages(&self, packages: &BTreeSet<String>) -> RuntimeResult<()> {
        self.settings.upsert(KEY_MANUAL_PACKAGES, &encode_list(packages))
    }
}
