//! Health, settings and model-root methods on HikazeApi.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::PoisonError;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::classifier::RootSet;
use crate::config::{normalize_roots, StoreConfig};
use crate::error::Result;
use crate::scanner::ScanStatus;
use crate::HikazeApi;

/// Crate version reported by `/health` and `/version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbHealth {
    pub ready: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub version: String,
    pub db: DbHealth,
    pub scanning: ScanStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub schema: i64,
}

/// Settings a client may change. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsUpdate {
    #[serde(default)]
    pub language: Option<String>,
}

/// Result of replacing the model roots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootsUpdate {
    pub roots: Vec<PathBuf>,
    /// Records whose type changed under the new roots.
    pub migrated: usize,
}

impl HikazeApi {
    // ========================================
    // Health
    // ========================================

    pub async fn health(&self) -> HealthReport {
        let ready = self
            .blocking(|state| state.store.count_models())
            .await
            .is_ok();
        HealthReport {
            status: if ready { "ok" } else { "degraded" }.to_string(),
            version: VERSION.to_string(),
            db: DbHealth { ready },
            scanning: self.scan_status(),
        }
    }

    pub fn version(&self) -> VersionInfo {
        VersionInfo {
            version: VERSION.to_string(),
            schema: StoreConfig::SCHEMA_VERSION,
        }
    }

    // ========================================
    // Settings
    // ========================================

    pub async fn settings(&self) -> Result<BTreeMap<String, String>> {
        self.blocking(|state| state.store.list_settings()).await
    }

    /// Apply `update` and return the full settings map.
    ///
    /// A blank language is ignored rather than stored.
    pub async fn update_settings(&self, update: SettingsUpdate) -> Result<BTreeMap<String, String>> {
        self.blocking(move |state| {
            if let Some(language) = update.language.as_deref().map(str::trim) {
                if !language.is_empty() {
                    state.store.set_setting("language", language)?;
                }
            }
            state.store.list_settings()
        })
        .await
    }

    // ========================================
    // Model Roots
    // ========================================

    /// Configured model roots, absolute and sorted.
    pub fn model_roots(&self) -> Vec<PathBuf> {
        self.state.config().model_roots
    }

    /// Replace the model roots, persist them, and reclassify the catalog.
    ///
    /// A scan already in progress keeps the roots it started with.
    pub async fn set_model_roots(&self, roots: Vec<PathBuf>) -> Result<RootsUpdate> {
        let data_root = self.data_root.clone();
        self.blocking(move |state| {
            let roots = normalize_roots(&roots);
            let mut config = state.config();
            config.model_roots = roots.clone();
            config.save(&data_root)?;
            *state.config.write().unwrap_or_else(PoisonError::into_inner) = config;

            let root_set = RootSet::new(&roots);
            state.scanner.set_roots(root_set.clone());
            let migrated = state.store.migrate_types_by_roots(&root_set)?;
            info!(
                "Model roots set to {} entries, {} records reclassified",
                roots.len(),
                migrated
            );
            Ok(RootsUpdate { roots, migrated })
        })
        .await
    }
}
