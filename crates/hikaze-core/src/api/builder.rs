//! Builder for configuring HikazeApi initialization.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use tokio::runtime::Handle;
use tracing::info;

use crate::api::ApiState;
use crate::classifier::RootSet;
use crate::config::{normalize_roots, AppConfig, StoreConfig};
use crate::error::{HikazeError, Result};
use crate::jobs::JobRegistry;
use crate::quick_tag::QuickTagger;
use crate::scanner::Scanner;
use crate::store::CatalogStore;
use crate::HikazeApi;

/// Builder for configuring HikazeApi initialization.
///
/// # Example
///
/// ```rust,ignore
/// use hikaze_core::{AppConfig, HikazeApi};
///
/// let api = HikazeApi::builder("./hikaze-data")
///     .config(AppConfig::default())
///     .build()
///     .await?;
/// ```
pub struct HikazeApiBuilder {
    data_root: PathBuf,
    config: Option<AppConfig>,
    jobs: Option<Arc<JobRegistry>>,
}

impl HikazeApiBuilder {
    /// Create a new builder with the data root directory.
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            config: None,
            jobs: None,
        }
    }

    /// Use this configuration instead of loading `config.json`.
    ///
    /// The configuration is not written back until the roots change.
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Share an existing job registry, e.g. one with a custom TTL.
    pub fn job_registry(mut self, jobs: Arc<JobRegistry>) -> Self {
        self.jobs = Some(jobs);
        self
    }

    /// Build the HikazeApi instance.
    ///
    /// Must be called inside a tokio runtime; background jobs are spawned on
    /// that runtime's blocking pool.
    pub async fn build(self) -> Result<HikazeApi> {
        let runtime = Handle::try_current().map_err(|e| HikazeError::Config {
            message: format!("HikazeApi requires a tokio runtime: {}", e),
        })?;

        if !self.data_root.exists() {
            std::fs::create_dir_all(&self.data_root).map_err(|e| HikazeError::Io {
                message: format!("Failed to create data root: {}", self.data_root.display()),
                path: Some(self.data_root.clone()),
                source: Some(e),
            })?;
        }

        let mut config = match self.config {
            Some(config) => config,
            None => AppConfig::load(&self.data_root)?,
        };
        config.model_roots = normalize_roots(&config.model_roots);

        let db_path = self.data_root.join(StoreConfig::DB_FILENAME);
        let store = tokio::task::spawn_blocking(move || CatalogStore::open(db_path))
            .await
            .map_err(|e| HikazeError::Other(format!("Failed to open catalog: {}", e)))??;

        let jobs = self.jobs.unwrap_or_else(|| Arc::new(JobRegistry::new()));
        let roots = RootSet::new(&config.model_roots);
        let scanner = Scanner::new(store.clone(), roots, jobs.clone(), runtime.clone());
        let quick_tag = QuickTagger::new(store.clone(), jobs.clone(), runtime);

        info!(
            "Hikaze catalog ready at {} ({} model roots)",
            self.data_root.display(),
            config.model_roots.len()
        );

        Ok(HikazeApi {
            data_root: self.data_root,
            state: Arc::new(ApiState {
                store,
                config: RwLock::new(config),
                jobs,
                scanner,
                quick_tag,
            }),
        })
    }
}
