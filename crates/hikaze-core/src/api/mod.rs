//! API implementation submodules.
//!
//! Each submodule contains `impl HikazeApi` blocks that extend the public API
//! with domain-specific methods. The struct definition remains in `lib.rs`.

mod builder;
mod jobs;
mod models;
mod scan;
mod system;
mod tags;

pub use builder::HikazeApiBuilder;
pub use models::{ModelDetail, ModelDetailPage, ModelRef};
pub use system::{DbHealth, HealthReport, RootsUpdate, SettingsUpdate, VersionInfo};

use crate::config::AppConfig;
use crate::error::{HikazeError, Result};
use crate::jobs::JobRegistry;
use crate::quick_tag::QuickTagger;
use crate::scanner::Scanner;
use crate::store::CatalogStore;
use crate::HikazeApi;
use std::sync::{Arc, PoisonError, RwLock};

/// Everything a `HikazeApi` clone shares.
pub(crate) struct ApiState {
    pub(crate) store: CatalogStore,
    pub(crate) config: RwLock<AppConfig>,
    pub(crate) jobs: Arc<JobRegistry>,
    pub(crate) scanner: Scanner,
    pub(crate) quick_tag: QuickTagger,
}

impl ApiState {
    pub(crate) fn config(&self) -> AppConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl HikazeApi {
    /// Run a synchronous store operation on the blocking pool.
    ///
    /// SQLite calls wait on the connection mutex and on disk; keeping them
    /// off the async workers lets a long scan transaction delay a request
    /// without stalling the runtime.
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&ApiState) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let state = self.state.clone();
        tokio::task::spawn_blocking(move || f(&state))
            .await
            .map_err(|e| HikazeError::Other(format!("Blocking task failed: {}", e)))?
    }
}
