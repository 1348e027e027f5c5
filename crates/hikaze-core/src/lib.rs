//! Hikaze Core - headless catalog engine for machine-learning model files.
//!
//! The crate scans configured directory roots, classifies model files by
//! type, hashes them, and keeps a taggable SQLite catalog. It can be used
//! programmatically without any HTTP layer; `hikaze-server` is a thin axum
//! front end over [`HikazeApi`].
//!
//! # Example
//!
//! ```rust,ignore
//! use hikaze_core::{HikazeApi, ModelQuery};
//!
//! #[tokio::main]
//! async fn main() -> hikaze_core::Result<()> {
//!     let api = HikazeApi::builder("/path/to/data").build().await?;
//!
//!     api.start_scan(None, false);
//!     api.wait_for_scan().await;
//!
//!     let page = api.list_models(ModelQuery::default()).await?;
//!     println!("Catalog holds {} models", page.total);
//!     Ok(())
//! }
//! ```

pub mod cancel;
pub mod classifier;
pub mod config;
pub mod error;
pub mod hashing;
pub mod jobs;
pub mod paths;
pub mod quick_tag;
pub mod scanner;
pub mod store;
pub mod walker;

mod api;

// Re-export commonly used types
pub use api::{
    DbHealth, HealthReport, HikazeApiBuilder, ModelDetail, ModelDetailPage, ModelRef,
    RootsUpdate, SettingsUpdate, VersionInfo,
};
pub use cancel::CancellationToken;
pub use classifier::{classify, ModelRoot, RootSet};
pub use config::AppConfig;
pub use error::{HikazeError, Result};
pub use jobs::{JobInfo, JobKind, JobRegistry, JobStatus};
pub use scanner::{ScanStats, ScanStatus, Scanner};
pub use store::{
    CatalogStore, FacetQuery, MetaBlob, ModelPage, ModelQuery, ModelRecord, ModelUpsert,
    SortField, SortOrder, Tag, TagCount, TagMode, TypeCount,
};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use api::ApiState;

/// Main entry point for catalog operations.
///
/// Owns the store, the job registry and the two background workers. Cloning
/// is cheap; every clone drives the same catalog, so one value can be shared
/// between HTTP handlers.
#[derive(Clone)]
pub struct HikazeApi {
    data_root: PathBuf,
    state: Arc<ApiState>,
}

impl HikazeApi {
    /// Create a builder for HikazeApi.
    pub fn builder(data_root: impl Into<PathBuf>) -> HikazeApiBuilder {
        HikazeApiBuilder::new(data_root)
    }

    /// Open the catalog under `data_root` with its persisted configuration.
    pub async fn new(data_root: impl Into<PathBuf>) -> Result<Self> {
        Self::builder(data_root).build().await
    }

    /// Directory holding the database and `config.json`.
    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    /// Direct access to the catalog store.
    pub fn store(&self) -> &CatalogStore {
        &self.state.store
    }
}
