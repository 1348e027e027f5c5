//! SQLite catalog of model files, tags and app settings.
//!
//! One connection guarded by one mutex: the store is single-writer and every
//! mutating call runs in its own transaction, which is the atomicity unit a
//! concurrent scan and an on-demand refresh rely on.

mod models;
mod query;
mod schema;
mod settings;
mod tags;
mod types;

pub use query::{FacetQuery, ModelQuery, SortField, SortOrder, TagMode};
pub use types::{
    MetaBlob, ModelPage, ModelPathEntry, ModelRecord, ModelUpsert, Tag, TagCount, TypeCount,
    UpsertOutcome,
};

use crate::config::StoreConfig;
use crate::error::{HikazeError, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Persistent catalog backed by SQLite.
///
/// Cloning is cheap and every clone shares the same connection.
#[derive(Clone)]
pub struct CatalogStore {
    db_path: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

impl CatalogStore {
    /// Open (creating if needed) the catalog at `db_path`.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| HikazeError::Io {
                    message: format!("Failed to create directory {}", parent.display()),
                    path: Some(parent.to_path_buf()),
                    source: Some(e),
                })?;
            }
        }

        let mut conn = Connection::open(&db_path)?;
        Self::configure_connection(&conn)?;
        schema::ensure_schema(&mut conn)?;
        debug!("Opened catalog at {}", db_path.display());

        Ok(Self {
            db_path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.busy_timeout(StoreConfig::BUSY_TIMEOUT)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA foreign_keys=ON;
            ",
        )?;
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| HikazeError::Database {
            message: "Failed to acquire connection lock".to_string(),
            source: None,
        })
    }
}

/// Current time as epoch milliseconds.
pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use tempfile::TempDir;

    pub fn create_test_store() -> (CatalogStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = CatalogStore::open(temp_dir.path().join("catalog.sqlite3")).unwrap();
        (store, temp_dir)
    }

    pub fn upsert(store: &CatalogStore, path: &str, model_type: &str) -> UpsertOutcome {
        let name = Path::new(path)
            .file_name()
            .unwrap()
            .to_string_lossy()
            .into_owned();
        store
            .upsert_model(&ModelUpsert::new(path, name, model_type, 100))
            .unwrap()
    }

    /// Hold the store's connection, stalling every other store call.
    pub fn connection(store: &CatalogStore) -> MutexGuard<'_, Connection> {
        store.lock().unwrap()
    }
}
