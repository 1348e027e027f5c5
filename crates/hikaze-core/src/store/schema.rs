//! Catalog schema creation and version check.

use crate::classifier::SYSTEM_TYPES;
use crate::config::StoreConfig;
use crate::error::Result;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{info, warn};

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS models (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL UNIQUE,
    name TEXT,
    type TEXT NOT NULL,
    size_bytes INTEGER,
    hash_hex TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    meta_json TEXT,
    extra_json TEXT
);
CREATE INDEX IF NOT EXISTS idx_models_hash ON models(hash_hex);
CREATE INDEX IF NOT EXISTS idx_models_type ON models(type);

CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    color TEXT,
    created_at INTEGER
);

CREATE TABLE IF NOT EXISTS model_tags (
    model_id INTEGER NOT NULL,
    tag_id INTEGER NOT NULL,
    PRIMARY KEY (model_id, tag_id),
    FOREIGN KEY(model_id) REFERENCES models(id) ON DELETE CASCADE,
    FOREIGN KEY(tag_id) REFERENCES tags(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS app_settings (
    key TEXT PRIMARY KEY,
    value TEXT
);
";

/// Catalog tables dropped when the stored layout is not the current one.
/// Settings survive a rebuild.
const DROP_SQL: &str = "
DROP TABLE IF EXISTS model_tags;
DROP TABLE IF EXISTS tags;
DROP TABLE IF EXISTS models;
DROP TABLE IF EXISTS directories;
DROP TABLE IF EXISTS schema_version;
";

const MODEL_COLUMNS: &[&str] = &[
    "id",
    "path",
    "name",
    "type",
    "size_bytes",
    "hash_hex",
    "created_at",
    "meta_json",
    "extra_json",
];

pub(super) fn ensure_schema(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;

    let version = stored_version(&tx);
    let current = version == Some(StoreConfig::SCHEMA_VERSION) && model_columns_match(&tx)?;
    if !current {
        if version.is_some() {
            warn!(
                "Catalog schema version {:?} is not {}, rebuilding",
                version,
                StoreConfig::SCHEMA_VERSION
            );
        } else {
            info!("Creating catalog schema v{}", StoreConfig::SCHEMA_VERSION);
        }
        tx.execute_batch(DROP_SQL)?;
        tx.execute_batch(SCHEMA_SQL)?;
        tx.execute(
            "INSERT INTO schema_version(version) VALUES (?1)",
            params![StoreConfig::SCHEMA_VERSION],
        )?;
    }

    let now = super::now_ms();
    for name in SYSTEM_TYPES {
        tx.execute(
            "INSERT OR IGNORE INTO tags(name, created_at) VALUES (?1, ?2)",
            params![name, now],
        )?;
    }
    tx.execute(
        "INSERT OR IGNORE INTO app_settings(key, value) VALUES ('language', ?1)",
        params![StoreConfig::DEFAULT_LANGUAGE],
    )?;

    tx.commit()?;
    Ok(())
}

/// The recorded schema version; `None` when the table is missing or empty.
fn stored_version(conn: &Connection) -> Option<i64> {
    conn.query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
        row.get(0)
    })
    .optional()
    .ok()
    .flatten()
}

fn model_columns_match(conn: &Connection) -> Result<bool> {
    let mut stmt = conn.prepare("PRAGMA table_info(models)")?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns == MODEL_COLUMNS)
}
