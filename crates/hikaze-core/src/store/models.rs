//! Model rows: upsert with type-tag reconciliation, lookups and deletes.

use super::tags::{attach_tag, detach_tag_by_name, normalize_tag_name};
use super::types::{MetaBlob, ModelPathEntry, ModelRecord, ModelUpsert, UpsertOutcome};
use super::CatalogStore;
use crate::error::{HikazeError, Result};
use rusqlite::{params, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use tracing::debug;

pub(super) const MODEL_SELECT: &str = "SELECT m.id, m.path, m.name, m.type, m.size_bytes, \
     m.hash_hex, m.created_at, m.meta_json, m.extra_json FROM models m";

pub(super) fn row_to_record(row: &Row) -> rusqlite::Result<ModelRecord> {
    let path: String = row.get(1)?;
    let hash_hex: String = row.get(5)?;
    let size_bytes: Option<i64> = row.get(4)?;
    Ok(ModelRecord {
        id: row.get(0)?,
        path: PathBuf::from(path),
        name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        model_type: row.get(3)?,
        size_bytes: size_bytes.unwrap_or(0).max(0) as u64,
        hash_hex: (!hash_hex.is_empty()).then_some(hash_hex),
        created_at: row.get(6)?,
        meta: MetaBlob::from_column(row.get(7)?),
        extra: MetaBlob::from_column(row.get(8)?),
    })
}

pub(super) fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl CatalogStore {
    /// Insert a model, or update it in place when the path is known.
    ///
    /// `id` and `created_at` of an existing row never change. The type-tag
    /// is reconciled in the same transaction: the new type's tag is attached
    /// and, if the type changed, only the old type's tag is detached. A
    /// missing hash keeps whatever hash is stored at commit time.
    pub fn upsert_model(&self, upsert: &ModelUpsert) -> Result<UpsertOutcome> {
        let model_type = normalize_tag_name(&upsert.model_type)
            .map_err(|_| HikazeError::validation("type", "model type must not be empty"))?;
        let path = path_key(&upsert.path);
        let hash_hex = upsert.hash_hex.as_deref().filter(|h| !h.is_empty());
        let size = i64::try_from(upsert.size_bytes).unwrap_or(i64::MAX);

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let existing: Option<(i64, String)> = tx
            .query_row(
                "SELECT id, type FROM models WHERE path = ?1",
                params![path],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let (id, created, old_type) = match existing {
            Some((id, old_type)) => {
                match &upsert.meta {
                    Some(meta) => tx.execute(
                        "UPDATE models SET name = ?1, type = ?2, size_bytes = ?3,
                                hash_hex = COALESCE(?4, hash_hex), meta_json = ?5
                         WHERE id = ?6",
                        params![upsert.name, model_type, size, hash_hex, meta.as_json_str(), id],
                    )?,
                    None => tx.execute(
                        "UPDATE models SET name = ?1, type = ?2, size_bytes = ?3,
                                hash_hex = COALESCE(?4, hash_hex)
                         WHERE id = ?5",
                        params![upsert.name, model_type, size, hash_hex, id],
                    )?,
                };
                (id, false, Some(old_type))
            }
            None => {
                let meta = upsert.meta.as_ref().and_then(|m| m.as_json_str());
                tx.execute(
                    "INSERT INTO models(path, name, type, size_bytes, hash_hex, created_at,
                                        meta_json, extra_json)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL)",
                    params![
                        path,
                        upsert.name,
                        model_type,
                        size,
                        hash_hex.unwrap_or_default(),
                        upsert.created_at_ms,
                        meta
                    ],
                )?;
                (tx.last_insert_rowid(), true, None)
            }
        };

        attach_tag(&tx, id, &model_type)?;
        if let Some(old_type) = old_type.filter(|t| *t != model_type) {
            detach_tag_by_name(&tx, id, &old_type)?;
            debug!("Model {} changed type {} -> {}", id, old_type, model_type);
        }

        tx.commit()?;
        debug!("Upserted model {} ({})", id, path);
        Ok(UpsertOutcome { id, created })
    }

    pub fn get_by_id(&self, id: i64) -> Result<Option<ModelRecord>> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                &format!("{MODEL_SELECT} WHERE m.id = ?1"),
                params![id],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    pub fn get_by_path(&self, path: &Path) -> Result<Option<ModelRecord>> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                &format!("{MODEL_SELECT} WHERE m.path = ?1"),
                params![path_key(path)],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    /// Remove a catalog row and its tag links. The file itself is left alone.
    pub fn delete_model(&self, id: i64) -> Result<bool> {
        let conn = self.lock()?;
        let rows = conn.execute("DELETE FROM models WHERE id = ?1", params![id])?;
        if rows > 0 {
            debug!("Deleted model {}", id);
        }
        Ok(rows > 0)
    }

    pub fn set_extra(&self, id: i64, extra: &MetaBlob) -> Result<()> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "UPDATE models SET extra_json = ?1 WHERE id = ?2",
            params![extra.as_json_str(), id],
        )?;
        if rows == 0 {
            return Err(HikazeError::model_not_found(id));
        }
        Ok(())
    }

    /// Every catalogued path, in id order.
    pub fn all_model_paths(&self) -> Result<Vec<ModelPathEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id, path, type FROM models ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(ModelPathEntry {
                id: row.get(0)?,
                path: PathBuf::from(row.get::<_, String>(1)?),
                model_type: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn count_models(&self) -> Result<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM models", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
