//! Tags, model-tag links, facets and type reclassification.

use super::query::{FacetQuery, ModelFilter};
use super::types::{Tag, TagCount, TypeCount};
use super::CatalogStore;
use crate::classifier::{classify, is_system_type, RootSet};
use crate::error::{HikazeError, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::{debug, info};

/// Trim and lower-case a tag name, rejecting empty names.
pub fn normalize_tag_name(name: &str) -> Result<String> {
    let name = name.trim().to_lowercase();
    if name.is_empty() {
        return Err(HikazeError::validation("tag", "tag name must not be empty"));
    }
    Ok(name)
}

pub(super) fn get_or_create_tag_id(conn: &Connection, name: &str) -> Result<i64> {
    let name = normalize_tag_name(name)?;
    if let Some(id) = conn
        .query_row("SELECT id FROM tags WHERE name = ?1", params![name], |row| {
            row.get(0)
        })
        .optional()?
    {
        return Ok(id);
    }
    conn.execute(
        "INSERT INTO tags(name, created_at) VALUES (?1, ?2)",
        params![name, super::now_ms()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(super) fn attach_tag(conn: &Connection, model_id: i64, name: &str) -> Result<()> {
    let tag_id = get_or_create_tag_id(conn, name)?;
    conn.execute(
        "INSERT OR IGNORE INTO model_tags(model_id, tag_id) VALUES (?1, ?2)",
        params![model_id, tag_id],
    )?;
    Ok(())
}

pub(super) fn detach_tag_by_name(conn: &Connection, model_id: i64, name: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM model_tags
         WHERE model_id = ?1 AND tag_id IN (SELECT id FROM tags WHERE name = ?2)",
        params![model_id, name],
    )?;
    Ok(())
}

fn model_tag_names(conn: &Connection, model_id: i64) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT t.name FROM model_tags mt JOIN tags t ON mt.tag_id = t.id
         WHERE mt.model_id = ?1 ORDER BY t.name",
    )?;
    let names = stmt
        .query_map(params![model_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(names)
}

fn row_to_tag(row: &rusqlite::Row) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        name: row.get(1)?,
        color: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn row_to_tag_count(row: &rusqlite::Row) -> rusqlite::Result<TagCount> {
    Ok(TagCount {
        id: row.get(0)?,
        name: row.get(1)?,
        color: row.get(2)?,
        count: row.get::<_, i64>(3)?.max(0) as u64,
    })
}

impl CatalogStore {
    /// Add and remove tags on a model and return its resulting tag names.
    ///
    /// The model's current type is read inside the transaction. Removing its
    /// type-tag is a validation error, and names in `add` that are some other
    /// type are skipped, so the record always carries exactly one type-tag.
    /// Unknown names in `add` are created.
    pub fn set_model_tags(
        &self,
        model_id: i64,
        add: &[String],
        remove: &[String],
    ) -> Result<Vec<String>> {
        let add = add
            .iter()
            .map(|n| normalize_tag_name(n))
            .collect::<Result<Vec<_>>>()?;
        let remove = remove
            .iter()
            .map(|n| normalize_tag_name(n))
            .collect::<Result<Vec<_>>>()?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let model_type: String = tx
            .query_row(
                "SELECT type FROM models WHERE id = ?1",
                params![model_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| HikazeError::model_not_found(model_id))?;

        if remove.contains(&model_type) {
            return Err(HikazeError::validation(
                "remove",
                "cannot remove system type tag",
            ));
        }

        for name in &add {
            if *name != model_type && is_type_name(&tx, name)? {
                debug!("Skipping type tag '{}' on {} model {}", name, model_type, model_id);
                continue;
            }
            attach_tag(&tx, model_id, name)?;
        }
        for name in &remove {
            detach_tag_by_name(&tx, model_id, name)?;
        }
        attach_tag(&tx, model_id, &model_type)?;

        let names = model_tag_names(&tx, model_id)?;
        tx.commit()?;
        Ok(names)
    }

    pub fn list_model_tags(&self, model_id: i64) -> Result<Vec<String>> {
        let conn = self.lock()?;
        model_tag_names(&conn, model_id)
    }

    pub fn list_tags(&self) -> Result<Vec<Tag>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT id, name, color, created_at FROM tags ORDER BY name ASC")?;
        let tags = stmt
            .query_map([], row_to_tag)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tags)
    }

    /// Create a tag, or return the existing one with the same name.
    /// A given color is applied either way.
    pub fn create_tag(&self, name: &str, color: Option<&str>) -> Result<Tag> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let id = get_or_create_tag_id(&tx, name)?;
        if let Some(color) = color {
            tx.execute("UPDATE tags SET color = ?1 WHERE id = ?2", params![color, id])?;
        }
        let tag = fetch_tag(&tx, id)?;
        tx.commit()?;
        Ok(tag)
    }

    /// Rename and/or recolor a tag. Protected tags keep their name.
    pub fn update_tag(&self, tag_id: i64, name: Option<&str>, color: Option<&str>) -> Result<Tag> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let current = fetch_tag(&tx, tag_id)?;

        if let Some(name) = name {
            let name = normalize_tag_name(name)?;
            if name != current.name {
                ensure_unprotected(&tx, &current.name, "rename")?;
                let taken: bool = tx.query_row(
                    "SELECT EXISTS(SELECT 1 FROM tags WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                if taken {
                    return Err(HikazeError::validation(
                        "name",
                        format!("tag '{name}' already exists"),
                    ));
                }
                tx.execute("UPDATE tags SET name = ?1 WHERE id = ?2", params![name, tag_id])?;
            }
        }
        if let Some(color) = color {
            tx.execute("UPDATE tags SET color = ?1 WHERE id = ?2", params![color, tag_id])?;
        }

        let tag = fetch_tag(&tx, tag_id)?;
        tx.commit()?;
        Ok(tag)
    }

    /// Delete a user tag and its links. Protected tags are refused.
    pub fn delete_tag(&self, tag_id: i64) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let current = fetch_tag(&tx, tag_id)?;
        ensure_unprotected(&tx, &current.name, "delete")?;
        tx.execute("DELETE FROM tags WHERE id = ?1", params![tag_id])?;
        tx.commit()?;
        debug!("Deleted tag {} ({})", tag_id, current.name);
        Ok(())
    }

    /// Model types present in the catalog with their counts, by name.
    pub fn types_with_counts(&self) -> Result<Vec<TypeCount>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT type, COUNT(1) FROM models GROUP BY type ORDER BY type ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(TypeCount {
                    name: row.get(0)?,
                    count: row.get::<_, i64>(1)?.max(0) as u64,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Tags used by models of `model_type`, except the type-tag itself.
    pub fn list_tags_by_type(&self, model_type: &str) -> Result<Vec<TagCount>> {
        let model_type = model_type.trim().to_lowercase();
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT t.id, t.name, t.color, COUNT(DISTINCT mt.model_id) AS count
             FROM tags t
             JOIN model_tags mt ON t.id = mt.tag_id
             JOIN models m ON mt.model_id = m.id
             WHERE m.type = ?1 AND t.name != ?1
             GROUP BY t.id, t.name, t.color
             ORDER BY count DESC, t.name ASC",
        )?;
        let rows = stmt
            .query_map(params![model_type], row_to_tag_count)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Co-occurrence counts of tags among models matching the filter.
    ///
    /// Only tags with a positive count are returned, ordered by count
    /// descending then name.
    pub fn tag_facets(&self, query: &FacetQuery) -> Result<Vec<TagCount>> {
        let filter = ModelFilter::new(
            query.text.as_deref(),
            query.model_type.as_deref(),
            &query.selected,
            query.mode,
        );
        let sql = format!(
            "SELECT t.id, t.name, t.color, COUNT(DISTINCT m.id) AS count
             FROM tags t
             JOIN model_tags mt ON t.id = mt.tag_id
             JOIN models m ON mt.model_id = m.id
             {}
             GROUP BY t.id, t.name, t.color
             HAVING count > 0
             ORDER BY count DESC, t.name ASC",
            filter.where_clause()
        );

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(filter.params().as_slice(), row_to_tag_count)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Reclassify every record against `roots`, swapping type-tags where the
    /// type changed. Returns the number of records updated.
    pub fn migrate_types_by_roots(&self, roots: &RootSet) -> Result<usize> {
        if roots.is_empty() {
            return Ok(0);
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let rows: Vec<(i64, String, String)> = {
            let mut stmt = tx.prepare("SELECT id, path, type FROM models")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };

        let mut updated = 0;
        for (id, path, old_type) in rows {
            let new_type = classify(Path::new(&path), roots);
            if new_type == old_type {
                continue;
            }
            tx.execute(
                "UPDATE models SET type = ?1 WHERE id = ?2",
                params![new_type, id],
            )?;
            detach_tag_by_name(&tx, id, &old_type)?;
            attach_tag(&tx, id, &new_type)?;
            updated += 1;
        }

        tx.commit()?;
        info!("Reclassified {} models against {} roots", updated, roots.roots().len());
        Ok(updated)
    }
}

fn fetch_tag(conn: &Connection, tag_id: i64) -> Result<Tag> {
    conn.query_row(
        "SELECT id, name, color, created_at FROM tags WHERE id = ?1",
        params![tag_id],
        row_to_tag,
    )
    .optional()?
    .ok_or_else(|| HikazeError::NotFound {
        entity: "tag",
        id: tag_id.to_string(),
    })
}

/// A system type, or a tag currently serving as some model's type.
fn is_type_name(conn: &Connection, name: &str) -> Result<bool> {
    if is_system_type(name) {
        return Ok(true);
    }
    let in_use = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM models WHERE type = ?1)",
        params![name],
        |row| row.get(0),
    )?;
    Ok(in_use)
}

/// Type names cannot be renamed or deleted.
fn ensure_unprotected(conn: &Connection, name: &str, action: &str) -> Result<()> {
    if is_type_name(conn, name)? {
        return Err(HikazeError::validation(
            "tag",
            format!("cannot {action} type tag '{name}'"),
        ));
    }
    Ok(())
}
