//! Filtered, paginated model queries.

use super::models::{row_to_record, MODEL_SELECT};
use super::types::ModelPage;
use super::CatalogStore;
use crate::config::StoreConfig;
use crate::error::{HikazeError, Result};
use rusqlite::ToSql;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How a tag list filters models.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagMode {
    /// Every listed tag must be present.
    #[default]
    All,
    /// At least one listed tag must be present.
    Any,
}

impl FromStr for TagMode {
    type Err = HikazeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "all" | "" => Ok(TagMode::All),
            "any" => Ok(TagMode::Any),
            other => Err(HikazeError::validation(
                "tags_mode",
                format!("expected 'all' or 'any', got '{other}'"),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    #[default]
    Created,
    Name,
    Size,
    Type,
    /// Kept for older clients; sorts by creation time.
    Mtime,
}

impl SortField {
    fn column(self) -> &'static str {
        match self {
            SortField::Created | SortField::Mtime => "m.created_at",
            SortField::Name => "m.name",
            SortField::Size => "m.size_bytes",
            SortField::Type => "m.type",
        }
    }
}

impl FromStr for SortField {
    type Err = HikazeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "created" | "" => Ok(SortField::Created),
            "name" => Ok(SortField::Name),
            "size" => Ok(SortField::Size),
            "type" => Ok(SortField::Type),
            "mtime" => Ok(SortField::Mtime),
            other => Err(HikazeError::validation(
                "sort",
                format!("unknown sort field '{other}'"),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    fn sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = HikazeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" | "" => Ok(SortOrder::Desc),
            other => Err(HikazeError::validation(
                "order",
                format!("expected 'asc' or 'desc', got '{other}'"),
            )),
        }
    }
}

/// Model listing parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelQuery {
    /// Case-insensitive substring of name or path.
    pub text: Option<String>,
    pub model_type: Option<String>,
    pub tags: Vec<String>,
    pub tag_mode: TagMode,
    pub limit: u32,
    pub offset: u32,
    pub sort: SortField,
    pub order: SortOrder,
}

impl Default for ModelQuery {
    fn default() -> Self {
        Self {
            text: None,
            model_type: None,
            tags: Vec::new(),
            tag_mode: TagMode::All,
            limit: StoreConfig::DEFAULT_PAGE_SIZE,
            offset: 0,
            sort: SortField::Created,
            order: SortOrder::Desc,
        }
    }
}

/// Filter for tag facets: the same model filters minus pagination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FacetQuery {
    pub model_type: Option<String>,
    pub text: Option<String>,
    pub selected: Vec<String>,
    pub mode: TagMode,
}

/// Escape `%`, `_` and the escape character itself for `LIKE ... ESCAPE '\'`.
fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// WHERE clause over `models m` shared by listing and facets.
pub(super) struct ModelFilter {
    clauses: Vec<String>,
    params: Vec<Box<dyn ToSql>>,
}

impl ModelFilter {
    pub(super) fn new(
        text: Option<&str>,
        model_type: Option<&str>,
        tags: &[String],
        mode: TagMode,
    ) -> Self {
        let mut clauses = Vec::new();
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) {
            clauses.push(
                "(m.name LIKE ? ESCAPE '\\' OR m.path LIKE ? ESCAPE '\\')".to_string(),
            );
            let like = format!("%{}%", escape_like(text));
            params.push(Box::new(like.clone()));
            params.push(Box::new(like));
        }

        if let Some(model_type) = model_type.map(str::trim).filter(|t| !t.is_empty()) {
            clauses.push("m.type = ?".to_string());
            params.push(Box::new(model_type.to_lowercase()));
        }

        let tags: Vec<String> = tags
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        if !tags.is_empty() {
            match mode {
                TagMode::All => {
                    for tag in tags {
                        clauses.push(
                            "EXISTS (SELECT 1 FROM model_tags fmt JOIN tags ft ON fmt.tag_id = ft.id \
                             WHERE fmt.model_id = m.id AND ft.name = ?)"
                                .to_string(),
                        );
                        params.push(Box::new(tag));
                    }
                }
                TagMode::Any => {
                    let placeholders = vec!["?"; tags.len()].join(",");
                    clauses.push(format!(
                        "EXISTS (SELECT 1 FROM model_tags fmt JOIN tags ft ON fmt.tag_id = ft.id \
                         WHERE fmt.model_id = m.id AND ft.name IN ({placeholders}))"
                    ));
                    for tag in tags {
                        params.push(Box::new(tag));
                    }
                }
            }
        }

        Self { clauses, params }
    }

    pub(super) fn where_clause(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub(super) fn params(&self) -> Vec<&dyn ToSql> {
        self.params.iter().map(|p| p.as_ref()).collect()
    }
}

impl CatalogStore {
    /// One page of models plus the total number matching the filter.
    ///
    /// Ties on the sort column are broken by `id` in the same direction, so
    /// pages are stable.
    pub fn query_models(&self, query: &ModelQuery) -> Result<ModelPage> {
        let filter = ModelFilter::new(
            query.text.as_deref(),
            query.model_type.as_deref(),
            &query.tags,
            query.tag_mode,
        );
        let where_clause = filter.where_clause();
        let limit = query.limit.min(StoreConfig::MAX_PAGE_SIZE);
        let direction = query.order.sql();

        let conn = self.lock()?;

        let count_sql = format!("SELECT COUNT(*) FROM models m {where_clause}");
        let total: i64 = conn.query_row(&count_sql, filter.params().as_slice(), |row| row.get(0))?;

        let sql = format!(
            "{MODEL_SELECT} {where_clause} ORDER BY {} {direction}, m.id {direction} \
             LIMIT {limit} OFFSET {}",
            query.sort.column(),
            query.offset
        );
        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map(filter.params().as_slice(), row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(ModelPage {
            items,
            total: total.max(0) as u64,
        })
    }
}
