//! Row types returned by the catalog store.

use crate::error::Result;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::PathBuf;

/// Opaque JSON metadata attached to a model.
///
/// The store never looks inside. The only check is that text handed in
/// through [`MetaBlob::parse`] is well-formed JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MetaBlob {
    #[default]
    Absent,
    Json(String),
}

impl MetaBlob {
    /// Validate and wrap JSON text.
    pub fn parse(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        serde_json::from_str::<serde::de::IgnoredAny>(&text)?;
        Ok(MetaBlob::Json(text))
    }

    pub fn from_value(value: &serde_json::Value) -> Self {
        if value.is_null() {
            MetaBlob::Absent
        } else {
            MetaBlob::Json(value.to_string())
        }
    }

    /// Decode to a JSON value. Absent and undecodable blobs become `null`.
    pub fn to_value(&self) -> serde_json::Value {
        match self {
            MetaBlob::Absent => serde_json::Value::Null,
            MetaBlob::Json(text) => serde_json::from_str(text).unwrap_or(serde_json::Value::Null),
        }
    }

    pub fn as_json_str(&self) -> Option<&str> {
        match self {
            MetaBlob::Absent => None,
            MetaBlob::Json(text) => Some(text),
        }
    }

    pub(crate) fn from_column(text: Option<String>) -> Self {
        match text {
            Some(t) if !t.is_empty() => MetaBlob::Json(t),
            _ => MetaBlob::Absent,
        }
    }
}

impl Serialize for MetaBlob {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for MetaBlob {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(MetaBlob::from_value(&value))
    }
}

/// A catalogued model file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    pub id: i64,
    pub path: PathBuf,
    pub name: String,
    #[serde(rename = "type")]
    pub model_type: String,
    pub size_bytes: u64,
    /// SHA-256 hex digest. `None` means it has not been computed yet.
    pub hash_hex: Option<String>,
    /// Epoch milliseconds of the first insert.
    pub created_at: i64,
    pub meta: MetaBlob,
    pub extra: MetaBlob,
}

/// Input to [`CatalogStore::upsert_model`](super::CatalogStore::upsert_model).
#[derive(Debug, Clone, PartialEq)]
pub struct ModelUpsert {
    pub path: PathBuf,
    pub name: String,
    pub model_type: String,
    pub size_bytes: u64,
    /// `None` keeps the stored hash; a new row then has none.
    pub hash_hex: Option<String>,
    /// Only used when the path is new.
    pub created_at_ms: i64,
    /// `None` keeps whatever is stored; `Some` replaces it.
    pub meta: Option<MetaBlob>,
}

impl ModelUpsert {
    pub fn new(
        path: impl Into<PathBuf>,
        name: impl Into<String>,
        model_type: impl Into<String>,
        size_bytes: u64,
    ) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            model_type: model_type.into(),
            size_bytes,
            hash_hex: None,
            created_at_ms: super::now_ms(),
            meta: None,
        }
    }

    pub fn with_hash(mut self, hash_hex: Option<String>) -> Self {
        self.hash_hex = hash_hex.filter(|h| !h.is_empty());
        self
    }

    pub fn with_meta(mut self, meta: MetaBlob) -> Self {
        self.meta = Some(meta);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub id: i64,
    /// True when the path was not catalogued before.
    pub created: bool,
}

/// One page of a model query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPage {
    pub items: Vec<ModelRecord>,
    pub total: u64,
}

/// Minimal projection used by bulk workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPathEntry {
    pub id: i64,
    pub path: PathBuf,
    pub model_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub color: Option<String>,
    pub created_at: Option<i64>,
}

/// A tag with the number of models it is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCount {
    pub id: i64,
    pub name: String,
    pub color: Option<String>,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCount {
    pub name: String,
    pub count: u64,
}
