//! Model catalog methods on HikazeApi.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{HikazeError, Result};
use crate::store::{FacetQuery, MetaBlob, ModelQuery, ModelRecord, TagCount, TypeCount};
use crate::HikazeApi;

/// A catalogued model together with its tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDetail {
    #[serde(flatten)]
    pub record: ModelRecord,
    pub tags: Vec<String>,
}

/// One page of [`ModelDetail`]s plus the unpaginated match count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDetailPage {
    pub items: Vec<ModelDetail>,
    pub total: u64,
}

/// How a caller names a model for refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelRef {
    Id(i64),
    Path(PathBuf),
}

impl HikazeApi {
    // ========================================
    // Model Listing
    // ========================================

    /// Filtered, sorted, paginated listing with tags attached.
    pub async fn list_models(&self, query: ModelQuery) -> Result<ModelDetailPage> {
        self.blocking(move |state| {
            let page = state.store.query_models(&query)?;
            let items = page
                .items
                .into_iter()
                .map(|record| {
                    let tags = state.store.list_model_tags(record.id)?;
                    Ok(ModelDetail { record, tags })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(ModelDetailPage {
                items,
                total: page.total,
            })
        })
        .await
    }

    pub async fn get_model(&self, id: i64) -> Result<ModelDetail> {
        self.blocking(move |state| {
            let record = state
                .store
                .get_by_id(id)?
                .ok_or_else(|| HikazeError::model_not_found(id))?;
            let tags = state.store.list_model_tags(id)?;
            Ok(ModelDetail { record, tags })
        })
        .await
    }

    /// Remove the catalog record. The file on disk is left alone.
    pub async fn delete_model(&self, id: i64) -> Result<()> {
        self.blocking(move |state| {
            if state.store.delete_model(id)? {
                Ok(())
            } else {
                Err(HikazeError::model_not_found(id))
            }
        })
        .await
    }

    // ========================================
    // Tags on Models
    // ========================================

    /// Add and remove tags on a model; the type tag cannot be removed and
    /// other type names are not attached.
    pub async fn set_model_tags(
        &self,
        id: i64,
        add: Vec<String>,
        remove: Vec<String>,
    ) -> Result<Vec<String>> {
        self.blocking(move |state| state.store.set_model_tags(id, &add, &remove))
            .await
    }

    pub async fn types_with_counts(&self) -> Result<Vec<TypeCount>> {
        self.blocking(|state| state.store.types_with_counts()).await
    }

    /// Tags used by models of `model_type`, excluding the type tag itself.
    pub async fn tags_by_type(&self, model_type: String) -> Result<Vec<TagCount>> {
        if model_type.trim().is_empty() {
            return Ok(Vec::new());
        }
        self.blocking(move |state| state.store.list_tags_by_type(&model_type))
            .await
    }

    pub async fn tag_facets(&self, query: FacetQuery) -> Result<Vec<TagCount>> {
        self.blocking(move |state| state.store.tag_facets(&query)).await
    }

    // ========================================
    // User Metadata
    // ========================================

    /// The model's user metadata, `{}` when none is stored.
    pub async fn model_extra(&self, id: i64) -> Result<Value> {
        let record = self.get_record(id).await?;
        Ok(match record.extra.to_value() {
            Value::Null => Value::Object(Map::new()),
            value => value,
        })
    }

    /// Shallow-merge `patch` into the stored user metadata.
    ///
    /// When either side is not a JSON object the patch replaces the stored
    /// value. Returns the new metadata.
    pub async fn update_extra(&self, id: i64, patch: Value) -> Result<Value> {
        self.blocking(move |state| {
            let record = state
                .store
                .get_by_id(id)?
                .ok_or_else(|| HikazeError::model_not_found(id))?;
            let merged = merge_extra(record.extra.to_value(), patch);
            state.store.set_extra(id, &MetaBlob::from_value(&merged))?;
            Ok(merged)
        })
        .await
    }

    /// Generation parameters for a model.
    ///
    /// User-supplied `extra.params` and `extra.prompts` win; keys only present
    /// in the scanned `meta.params` fill the gaps.
    pub async fn model_params(&self, id: i64) -> Result<Map<String, Value>> {
        let record = self.get_record(id).await?;
        let extra = record.extra.to_value();
        let meta = record.meta.to_value();

        let mut params = Map::new();
        for key in ["params", "prompts"] {
            if let Some(Value::Object(section)) = extra.get(key) {
                params.extend(section.clone());
            }
        }
        if let Some(Value::Object(defaults)) = meta.get("params") {
            for (key, value) in defaults {
                params.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
        Ok(params)
    }

    async fn get_record(&self, id: i64) -> Result<ModelRecord> {
        self.blocking(move |state| {
            state
                .store
                .get_by_id(id)?
                .ok_or_else(|| HikazeError::model_not_found(id))
        })
        .await
    }
}

fn merge_extra(current: Value, patch: Value) -> Value {
    match (current, patch) {
        (Value::Object(mut current), Value::Object(patch)) => {
            current.extend(patch);
            Value::Object(current)
        }
        (_, patch) => patch,
    }
}
