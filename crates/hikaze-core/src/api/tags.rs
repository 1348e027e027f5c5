//! Tag CRUD methods on HikazeApi.

use crate::error::Result;
use crate::store::Tag;
use crate::HikazeApi;

impl HikazeApi {
    pub async fn list_tags(&self) -> Result<Vec<Tag>> {
        self.blocking(|state| state.store.list_tags()).await
    }

    /// Create a user tag, or return the existing tag with that name.
    pub async fn create_tag(&self, name: String, color: Option<String>) -> Result<Tag> {
        self.blocking(move |state| state.store.create_tag(&name, color.as_deref()))
            .await
    }

    /// Rename and/or recolor a tag. Type tags cannot be renamed.
    pub async fn update_tag(
        &self,
        id: i64,
        name: Option<String>,
        color: Option<String>,
    ) -> Result<Tag> {
        self.blocking(move |state| {
            state
                .store
                .update_tag(id, name.as_deref(), color.as_deref())
        })
        .await
    }

    /// Delete a user tag and detach it from every model.
    pub async fn delete_tag(&self, id: i64) -> Result<()> {
        self.blocking(move |state| state.store.delete_tag(id)).await
    }
}
