//! Create, update and delete requests against the item collection.
//!
//! The gateway never touches the state slot. A write becomes visible once
//! the live subscription delivers the snapshot that contains it.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::backend::{AuthProvider, CollectionPath, DocumentStore};
use crate::clock::Clock;
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::model::{Item, ItemChange, ItemId};

pub struct MutationGateway {
    auth: Arc<dyn AuthProvider>,
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    config: SyncConfig,
}

impl MutationGateway {
    #[must_use]
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
        config: SyncConfig,
    ) -> Self {
        Self {
            auth,
            store,
            clock,
            config,
        }
    }

    /// Create an unchecked item and return the id the store assigned.
    pub async fn add(&self, title: &str, description: &str) -> Result<ItemId, SyncError> {
        ensure_title(title)?;
        let path = self.collection()?;
        let fields = Item::creation_fields(title, description, self.clock.now());

        let id = self.store.create(&path, fields).await.map_err(|err| {
            warn!(%path, %err, "create failed");
            SyncError::from(err)
        })?;
        debug!(%path, %id, "created item");
        Ok(ItemId::new(id))
    }

    pub async fn set_checked(&self, id: &ItemId, is_checked: bool) -> Result<(), SyncError> {
        self.apply(id, ItemChange::Checked(is_checked)).await
    }

    pub async fn set_title(&self, id: &ItemId, title: &str) -> Result<(), SyncError> {
        ensure_title(title)?;
        self.apply(id, ItemChange::Title(title.to_string())).await
    }

    pub async fn set_description(&self, id: &ItemId, description: &str) -> Result<(), SyncError> {
        self.apply(id, ItemChange::Description(description.to_string()))
            .await
    }

    pub async fn delete(&self, id: &ItemId) -> Result<(), SyncError> {
        let path = self.collection()?;
        self.store
            .delete(&path, id.as_str())
            .await
            .map_err(|err| {
                warn!(%path, %id, %err, "delete failed");
                SyncError::from(err)
            })?;
        debug!(%path, %id, "deleted item");
        Ok(())
    }

    async fn apply(&self, id: &ItemId, change: ItemChange) -> Result<(), SyncError> {
        let path = self.collection()?;
        let field = change.name();
        let fields = change.into_fields(self.clock.now());

        self.store
            .update(&path, id.as_str(), fields)
            .await
            .map_err(|err| {
                warn!(%path, %id, field, %err, "update failed");
                SyncError::from(err)
            })?;
        debug!(%path, %id, field, "updated item");
        Ok(())
    }

    /// Item collection of the signed-in user.
    fn collection(&self) -> Result<CollectionPath, SyncError> {
        self.auth
            .current_user_id()
            .map(|user| self.config.collection_for(&user))
            .ok_or(SyncError::NotAuthenticated)
    }
}

fn ensure_title(title: &str) -> Result<(), SyncError> {
    if title.trim().is_empty() {
        return Err(SyncError::InvalidTitle);
    }
    Ok(())
}
