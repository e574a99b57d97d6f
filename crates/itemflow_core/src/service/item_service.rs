//! Item use-case service.
//!
//! # Responsibility
//! - Provide CRUD entry points for the request layer.
//! - Delegate persistence to repository implementations.
//!
//! # Invariants
//! - Service APIs never bypass repository validation/persistence contracts.
//! - Updates replace every client-supplied field but keep the path identity.

use crate::model::item::{Item, ItemDraft, ItemId};
use crate::repo::item_repo::{ItemRepository, RepoError, RepoResult};
use log::info;
use std::sync::Arc;

/// Use-case service wrapper for item CRUD operations.
pub struct ItemService<R: ItemRepository> {
    repo: Arc<R>,
}

impl<R: ItemRepository> Clone for ItemService<R> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
        }
    }
}

impl<R: ItemRepository> ItemService<R> {
    /// Creates a service over a shared repository.
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    pub fn list_items(&self) -> RepoResult<Vec<Item>> {
        self.repo.list_items()
    }

    pub fn get_item(&self, id: ItemId) -> RepoResult<Option<Item>> {
        self.repo.get_item(id)
    }

    /// Validates and inserts a new item.
    ///
    /// Returns the persisted item with its assigned id.
    pub fn create_item(&self, draft: &ItemDraft) -> RepoResult<Item> {
        draft.validate()?;
        let item = self.repo.create_item(draft)?;
        info!(
            "event=item_create module=service status=ok item_id={}",
            item.id
        );
        Ok(item)
    }

    /// Replaces the item stored under `id`.
    ///
    /// # Contract
    /// - Returns `Ok(None)` when no item exists for `id`; nothing is inserted.
    /// - Validation runs before the store is touched.
    pub fn update_item(&self, id: ItemId, draft: ItemDraft) -> RepoResult<Option<Item>> {
        draft.validate()?;

        match self.repo.save_item(&draft.into_item(id)) {
            Ok(saved) => {
                info!("event=item_update module=service status=ok item_id={id}");
                Ok(Some(saved))
            }
            Err(RepoError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Deletes an item; deleting a missing id is not an error.
    pub fn delete_item(&self, id: ItemId) -> RepoResult<bool> {
        let removed = self.repo.delete_item(id)?;
        info!("event=item_delete module=service status=ok item_id={id} removed={removed}");
        Ok(removed)
    }
}
