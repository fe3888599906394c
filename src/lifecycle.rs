use std::sync::Arc;

use uuid::Uuid;

use crate::catalog::{CatalogStore, ItemPredicate, SortOrder, Window};
use crate::directory::{UniversityDirectory, UserDirectory};
use crate::error::{AppError, AppResult};
use crate::listing::summarize;
use crate::models::{
    Item, ItemDetail, ItemDraft, ItemPatch, ItemSummary, NewItem, UserProfile, MAX_IMAGES,
};
use crate::storage::BlobReferenceResolver;

/// Authority over item writes: role checks at creation, ownership checks on
/// every later mutation.
///
/// The seller role is only checked when creating items and when listing a
/// seller's own catalog. Updates and deletes check ownership alone, so a
/// seller who is later demoted keeps control of items they already own.
pub struct ItemLifecycleManager {
    store: Arc<dyn CatalogStore>,
    users: Arc<dyn UserDirectory>,
    universities: Arc<dyn UniversityDirectory>,
    blobs: Arc<BlobReferenceResolver>,
}

impl ItemLifecycleManager {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        users: Arc<dyn UserDirectory>,
        universities: Arc<dyn UniversityDirectory>,
        blobs: Arc<BlobReferenceResolver>,
    ) -> Self {
        Self {
            store,
            users,
            universities,
            blobs,
        }
    }

    async fn require_seller(&self, caller_id: Uuid, action: &str) -> AppResult<UserProfile> {
        match self.users.find_user(caller_id).await? {
            Some(user) if user.is_seller() => Ok(user),
            _ => {
                tracing::warn!("{} rejected: user={} is not a seller", action, caller_id);
                Err(AppError::Authorization(format!(
                    "Only sellers can {}",
                    action
                )))
            }
        }
    }

    fn check_references(&self, image_refs: &[String]) -> AppResult<()> {
        for reference in image_refs {
            self.blobs.verify(reference)?;
        }
        Ok(())
    }

    /// Fetches the item and checks the caller owns it.
    async fn owned_item(&self, caller_id: Uuid, item_id: Uuid, action: &str) -> AppResult<Item> {
        let item = self
            .store
            .find_by_id(item_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Item not found".to_string()))?;

        if !item.is_owned_by(caller_id) {
            tracing::warn!(
                "{} rejected: user={} does not own item={}",
                action,
                caller_id,
                item_id
            );
            return Err(AppError::Authorization(format!(
                "Not authorized to {} this item",
                action
            )));
        }
        Ok(item)
    }

    pub async fn create_item(
        &self,
        caller_id: Uuid,
        draft: &ItemDraft,
        image_refs: Vec<String>,
    ) -> AppResult<Item> {
        let fields = draft.validate()?;
        let seller = self.require_seller(caller_id, "create items").await?;

        if image_refs.is_empty() {
            return Err(AppError::Input(
                "At least one image is required".to_string(),
            ));
        }
        if image_refs.len() > MAX_IMAGES {
            return Err(AppError::Input(format!(
                "An item can have at most {} images",
                MAX_IMAGES
            )));
        }
        self.check_references(&image_refs)?;

        if !self.universities.contains(&seller.university).await? {
            return Err(AppError::validation(
                "university",
                format!("Unknown university '{}' on seller profile", seller.university),
            ));
        }

        let item = self
            .store
            .insert(NewItem {
                fields,
                images: image_refs,
                seller: seller.id,
                university: seller.university,
            })
            .await?;

        tracing::info!("Item created: id={}, seller={}", item.id, item.seller);
        Ok(item)
    }

    /// Detail view. Counts as a view: the counter is bumped atomically in the store.
    pub async fn get_item(&self, item_id: Uuid) -> AppResult<ItemDetail> {
        let item = self
            .store
            .increment_views(item_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Item not found".to_string()))?;

        let seller = self
            .users
            .find_user(item.seller)
            .await?
            .map(|u| u.contact());

        Ok(ItemDetail { item, seller })
    }

    pub async fn update_item(
        &self,
        caller_id: Uuid,
        item_id: Uuid,
        patch: &ItemPatch,
        new_image_refs: Vec<String>,
    ) -> AppResult<Item> {
        let before = self.owned_item(caller_id, item_id, "update").await?;

        let mut changes = patch.validate()?;
        self.check_references(&new_image_refs)?;
        changes.append_images = new_image_refs;
        if changes.is_empty() {
            tracing::debug!("Empty update for item={}, touching updated_at only", item_id);
        }

        // A concurrent delete between the ownership check and here surfaces as NotFound.
        let item = self
            .store
            .update_by_id(item_id, &changes)
            .await?
            .ok_or_else(|| AppError::NotFound("Item not found".to_string()))?;

        if before.state() != item.state() {
            tracing::info!(
                "Item state changed: id={}, {:?} -> {:?}",
                item.id,
                before.state(),
                item.state()
            );
        }
        tracing::info!("Item updated: id={}, seller={}", item.id, caller_id);
        Ok(item)
    }

    /// Hard delete. Returns the removed record so its blobs can be discarded.
    pub async fn delete_item(&self, caller_id: Uuid, item_id: Uuid) -> AppResult<Item> {
        let item = self.owned_item(caller_id, item_id, "delete").await?;

        if !self.store.delete_by_id(item_id).await? {
            return Err(AppError::NotFound("Item not found".to_string()));
        }

        tracing::info!("Item deleted: id={}, seller={}", item_id, caller_id);
        Ok(item)
    }

    /// Every item the seller owns, in any state, newest first. Unpaginated.
    pub async fn list_owned_items(&self, caller_id: Uuid) -> AppResult<Vec<Item>> {
        self.require_seller(caller_id, "view their items").await?;
        self.store
            .find_many(
                &ItemPredicate::Seller(caller_id),
                SortOrder::NewestFirst,
                Window::all(),
            )
            .await
    }

    /// Adds the public seller summary used in write responses.
    pub async fn with_seller(&self, item: Item) -> AppResult<ItemSummary> {
        let mut summaries = summarize(self.users.as_ref(), vec![item.clone()]).await?;
        Ok(summaries.pop().unwrap_or(ItemSummary { item, seller: None }))
    }
}
