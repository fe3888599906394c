use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{image_limit_violation, Item, ItemChanges, NewItem, MAX_IMAGES};

use super::{CatalogStore, ItemPredicate, SortOrder, Window};

struct Entry {
    item: Item,
    /// Insertion sequence; breaks created_at ties deterministically.
    seq: u64,
}

#[derive(Default)]
struct Inner {
    items: HashMap<Uuid, Entry>,
    next_seq: u64,
}

/// Process-local catalog. All writes take the write lock, so every
/// single-item operation is atomic.
#[derive(Default)]
pub struct MemoryCatalogStore {
    inner: RwLock<Inner>,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted<'a>(mut entries: Vec<&'a Entry>, sort: SortOrder) -> Vec<&'a Entry> {
    entries.sort_by(|a, b| {
        let by_time = a.item.created_at.cmp(&b.item.created_at);
        let ord = by_time.then(a.seq.cmp(&b.seq));
        match sort {
            SortOrder::NewestFirst => ord.reverse(),
        }
    });
    entries
}

#[async_trait::async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn insert(&self, new: NewItem) -> AppResult<Item> {
        let now = Utc::now();
        let item = Item {
            id: Uuid::new_v4(),
            title: new.fields.title,
            description: new.fields.description,
            price: new.fields.price,
            category: new.fields.category,
            condition: new.fields.condition,
            images: new.images,
            seller: new.seller,
            university: new.university,
            is_available: true,
            is_sold: false,
            views: 0,
            created_at: now,
            updated_at: now,
        };

        let mut inner = self.inner.write().await;
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.items.insert(
            item.id,
            Entry {
                item: item.clone(),
                seq,
            },
        );
        Ok(item)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Item>> {
        let inner = self.inner.read().await;
        Ok(inner.items.get(&id).map(|e| e.item.clone()))
    }

    async fn find_many(
        &self,
        predicate: &ItemPredicate,
        sort: SortOrder,
        window: Window,
    ) -> AppResult<Vec<Item>> {
        let inner = self.inner.read().await;
        let matching: Vec<&Entry> = inner
            .items
            .values()
            .filter(|e| predicate.matches(&e.item))
            .collect();

        let skip = usize::try_from(window.skip).unwrap_or(usize::MAX);
        let limit = window
            .limit
            .map(|l| usize::try_from(l).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);

        Ok(sorted(matching, sort)
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|e| e.item.clone())
            .collect())
    }

    async fn count_matching(&self, predicate: &ItemPredicate) -> AppResult<u64> {
        let inner = self.inner.read().await;
        Ok(inner
            .items
            .values()
            .filter(|e| predicate.matches(&e.item))
            .count() as u64)
    }

    async fn update_by_id(&self, id: Uuid, changes: &ItemChanges) -> AppResult<Option<Item>> {
        let mut inner = self.inner.write().await;
        let Some(entry) = inner.items.get_mut(&id) else {
            return Ok(None);
        };

        let current = entry.item.images.len();
        if current + changes.append_images.len() > MAX_IMAGES {
            return Err(image_limit_violation(current, changes.append_images.len()));
        }

        changes.apply_to(&mut entry.item, Utc::now());
        Ok(Some(entry.item.clone()))
    }

    async fn delete_by_id(&self, id: Uuid) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        Ok(inner.items.remove(&id).is_some())
    }

    async fn increment_views(&self, id: Uuid) -> AppResult<Option<Item>> {
        let mut inner = self.inner.write().await;
        Ok(inner.items.get_mut(&id).map(|entry| {
            entry.item.views += 1;
            entry.item.updated_at = Utc::now();
            entry.item.clone()
        }))
    }
}
