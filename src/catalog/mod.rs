// Catalog store abstraction (Postgres / in-memory)

pub mod memory;
pub mod postgres;

pub use memory::MemoryCatalogStore;
pub use postgres::PgCatalogStore;

use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{Category, Condition, Item, ItemChanges, NewItem};

/// Composable filter over items, evaluated in memory or compiled to SQL.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemPredicate {
    /// Matches everything.
    Any,
    IsAvailable(bool),
    IsSold(bool),
    /// Case-insensitive literal substring of title OR description.
    TextContains(String),
    Category(Category),
    Condition(Condition),
    University(String),
    PriceAtLeast(f64),
    PriceAtMost(f64),
    Seller(Uuid),
    And(Vec<ItemPredicate>),
}

impl ItemPredicate {
    /// Publicly listed items: available and not sold.
    pub fn listed() -> Self {
        ItemPredicate::And(vec![
            ItemPredicate::IsAvailable(true),
            ItemPredicate::IsSold(false),
        ])
    }

    pub fn and(self, other: ItemPredicate) -> Self {
        match (self, other) {
            (ItemPredicate::Any, p) | (p, ItemPredicate::Any) => p,
            (ItemPredicate::And(mut left), ItemPredicate::And(right)) => {
                left.extend(right);
                ItemPredicate::And(left)
            }
            (ItemPredicate::And(mut left), p) => {
                left.push(p);
                ItemPredicate::And(left)
            }
            (p, ItemPredicate::And(mut right)) => {
                right.insert(0, p);
                ItemPredicate::And(right)
            }
            (l, r) => ItemPredicate::And(vec![l, r]),
        }
    }

    pub fn matches(&self, item: &Item) -> bool {
        match self {
            ItemPredicate::Any => true,
            ItemPredicate::IsAvailable(v) => item.is_available == *v,
            ItemPredicate::IsSold(v) => item.is_sold == *v,
            ItemPredicate::TextContains(needle) => {
                let needle = needle.to_lowercase();
                item.title.to_lowercase().contains(&needle)
                    || item.description.to_lowercase().contains(&needle)
            }
            ItemPredicate::Category(c) => item.category == *c,
            ItemPredicate::Condition(c) => item.condition == *c,
            ItemPredicate::University(u) => item.university == *u,
            ItemPredicate::PriceAtLeast(min) => item.price >= *min,
            ItemPredicate::PriceAtMost(max) => item.price <= *max,
            ItemPredicate::Seller(id) => item.seller == *id,
            ItemPredicate::And(parts) => parts.iter().all(|p| p.matches(item)),
        }
    }
}

/// Ordering by creation time. Ties are broken deterministically by each store:
/// id in Postgres, insertion order in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    NewestFirst,
}

/// Offset/limit window over a sorted result. `limit: None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Window {
    pub skip: u64,
    pub limit: Option<u64>,
}

impl Window {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn page(page: u32, page_size: u32) -> Self {
        let page = u64::from(page.max(1));
        let page_size = u64::from(page_size.max(1));
        Self {
            skip: (page - 1) * page_size,
            limit: Some(page_size),
        }
    }
}

/// Durable item collection. Every operation is atomic for a single item.
#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    async fn insert(&self, item: NewItem) -> AppResult<Item>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Item>>;

    async fn find_many(
        &self,
        predicate: &ItemPredicate,
        sort: SortOrder,
        window: Window,
    ) -> AppResult<Vec<Item>>;

    async fn count_matching(&self, predicate: &ItemPredicate) -> AppResult<u64>;

    /// Applies `changes` in one atomic step and refreshes `updated_at`.
    /// Returns `Ok(None)` when the item no longer exists. Appends that would
    /// push the image list past `MAX_IMAGES` fail without changing anything.
    async fn update_by_id(&self, id: Uuid, changes: &ItemChanges) -> AppResult<Option<Item>>;

    /// Returns `false` when nothing was deleted.
    async fn delete_by_id(&self, id: Uuid) -> AppResult<bool>;

    /// Atomic read-modify-write of the view counter. Refreshes `updated_at`
    /// and returns the incremented item.
    async fn increment_views(&self, id: Uuid) -> AppResult<Option<Item>>;
}
