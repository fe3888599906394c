use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    image_limit_violation, Category, Condition, Item, ItemChanges, NewItem, MAX_IMAGES,
};

use super::{CatalogStore, ItemPredicate, SortOrder, Window};

const ITEM_COLUMNS: &str = "id, title, description, price, category, condition, images, \
     seller_id, university, is_available, is_sold, views, created_at, updated_at";

#[derive(Debug, Clone, FromRow)]
struct ItemRow {
    id: Uuid,
    title: String,
    description: String,
    price: f64,
    category: String,
    condition: String,
    images: Vec<String>,
    seller_id: Uuid,
    university: String,
    is_available: bool,
    is_sold: bool,
    views: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ItemRow> for Item {
    type Error = AppError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        let category = Category::parse(&row.category).ok_or_else(|| {
            AppError::Store(format!("item {} has unknown category '{}'", row.id, row.category))
        })?;
        let condition = Condition::parse(&row.condition).ok_or_else(|| {
            AppError::Store(format!(
                "item {} has unknown condition '{}'",
                row.id, row.condition
            ))
        })?;
        let views = u64::try_from(row.views)
            .map_err(|_| AppError::Store(format!("item {} has negative views", row.id)))?;

        Ok(Item {
            id: row.id,
            title: row.title,
            description: row.description,
            price: row.price,
            category,
            condition,
            images: row.images,
            seller: row.seller_id,
            university: row.university,
            is_available: row.is_available,
            is_sold: row.is_sold,
            views,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Field changes, image append and the cap check in one statement.
/// Binds: $1 id, $2..$8 optional fields, $9 appended images, $10 image cap.
fn update_statement() -> String {
    format!(
        "UPDATE items SET \
         title = COALESCE($2, title), \
         description = COALESCE($3, description), \
         price = COALESCE($4, price), \
         category = COALESCE($5, category), \
         condition = COALESCE($6, condition), \
         is_available = COALESCE($7, is_available), \
         is_sold = COALESCE($8, is_sold), \
         images = images || $9::text[], \
         updated_at = NOW() \
         WHERE id = $1 AND cardinality(images) + cardinality($9::text[]) <= $10 \
         RETURNING {}",
        ITEM_COLUMNS
    )
}

fn increment_statement() -> String {
    format!(
        "UPDATE items SET views = views + 1, updated_at = NOW() WHERE id = $1 RETURNING {}",
        ITEM_COLUMNS
    )
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Appends the SQL form of `predicate` to the WHERE clause being built.
fn push_predicate(qb: &mut QueryBuilder<'_, Postgres>, predicate: &ItemPredicate) {
    match predicate {
        ItemPredicate::Any => {
            qb.push("TRUE");
        }
        ItemPredicate::IsAvailable(v) => {
            qb.push("is_available = ").push_bind(*v);
        }
        ItemPredicate::IsSold(v) => {
            qb.push("is_sold = ").push_bind(*v);
        }
        ItemPredicate::TextContains(needle) => {
            // strpos keeps the match literal; LIKE would treat % and _ as wildcards
            qb.push("(strpos(lower(title), lower(")
                .push_bind(needle.clone())
                .push(")) > 0 OR strpos(lower(description), lower(")
                .push_bind(needle.clone())
                .push(")) > 0)");
        }
        ItemPredicate::Category(c) => {
            qb.push("category = ").push_bind(c.as_str());
        }
        ItemPredicate::Condition(c) => {
            qb.push("condition = ").push_bind(c.as_str());
        }
        ItemPredicate::University(u) => {
            qb.push("university = ").push_bind(u.clone());
        }
        ItemPredicate::PriceAtLeast(min) => {
            qb.push("price >= ").push_bind(*min);
        }
        ItemPredicate::PriceAtMost(max) => {
            qb.push("price <= ").push_bind(*max);
        }
        ItemPredicate::Seller(id) => {
            qb.push("seller_id = ").push_bind(*id);
        }
        ItemPredicate::And(parts) => {
            if parts.is_empty() {
                qb.push("TRUE");
                return;
            }
            qb.push("(");
            for (i, part) in parts.iter().enumerate() {
                if i > 0 {
                    qb.push(" AND ");
                }
                push_predicate(qb, part);
            }
            qb.push(")");
        }
    }
}

pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CatalogStore for PgCatalogStore {
    async fn insert(&self, new: NewItem) -> AppResult<Item> {
        let row: ItemRow = sqlx::query_as(&format!(
            "INSERT INTO items (title, description, price, category, condition, images, seller_id, university) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {}",
            ITEM_COLUMNS
        ))
        .bind(&new.fields.title)
        .bind(&new.fields.description)
        .bind(new.fields.price)
        .bind(new.fields.category.as_str())
        .bind(new.fields.condition.as_str())
        .bind(&new.images)
        .bind(new.seller)
        .bind(&new.university)
        .fetch_one(&self.pool)
        .await?;

        Item::try_from(row)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Item>> {
        let row: Option<ItemRow> =
            sqlx::query_as(&format!("SELECT {} FROM items WHERE id = $1", ITEM_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(Item::try_from).transpose()
    }

    async fn find_many(
        &self,
        predicate: &ItemPredicate,
        sort: SortOrder,
        window: Window,
    ) -> AppResult<Vec<Item>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM items WHERE ",
            ITEM_COLUMNS
        ));
        push_predicate(&mut qb, predicate);
        qb.push(match sort {
            SortOrder::NewestFirst => " ORDER BY created_at DESC, id DESC",
        });
        if let Some(limit) = window.limit {
            qb.push(" LIMIT ").push_bind(to_i64(limit));
        }
        if window.skip > 0 {
            qb.push(" OFFSET ").push_bind(to_i64(window.skip));
        }

        tracing::debug!("find_many: {}", qb.sql());

        let rows: Vec<ItemRow> = qb.build_query_as::<ItemRow>().fetch_all(&self.pool).await?;
        rows.into_iter().map(Item::try_from).collect()
    }

    async fn count_matching(&self, predicate: &ItemPredicate) -> AppResult<u64> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM items WHERE ");
        push_predicate(&mut qb, predicate);

        let count: i64 = qb.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn update_by_id(&self, id: Uuid, changes: &ItemChanges) -> AppResult<Option<Item>> {
        let row: Option<ItemRow> = sqlx::query_as(&update_statement())
        .bind(id)
        .bind(changes.title.as_deref())
        .bind(changes.description.as_deref())
        .bind(changes.price)
        .bind(changes.category.map(|c| c.as_str()))
        .bind(changes.condition.map(|c| c.as_str()))
        .bind(changes.is_available)
        .bind(changes.is_sold)
        .bind(changes.append_images.clone())
        .bind(MAX_IMAGES as i32)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Item::try_from(row).map(Some);
        }

        // Nothing updated: either the item is gone or the append would exceed the cap.
        let current: Option<i32> =
            sqlx::query_scalar("SELECT cardinality(images) FROM items WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        match current {
            None => Ok(None),
            Some(n) => Err(image_limit_violation(
                usize::try_from(n).unwrap_or(0),
                changes.append_images.len(),
            )),
        }
    }

    async fn delete_by_id(&self, id: Uuid) -> AppResult<bool> {
        let rows_affected = sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows_affected > 0)
    }

    async fn increment_views(&self, id: Uuid) -> AppResult<Option<Item>> {
        let row: Option<ItemRow> = sqlx::query_as(&increment_statement())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Item::try_from).transpose()
    }
}
