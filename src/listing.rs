use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::{CatalogStore, ItemPredicate, SortOrder, Window};
use crate::directory::UserDirectory;
use crate::error::{AppError, AppResult};
use crate::models::{Category, Condition, Item, ItemSummary};

pub const DEFAULT_PAGE_SIZE: u32 = 12;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Query-string parameters exactly as received. Everything is optional text;
/// `ListingParams::parse` applies the parse policy.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingParams {
    pub search: Option<String>,
    pub category: Option<String>,
    pub university: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub condition: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
    /// Older clients send `limit` instead of `pageSize`.
    pub limit: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingFilter {
    pub search: Option<String>,
    pub category: Option<Category>,
    pub university: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub condition: Option<Condition>,
}

impl ListingFilter {
    /// Base visibility rule AND every supplied filter.
    pub fn to_predicate(&self) -> ItemPredicate {
        let mut predicate = ItemPredicate::listed();
        if let Some(search) = &self.search {
            predicate = predicate.and(ItemPredicate::TextContains(search.clone()));
        }
        if let Some(category) = self.category {
            predicate = predicate.and(ItemPredicate::Category(category));
        }
        if let Some(university) = &self.university {
            predicate = predicate.and(ItemPredicate::University(university.clone()));
        }
        if let Some(min) = self.min_price {
            predicate = predicate.and(ItemPredicate::PriceAtLeast(min));
        }
        if let Some(max) = self.max_price {
            predicate = predicate.and(ItemPredicate::PriceAtMost(max));
        }
        if let Some(condition) = self.condition {
            predicate = predicate.and(ItemPredicate::Condition(condition));
        }
        predicate
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListingRequest {
    pub filter: ListingFilter,
    pub page: u32,
    pub page_size: u32,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn lenient_price(value: &Option<String>) -> Option<f64> {
    present(value)
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|p| p.is_finite() && *p >= 0.0)
}

fn lenient_count(value: Option<&str>) -> Option<u32> {
    value.and_then(|v| v.parse::<u32>().ok()).filter(|n| *n >= 1)
}

impl ListingParams {
    /// Numbers are lenient (malformed means absent or default); enums are strict.
    pub fn parse(&self, limits: PageLimits) -> AppResult<ListingRequest> {
        let category = match present(&self.category) {
            Some(raw) => Some(
                Category::parse(raw)
                    .ok_or_else(|| AppError::validation("category", "Invalid category"))?,
            ),
            None => None,
        };
        let condition = match present(&self.condition) {
            Some(raw) => Some(
                Condition::parse(raw)
                    .ok_or_else(|| AppError::validation("condition", "Invalid condition"))?,
            ),
            None => None,
        };

        let filter = ListingFilter {
            search: present(&self.search).map(str::to_string),
            category,
            university: present(&self.university).map(str::to_string),
            min_price: lenient_price(&self.min_price),
            max_price: lenient_price(&self.max_price),
            condition,
        };

        let page = lenient_count(present(&self.page)).unwrap_or(1);
        let page_size = lenient_count(present(&self.page_size).or(present(&self.limit)))
            .unwrap_or(limits.default_page_size)
            .min(limits.max_page_size);

        Ok(ListingRequest {
            filter,
            page,
            page_size,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingPage {
    pub items: Vec<ItemSummary>,
    pub total_pages: u64,
    pub current_page: u32,
    pub total: u64,
}

pub fn total_pages(total: u64, page_size: u32) -> u64 {
    total.div_ceil(u64::from(page_size.max(1)))
}

/// Attaches public seller summaries. Sellers missing from the directory yield `None`.
pub async fn summarize(users: &dyn UserDirectory, items: Vec<Item>) -> AppResult<Vec<ItemSummary>> {
    let mut seller_ids: Vec<Uuid> = items.iter().map(|i| i.seller).collect();
    seller_ids.sort();
    seller_ids.dedup();
    let sellers: HashMap<_, _> = users.find_users(&seller_ids).await?;

    Ok(items
        .into_iter()
        .map(|item| {
            let seller = sellers.get(&item.seller).map(|u| u.summary());
            ItemSummary { item, seller }
        })
        .collect())
}

pub struct ListingQueryEngine {
    store: Arc<dyn CatalogStore>,
    users: Arc<dyn UserDirectory>,
}

impl ListingQueryEngine {
    pub fn new(store: Arc<dyn CatalogStore>, users: Arc<dyn UserDirectory>) -> Self {
        Self { store, users }
    }

    pub async fn list_items(
        &self,
        filter: &ListingFilter,
        page: u32,
        page_size: u32,
    ) -> AppResult<ListingPage> {
        let page = page.max(1);
        let page_size = page_size.max(1);
        let predicate = filter.to_predicate();

        let total = self.store.count_matching(&predicate).await?;
        let items = self
            .store
            .find_many(
                &predicate,
                SortOrder::NewestFirst,
                Window::page(page, page_size),
            )
            .await?;

        tracing::debug!(
            "list_items: page={}, page_size={}, total={}, returned={}",
            page,
            page_size,
            total,
            items.len()
        );

        Ok(ListingPage {
            items: summarize(self.users.as_ref(), items).await?,
            total_pages: total_pages(total, page_size),
            current_page: page,
            total,
        })
    }

    pub async fn list(&self, request: &ListingRequest) -> AppResult<ListingPage> {
        self.list_items(&request.filter, request.page, request.page_size)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalogStore;
    use crate::directory::MemoryUserDirectory;
    use crate::models::{ItemChanges, ItemFields, NewItem, Role, UserProfile};

    struct Fixture {
        store: Arc<MemoryCatalogStore>,
        engine: ListingQueryEngine,
        seller: UserProfile,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryCatalogStore::new());
        let users = Arc::new(MemoryUserDirectory::new());
        let seller = UserProfile {
            id: Uuid::new_v4(),
            name: "Kofi Boateng".to_string(),
            email: "kofi@example.edu".to_string(),
            phone: Some("+233244000000".to_string()),
            role: Role::Seller,
            university: "University of Ghana".to_string(),
        };
        users.upsert(seller.clone()).await;
        let engine = ListingQueryEngine::new(store.clone(), users);
        Fixture {
            store,
            engine,
            seller,
        }
    }

    async fn add(
        f: &Fixture,
        title: &str,
        price: f64,
        category: Category,
        condition: Condition,
        university: &str,
    ) -> Item {
        f.store
            .insert(NewItem {
                fields: ItemFields {
                    title: title.to_string(),
                    description: format!("{} in decent shape, pick up on campus", title),
                    price,
                    category,
                    condition,
                },
                images: vec!["/uploads/x.png".to_string()],
                seller: f.seller.id,
                university: university.to_string(),
            })
            .await
            .unwrap()
    }

    async fn set_flags(f: &Fixture, id: Uuid, available: Option<bool>, sold: Option<bool>) {
        f.store
            .update_by_id(
                id,
                &ItemChanges {
                    is_available: available,
                    is_sold: sold,
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
    }

    fn params(pairs: &[(&str, &str)]) -> ListingParams {
        let map = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
            .collect();
        serde_json::from_value(serde_json::Value::Object(map)).unwrap()
    }

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 12), 0);
        assert_eq!(total_pages(1, 12), 1);
        assert_eq!(total_pages(12, 12), 1);
        assert_eq!(total_pages(13, 12), 2);
        assert_eq!(total_pages(25, 5), 5);
        assert_eq!(total_pages(7, 1), 7);
    }

    #[test]
    fn test_lenient_numbers() {
        let req = params(&[
            ("minPrice", "abc"),
            ("maxPrice", "2000"),
            ("page", "-3"),
            ("pageSize", "lots"),
        ])
        .parse(PageLimits::default())
        .unwrap();
        assert_eq!(req.filter.min_price, None);
        assert_eq!(req.filter.max_price, Some(2000.0));
        assert_eq!(req.page, 1);
        assert_eq!(req.page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_page_size_alias_and_clamp() {
        let req = params(&[("limit", "5")]).parse(PageLimits::default()).unwrap();
        assert_eq!(req.page_size, 5);
        let req = params(&[("pageSize", "5000")])
            .parse(PageLimits::default())
            .unwrap();
        assert_eq!(req.page_size, MAX_PAGE_SIZE);
    }

    #[test]
    fn test_blank_params_are_absent() {
        let req = params(&[("search", "   "), ("category", ""), ("university", "")])
            .parse(PageLimits::default())
            .unwrap();
        assert_eq!(req.filter, ListingFilter::default());
    }

    #[test]
    fn test_unknown_enum_rejected() {
        let err = params(&[("category", "vehicles")])
            .parse(PageLimits::default())
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        let err = params(&[("condition", "mint")])
            .parse(PageLimits::default())
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_price_and_category_filter_newest_first() {
        let f = fixture().await;
        let ug = "University of Ghana";
        let phone = add(&f, "Samsung phone", 1200.0, Category::Electronics, Condition::Good, ug).await;
        add(&f, "Cheap earbuds", 50.0, Category::Electronics, Condition::New, ug).await;
        add(&f, "Mahogany desk", 1500.0, Category::Furniture, Condition::Fair, ug).await;
        let laptop = add(&f, "Laptop", 1900.0, Category::Electronics, Condition::LikeNew, ug).await;
        let sold = add(&f, "Tablet", 1300.0, Category::Electronics, Condition::Good, ug).await;
        set_flags(&f, sold.id, None, Some(true)).await;
        add(&f, "Gaming PC", 2500.0, Category::Electronics, Condition::Good, ug).await;

        let req = params(&[
            ("minPrice", "1000"),
            ("maxPrice", "2000"),
            ("category", "electronics"),
        ])
        .parse(PageLimits::default())
        .unwrap();
        let page = f.engine.list(&req).await.unwrap();

        let ids: Vec<_> = page.items.iter().map(|s| s.item.id).collect();
        assert_eq!(ids, vec![laptop.id, phone.id]);
        assert_eq!(page.total, 2);
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.current_page, 1);
        for summary in &page.items {
            assert!(summary.item.is_listed());
            assert_eq!(summary.item.category, Category::Electronics);
            assert!(summary.item.price >= 1000.0 && summary.item.price <= 2000.0);
        }
    }

    #[tokio::test]
    async fn test_every_result_satisfies_filters() {
        let f = fixture().await;
        let campuses = ["University of Ghana", "Ashesi University"];
        let mut n = 0;
        for campus in campuses {
            for category in [Category::Books, Category::Clothing, Category::Sports] {
                for condition in [Condition::New, Condition::Poor] {
                    n += 1;
                    let item = add(
                        &f,
                        &format!("Thing number {}", n),
                        (n * 10) as f64,
                        category,
                        condition,
                        campus,
                    )
                    .await;
                    if n % 4 == 0 {
                        set_flags(&f, item.id, Some(false), None).await;
                    }
                }
            }
        }

        let filters = vec![
            ListingFilter {
                university: Some("Ashesi University".to_string()),
                ..Default::default()
            },
            ListingFilter {
                category: Some(Category::Books),
                condition: Some(Condition::Poor),
                ..Default::default()
            },
            ListingFilter {
                search: Some("NUMBER 1".to_string()),
                max_price: Some(150.0),
                ..Default::default()
            },
        ];
        for filter in filters {
            let predicate = filter.to_predicate();
            let page = f.engine.list_items(&filter, 1, 100).await.unwrap();
            assert!(!page.items.is_empty(), "filter {:?} matched nothing", filter);
            for summary in &page.items {
                assert!(summary.item.is_listed());
                assert!(predicate.matches(&summary.item));
            }
        }
    }

    #[tokio::test]
    async fn test_pagination_last_page() {
        let f = fixture().await;
        for i in 0..7 {
            add(
                &f,
                &format!("Novel {}", i),
                10.0,
                Category::Books,
                Condition::Good,
                "University of Ghana",
            )
            .await;
        }

        for page_size in 1..=8u32 {
            let pages = total_pages(7, page_size);
            let mut seen = 0;
            for page in 1..=pages as u32 {
                let result = f
                    .engine
                    .list_items(&ListingFilter::default(), page, page_size)
                    .await
                    .unwrap();
                assert_eq!(result.total, 7);
                assert_eq!(result.total_pages, pages);
                let expected = if page as u64 == pages && 7 % page_size != 0 {
                    7 % page_size
                } else {
                    page_size
                };
                assert_eq!(result.items.len() as u32, expected);
                seen += result.items.len();
            }
            assert_eq!(seen, 7);
        }

        let beyond = f
            .engine
            .list_items(&ListingFilter::default(), 99, 3)
            .await
            .unwrap();
        assert!(beyond.items.is_empty());
        assert_eq!(beyond.total, 7);
        assert_eq!(beyond.current_page, 99);
    }

    #[tokio::test]
    async fn test_results_carry_public_seller_summary() {
        let f = fixture().await;
        add(
            &f,
            "Rice cooker",
            90.0,
            Category::Other,
            Condition::Good,
            "University of Ghana",
        )
        .await;

        let page = f
            .engine
            .list_items(&ListingFilter::default(), 1, 12)
            .await
            .unwrap();
        let seller = page.items[0].seller.as_ref().unwrap();
        assert_eq!(seller.name, "Kofi Boateng");

        let json = serde_json::to_value(&page).unwrap();
        let entry = &json["items"][0];
        assert_eq!(entry["seller"]["university"], "University of Ghana");
        assert!(entry["seller"].get("email").is_none());
        assert!(entry["seller"].get("phone").is_none());
        assert_eq!(json["totalPages"], 1);
        assert_eq!(json["currentPage"], 1);
        assert_eq!(entry["isAvailable"], true);
    }
}
