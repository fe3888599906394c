use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult, FieldViolation};

use super::user::{SellerContact, SellerSummary};

pub const MIN_TITLE_LEN: usize = 3;
pub const MIN_DESCRIPTION_LEN: usize = 10;
/// Upper bound on an item's image list, at creation and after appends.
pub const MAX_IMAGES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Electronics,
    Books,
    Clothing,
    Furniture,
    Sports,
    Accessories,
    Other,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Electronics,
        Category::Books,
        Category::Clothing,
        Category::Furniture,
        Category::Sports,
        Category::Accessories,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Electronics => "electronics",
            Category::Books => "books",
            Category::Clothing => "clothing",
            Category::Furniture => "furniture",
            Category::Sports => "sports",
            Category::Accessories => "accessories",
            Category::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Condition {
    New,
    LikeNew,
    Good,
    Fair,
    Poor,
}

impl Condition {
    pub const ALL: [Condition; 5] = [
        Condition::New,
        Condition::LikeNew,
        Condition::Good,
        Condition::Fair,
        Condition::Poor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::New => "new",
            Condition::LikeNew => "like-new",
            Condition::Good => "good",
            Condition::Fair => "fair",
            Condition::Poor => "poor",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == value)
    }
}

/// Where an item sits in its lifecycle. Removal is not a state: the record is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingState {
    Active,
    Paused,
    Sold,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub category: Category,
    pub condition: Condition,
    pub images: Vec<String>,
    #[serde(rename = "sellerId")]
    pub seller: Uuid,
    pub university: String,
    pub is_available: bool,
    pub is_sold: bool,
    pub views: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Visible in public listings.
    pub fn is_listed(&self) -> bool {
        self.is_available && !self.is_sold
    }

    pub fn state(&self) -> ListingState {
        if self.is_sold {
            ListingState::Sold
        } else if self.is_available {
            ListingState::Active
        } else {
            ListingState::Paused
        }
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.seller == user_id
    }
}

/// Validated listing content, shared by creation and store inserts.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemFields {
    pub title: String,
    pub description: String,
    pub price: f64,
    pub category: Category,
    pub condition: Condition,
}

/// Everything the store needs to insert a new item. Ids and timestamps are store-assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct NewItem {
    pub fields: ItemFields,
    pub images: Vec<String>,
    pub seller: Uuid,
    pub university: String,
}

fn check_title(raw: &str, violations: &mut Vec<FieldViolation>) -> String {
    let title = raw.trim();
    if title.chars().count() < MIN_TITLE_LEN {
        violations.push(FieldViolation::new(
            "title",
            "Title must be at least 3 characters",
        ));
    }
    title.to_string()
}

fn check_description(raw: &str, violations: &mut Vec<FieldViolation>) -> String {
    let description = raw.trim();
    if description.chars().count() < MIN_DESCRIPTION_LEN {
        violations.push(FieldViolation::new(
            "description",
            "Description must be at least 10 characters",
        ));
    }
    description.to_string()
}

fn check_price(raw: &str, violations: &mut Vec<FieldViolation>) -> f64 {
    match raw.trim().parse::<f64>() {
        Ok(price) if price.is_finite() && price >= 0.0 => price,
        _ => {
            violations.push(FieldViolation::new(
                "price",
                "Price must be a positive number",
            ));
            0.0
        }
    }
}

fn check_category(raw: &str, violations: &mut Vec<FieldViolation>) -> Category {
    Category::parse(raw.trim()).unwrap_or_else(|| {
        violations.push(FieldViolation::new("category", "Invalid category"));
        Category::Other
    })
}

fn check_condition(raw: &str, violations: &mut Vec<FieldViolation>) -> Condition {
    Condition::parse(raw.trim()).unwrap_or_else(|| {
        violations.push(FieldViolation::new("condition", "Invalid condition"));
        Condition::Good
    })
}

/// Raw create-form fields as they arrive from the client.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ItemDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub condition: String,
}

impl ItemDraft {
    /// Checks every rule and reports all violations at once.
    pub fn validate(&self) -> AppResult<ItemFields> {
        let mut violations = Vec::new();
        let title = check_title(&self.title, &mut violations);
        let description = check_description(&self.description, &mut violations);
        let price = check_price(&self.price, &mut violations);
        let category = check_category(&self.category, &mut violations);
        let condition = check_condition(&self.condition, &mut violations);

        if !violations.is_empty() {
            return Err(AppError::Validation(violations));
        }
        Ok(ItemFields {
            title,
            description,
            price,
            category,
            condition,
        })
    }
}

/// Raw partial update. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
    pub category: Option<String>,
    pub condition: Option<String>,
    pub is_available: Option<bool>,
    pub is_sold: Option<bool>,
}

impl ItemPatch {
    /// Validates only the fields that are present.
    pub fn validate(&self) -> AppResult<ItemChanges> {
        let mut violations = Vec::new();
        let changes = ItemChanges {
            title: self.title.as_deref().map(|v| check_title(v, &mut violations)),
            description: self
                .description
                .as_deref()
                .map(|v| check_description(v, &mut violations)),
            price: self.price.as_deref().map(|v| check_price(v, &mut violations)),
            category: self
                .category
                .as_deref()
                .map(|v| check_category(v, &mut violations)),
            condition: self
                .condition
                .as_deref()
                .map(|v| check_condition(v, &mut violations)),
            is_available: self.is_available,
            is_sold: self.is_sold,
            append_images: Vec::new(),
        };

        if !violations.is_empty() {
            return Err(AppError::Validation(violations));
        }
        Ok(changes)
    }
}

/// Validated, typed changes applied atomically by the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub category: Option<Category>,
    pub condition: Option<Condition>,
    pub is_available: Option<bool>,
    pub is_sold: Option<bool>,
    /// Appended after the existing images, never replacing them.
    pub append_images: Vec<String>,
}

impl ItemChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.category.is_none()
            && self.condition.is_none()
            && self.is_available.is_none()
            && self.is_sold.is_none()
            && self.append_images.is_empty()
    }

    /// Applies the changes in memory. Callers check the image cap first.
    pub fn apply_to(&self, item: &mut Item, now: DateTime<Utc>) {
        if let Some(title) = &self.title {
            item.title = title.clone();
        }
        if let Some(description) = &self.description {
            item.description = description.clone();
        }
        if let Some(price) = self.price {
            item.price = price;
        }
        if let Some(category) = self.category {
            item.category = category;
        }
        if let Some(condition) = self.condition {
            item.condition = condition;
        }
        if let Some(is_available) = self.is_available {
            item.is_available = is_available;
        }
        if let Some(is_sold) = self.is_sold {
            item.is_sold = is_sold;
        }
        item.images.extend(self.append_images.iter().cloned());
        item.updated_at = now;
    }
}

pub fn image_limit_violation(current: usize, appended: usize) -> AppError {
    AppError::validation(
        "images",
        format!(
            "An item can have at most {} images ({} present, {} added)",
            MAX_IMAGES, current, appended
        ),
    )
}

/// Public list entry: the item plus a seller summary without contact details.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSummary {
    #[serde(flatten)]
    pub item: Item,
    pub seller: Option<SellerSummary>,
}

/// Detail view: the item plus the seller's contact details.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDetail {
    #[serde(flatten)]
    pub item: Item,
    pub seller: Option<SellerContact>,
}
