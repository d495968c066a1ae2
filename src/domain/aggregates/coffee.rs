//! Coffee Aggregate (catalog item)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::value_objects::Money;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag { pub id: Uuid, pub name: String }

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Coffee {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub image_url: String,
    pub tags: Vec<Tag>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Catalog details attached to cart lines.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoffeeSummary { pub id: Uuid, pub name: String, pub price: Money, pub image_url: String }

impl Coffee {
    pub fn create(new: NewCoffee, tags: Vec<Tag>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(), name: new.name, description: new.description, price: new.price,
            image_url: new.image_url, tags, created_at: now, updated_at: now,
        }
    }

    pub fn summary(&self) -> CoffeeSummary {
        CoffeeSummary { id: self.id, name: self.name.clone(), price: self.price, image_url: self.image_url.clone() }
    }

    pub fn has_any_tag(&self, names: &[String]) -> bool {
        self.tags.iter().any(|t| names.iter().any(|n| n.eq_ignore_ascii_case(&t.name)))
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewCoffee { pub name: String, pub description: String, pub price: Money, pub image_url: String, pub tags: Vec<String> }

/// Partial update; `tags`, when present, replaces the whole tag set.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CoffeeChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Money>,
    pub image_url: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl CoffeeChanges {
    /// Applies the scalar fields; tags are resolved by the store.
    pub fn apply(&self, coffee: &mut Coffee) {
        if let Some(name) = &self.name { coffee.name = name.clone(); }
        if let Some(description) = &self.description { coffee.description = description.clone(); }
        if let Some(price) = self.price { coffee.price = price; }
        if let Some(image_url) = &self.image_url { coffee.image_url = image_url.clone(); }
        coffee.updated_at = Utc::now();
    }
}

#[derive(Clone, Debug)]
pub struct CoffeeQuery {
    pub name: Option<String>,
    pub tags: Vec<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub limit: u32,
    pub offset: u32,
}

impl CoffeeQuery {
    pub const DEFAULT_LIMIT: u32 = 10;

    pub fn matches(&self, coffee: &Coffee) -> bool {
        if let Some(name) = &self.name {
            if !coffee.name.to_lowercase().contains(&name.to_lowercase()) { return false; }
        }
        if !self.tags.is_empty() && !coffee.has_any_tag(&self.tags) { return false; }
        if self.start_date.is_some_and(|start| coffee.created_at < start) { return false; }
        if self.end_date.is_some_and(|end| coffee.created_at > end) { return false; }
        true
    }
}

impl Default for CoffeeQuery {
    fn default() -> Self {
        Self { name: None, tags: vec![], start_date: None, end_date: None, limit: Self::DEFAULT_LIMIT, offset: 0 }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Page<T> { pub data: Vec<T>, pub pagination: Pagination }

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Pagination { pub total: u64, pub limit: u32, pub offset: u32, pub has_more: bool }

impl Pagination {
    pub fn new(total: u64, limit: u32, offset: u32) -> Self {
        Self { total, limit, offset, has_more: u64::from(offset) + u64::from(limit) < total }
    }
}
