//! Coffee catalog maintenance and search.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::aggregates::{Coffee, CoffeeChanges, CoffeeQuery, NewCoffee, Page, Pagination};
use crate::domain::value_objects::Money;
use crate::store::CatalogStore;
use crate::{CommerceError, Result};

const MAX_PAGE_SIZE: u32 = 100;

pub struct CatalogService<S> {
    store: Arc<S>,
}

impl<S> Clone for CatalogService<S> {
    fn clone(&self) -> Self {
        Self { store: self.store.clone() }
    }
}

impl<S: CatalogStore> CatalogService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> Result<Vec<Coffee>> {
        self.store.list_coffees().await
    }

    pub async fn get(&self, id: Uuid) -> Result<Coffee> {
        self.store.find_coffee(id).await?.ok_or(CommerceError::CoffeeNotFound(id))
    }

    #[tracing::instrument(skip(self, new), fields(name = %new.name))]
    pub async fn create(&self, mut new: NewCoffee) -> Result<Coffee> {
        new.price = new.price.validate_price()?;
        let coffee = self.store.insert_coffee(new).await?;
        tracing::info!(coffee_id = %coffee.id, "coffee created");
        Ok(coffee)
    }

    /// Applies a partial update. Existing cart lines keep their snapshot price.
    #[tracing::instrument(skip(self, changes))]
    pub async fn update(&self, id: Uuid, mut changes: CoffeeChanges) -> Result<Coffee> {
        changes.price = changes.price.map(Money::validate_price).transpose()?;
        self.store.update_coffee(id, changes).await?.ok_or(CommerceError::CoffeeNotFound(id))
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        if !self.store.delete_coffee(id).await? {
            return Err(CommerceError::CoffeeNotFound(id));
        }
        tracing::info!(coffee_id = %id, "coffee deleted");
        Ok(())
    }

    pub async fn search(&self, mut query: CoffeeQuery) -> Result<Page<Coffee>> {
        if query.limit == 0 {
            query.limit = CoffeeQuery::DEFAULT_LIMIT;
        }
        query.limit = query.limit.min(MAX_PAGE_SIZE);
        let (data, total) = self.store.search_coffees(&query).await?;
        Ok(Page { data, pagination: Pagination::new(total, query.limit, query.offset) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::cart::tests::seed_coffee;
    use crate::services::{CartPolicy, CartService};
    use crate::publisher::EventPublisher;
    use crate::store::InMemoryStore;
    use rust_decimal::Decimal;

    fn new_coffee(name: &str, cents: i64, tags: &[&str]) -> NewCoffee {
        NewCoffee {
            name: name.into(),
            description: "House roast".into(),
            price: Money::new(Decimal::new(cents, 2)),
            image_url: "https://example.com/coffee.jpg".into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_create_get_list() {
        let catalog = CatalogService::new(Arc::new(InMemoryStore::new()));
        let created = catalog.create(new_coffee("Espresso", 500, &["intenso"])).await.unwrap();
        assert_eq!(catalog.get(created.id).await.unwrap().name, "Espresso");
        assert_eq!(catalog.list().await.unwrap().len(), 1);
        assert!(matches!(catalog.get(Uuid::now_v7()).await, Err(CommerceError::CoffeeNotFound(_))));
    }

    #[tokio::test]
    async fn test_negative_price_rejected() {
        let catalog = CatalogService::new(Arc::new(InMemoryStore::new()));
        let err = catalog.create(new_coffee("Free lunch", -1, &[])).await.unwrap_err();
        assert!(matches!(err, CommerceError::NegativePrice(_)));

        let coffee = catalog.create(new_coffee("Espresso", 500, &[])).await.unwrap();
        let changes = CoffeeChanges { price: Some(Money::new(Decimal::new(-100, 2))), ..Default::default() };
        assert!(catalog.update(coffee.id, changes).await.is_err());
        assert_eq!(catalog.get(coffee.id).await.unwrap().price, coffee.price);
    }

    #[tokio::test]
    async fn test_price_scale_and_ceiling() {
        let catalog = CatalogService::new(Arc::new(InMemoryStore::new()));
        let huge = NewCoffee { price: Money::new(Decimal::MAX), ..new_coffee("Gold Leaf", 0, &[]) };
        assert!(matches!(catalog.create(huge).await, Err(CommerceError::PriceOutOfRange { .. })));
        let fractional = NewCoffee { price: Money::new(Decimal::new(4999, 3)), ..new_coffee("Cortado", 0, &[]) };
        assert!(matches!(catalog.create(fractional).await, Err(CommerceError::PriceOutOfRange { .. })));
        assert!(catalog.list().await.unwrap().is_empty());

        let coffee = catalog.create(new_coffee("Cortado", 450, &[])).await.unwrap();
        assert_eq!(coffee.price.to_string(), "4.50");
        let changes = CoffeeChanges { price: Some(Money::new(Decimal::new(100_000_000, 0))), ..Default::default() };
        assert!(matches!(catalog.update(coffee.id, changes).await, Err(CommerceError::PriceOutOfRange { .. })));
        assert_eq!(catalog.get(coffee.id).await.unwrap().price, coffee.price);
    }

    #[tokio::test]
    async fn test_update_replaces_tags() {
        let catalog = CatalogService::new(Arc::new(InMemoryStore::new()));
        let coffee = catalog.create(new_coffee("Latte", 600, &["milk"])).await.unwrap();
        let changes = CoffeeChanges { name: Some("Flat White".into()), tags: Some(vec!["velvet".into()]), ..Default::default() };
        let updated = catalog.update(coffee.id, changes).await.unwrap();
        assert_eq!(updated.name, "Flat White");
        assert_eq!(updated.tags.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(), vec!["velvet"]);
        assert!(matches!(
            catalog.update(Uuid::now_v7(), CoffeeChanges::default()).await,
            Err(CommerceError::CoffeeNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_refuses_referenced_coffee() {
        let store = Arc::new(InMemoryStore::new());
        let catalog = CatalogService::new(store.clone());
        let carts = CartService::new(store.clone(), CartPolicy::default(), EventPublisher::disabled());
        let used = seed_coffee(&store, "Espresso", 500).await;
        let unused = seed_coffee(&store, "Latte", 300).await;
        let cart = carts.get_or_create_cart(None).await.unwrap().cart;
        carts.add_item(cart.id, used.id, 1).await.unwrap();

        assert!(matches!(catalog.delete(used.id).await, Err(CommerceError::CoffeeInUse(_))));
        catalog.delete(unused.id).await.unwrap();
        assert!(matches!(catalog.delete(unused.id).await, Err(CommerceError::CoffeeNotFound(_))));
    }

    #[tokio::test]
    async fn test_search_pagination() {
        let catalog = CatalogService::new(Arc::new(InMemoryStore::new()));
        for name in ["Espresso", "Espresso Doppio", "Latte"] {
            catalog.create(new_coffee(name, 500, &["classic"])).await.unwrap();
        }

        let page = catalog
            .search(CoffeeQuery { name: Some("espresso".into()), limit: 1, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.pagination, Pagination { total: 2, limit: 1, offset: 0, has_more: true });

        let everything = catalog.search(CoffeeQuery { limit: 0, ..Default::default() }).await.unwrap();
        assert_eq!(everything.pagination.limit, CoffeeQuery::DEFAULT_LIMIT);
        assert_eq!(everything.data.len(), 3);
        assert!(!everything.pagination.has_more);
    }
}
