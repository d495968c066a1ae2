//! Persistence boundary for the catalog, carts and orders.
//!
//! Reads go through [`CommerceStore`] directly. Every mutation of a cart goes
//! through a [`StoreTx`], which locks the cart row first and applies nothing
//! until [`StoreTx::commit`]. Dropping an uncommitted transaction rolls it back.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::aggregates::{Cart, CartLine, Coffee, CoffeeChanges, CoffeeQuery, LineItem, NewCoffee, Order};
use crate::domain::value_objects::Money;
use crate::Result;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

/// Catalog lookups and maintenance.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn find_coffee(&self, id: Uuid) -> Result<Option<Coffee>>;

    async fn coffee_exists(&self, id: Uuid) -> Result<bool> {
        Ok(self.find_coffee(id).await?.is_some())
    }

    async fn current_price(&self, id: Uuid) -> Result<Option<Money>> {
        Ok(self.find_coffee(id).await?.map(|c| c.price))
    }

    async fn list_coffees(&self) -> Result<Vec<Coffee>>;

    /// Matching page plus the total number of matches.
    async fn search_coffees(&self, query: &CoffeeQuery) -> Result<(Vec<Coffee>, u64)>;

    async fn insert_coffee(&self, new: NewCoffee) -> Result<Coffee>;

    async fn update_coffee(&self, id: Uuid, changes: CoffeeChanges) -> Result<Option<Coffee>>;

    /// Returns `false` when the coffee does not exist. Fails with
    /// `CoffeeInUse` while any line item references it.
    async fn delete_coffee(&self, id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait CommerceStore: CatalogStore {
    type Tx: StoreTx;

    async fn begin(&self) -> Result<Self::Tx>;

    async fn insert_cart(&self, cart: &Cart) -> Result<()>;

    async fn find_cart(&self, id: Uuid) -> Result<Option<Cart>>;

    /// Most recently created open cart for the owner.
    async fn find_open_cart_by_owner(&self, owner_id: &str) -> Result<Option<Cart>>;

    async fn cart_lines(&self, cart_id: Uuid) -> Result<Vec<CartLine>>;

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>>;
}

/// A single all-or-nothing unit of work against the store.
#[async_trait]
pub trait StoreTx: Send {
    /// Loads the cart and holds it exclusively until commit or drop.
    async fn lock_cart(&mut self, id: Uuid) -> Result<Option<Cart>>;

    async fn find_coffee(&mut self, id: Uuid) -> Result<Option<Coffee>>;

    /// Line item by id, scoped to the cart.
    async fn cart_line(&mut self, cart_id: Uuid, item_id: Uuid) -> Result<Option<CartLine>>;

    async fn line_for_coffee(&mut self, cart_id: Uuid, coffee_id: Uuid) -> Result<Option<LineItem>>;

    async fn cart_lines(&mut self, cart_id: Uuid) -> Result<Vec<CartLine>>;

    async fn insert_line_item(&mut self, item: &LineItem) -> Result<()>;

    async fn update_line_item(&mut self, item: &LineItem) -> Result<()>;

    async fn delete_line_item(&mut self, item_id: Uuid) -> Result<()>;

    async fn insert_order(&mut self, order: &Order) -> Result<()>;

    async fn update_cart(&mut self, cart: &Cart) -> Result<()>;

    async fn commit(self) -> Result<()>;
}
