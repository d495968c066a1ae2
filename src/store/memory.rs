use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::domain::aggregates::{Cart, CartLine, CartStatus, Coffee, CoffeeChanges, CoffeeQuery, LineItem, NewCoffee, Order, Tag};
use crate::store::{CatalogStore, CommerceStore, StoreTx};
use crate::{CommerceError, Result};

#[derive(Clone, Default)]
struct MemoryState {
    coffees: HashMap<Uuid, Coffee>,
    tags: Vec<Tag>,
    carts: HashMap<Uuid, Cart>,
    line_items: Vec<LineItem>,
    orders: HashMap<Uuid, Order>,
    #[cfg(test)]
    fail_cart_updates: bool,
}

impl MemoryState {
    fn line(&self, item: &LineItem) -> Result<CartLine> {
        let coffee = self
            .coffees
            .get(&item.coffee_id)
            .ok_or_else(|| CommerceError::StorageError(format!("line item {} lost coffee {}", item.id, item.coffee_id)))?;
        CartLine::new(item.clone(), coffee.summary())
    }

    fn cart_lines(&self, cart_id: Uuid) -> Result<Vec<CartLine>> {
        self.line_items.iter().filter(|i| i.cart_id == cart_id).map(|i| self.line(i)).collect()
    }

    fn upsert_tags(&mut self, names: &[String]) -> Vec<Tag> {
        let mut resolved: Vec<Tag> = Vec::with_capacity(names.len());
        for name in names {
            let tag = match self.tags.iter().find(|t| &t.name == name) {
                Some(tag) => tag.clone(),
                None => {
                    let tag = Tag { id: Uuid::now_v7(), name: name.clone() };
                    self.tags.push(tag.clone());
                    tag
                }
            };
            if !resolved.contains(&tag) {
                resolved.push(tag);
            }
        }
        resolved
    }

    fn sorted_coffees(&self) -> Vec<Coffee> {
        let mut coffees: Vec<_> = self.coffees.values().cloned().collect();
        coffees.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        coffees
    }
}

/// In-memory store for tests and database-less runs.
///
/// A transaction takes the state mutex for its whole lifetime and works on a
/// copy, so transactions are serialized and an uncommitted one leaves no trace.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }

    /// Makes every transactional cart update fail until reset.
    #[cfg(test)]
    pub(crate) async fn fail_cart_updates(&self, fail: bool) {
        self.state.lock().await.fail_cart_updates = fail;
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn find_coffee(&self, id: Uuid) -> Result<Option<Coffee>> {
        Ok(self.state.lock().await.coffees.get(&id).cloned())
    }

    async fn list_coffees(&self) -> Result<Vec<Coffee>> {
        Ok(self.state.lock().await.sorted_coffees())
    }

    async fn search_coffees(&self, query: &CoffeeQuery) -> Result<(Vec<Coffee>, u64)> {
        let state = self.state.lock().await;
        let matches: Vec<_> = state.sorted_coffees().into_iter().filter(|c| query.matches(c)).collect();
        let total = matches.len() as u64;
        let page = matches
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn insert_coffee(&self, new: NewCoffee) -> Result<Coffee> {
        let mut state = self.state.lock().await;
        let tags = state.upsert_tags(&new.tags);
        let coffee = Coffee::create(new, tags);
        state.coffees.insert(coffee.id, coffee.clone());
        Ok(coffee)
    }

    async fn update_coffee(&self, id: Uuid, changes: CoffeeChanges) -> Result<Option<Coffee>> {
        let mut state = self.state.lock().await;
        if !state.coffees.contains_key(&id) {
            return Ok(None);
        }
        let tags = changes.tags.as_ref().map(|names| state.upsert_tags(names));
        let Some(coffee) = state.coffees.get_mut(&id) else { return Ok(None) };
        changes.apply(coffee);
        if let Some(tags) = tags {
            coffee.tags = tags;
        }
        Ok(Some(coffee.clone()))
    }

    async fn delete_coffee(&self, id: Uuid) -> Result<bool> {
        let mut state = self.state.lock().await;
        if !state.coffees.contains_key(&id) {
            return Ok(false);
        }
        if state.line_items.iter().any(|i| i.coffee_id == id) {
            return Err(CommerceError::CoffeeInUse(id));
        }
        state.coffees.remove(&id);
        Ok(true)
    }
}

#[async_trait]
impl CommerceStore for InMemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(MemoryTx { guard, working })
    }

    async fn insert_cart(&self, cart: &Cart) -> Result<()> {
        self.state.lock().await.carts.insert(cart.id, cart.clone());
        Ok(())
    }

    async fn find_cart(&self, id: Uuid) -> Result<Option<Cart>> {
        Ok(self.state.lock().await.carts.get(&id).cloned())
    }

    async fn find_open_cart_by_owner(&self, owner_id: &str) -> Result<Option<Cart>> {
        let state = self.state.lock().await;
        Ok(state
            .carts
            .values()
            .filter(|c| c.status == CartStatus::Open && c.owner_id.as_deref() == Some(owner_id))
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
            .cloned())
    }

    async fn cart_lines(&self, cart_id: Uuid) -> Result<Vec<CartLine>> {
        self.state.lock().await.cart_lines(cart_id)
    }

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>> {
        Ok(self.state.lock().await.orders.get(&id).cloned())
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn lock_cart(&mut self, id: Uuid) -> Result<Option<Cart>> {
        Ok(self.working.carts.get(&id).cloned())
    }

    async fn find_coffee(&mut self, id: Uuid) -> Result<Option<Coffee>> {
        Ok(self.working.coffees.get(&id).cloned())
    }

    async fn cart_line(&mut self, cart_id: Uuid, item_id: Uuid) -> Result<Option<CartLine>> {
        self.working
            .line_items
            .iter()
            .find(|i| i.id == item_id && i.cart_id == cart_id)
            .map(|i| self.working.line(i))
            .transpose()
    }

    async fn line_for_coffee(&mut self, cart_id: Uuid, coffee_id: Uuid) -> Result<Option<LineItem>> {
        Ok(self
            .working
            .line_items
            .iter()
            .find(|i| i.cart_id == cart_id && i.coffee_id == coffee_id)
            .cloned())
    }

    async fn cart_lines(&mut self, cart_id: Uuid) -> Result<Vec<CartLine>> {
        self.working.cart_lines(cart_id)
    }

    async fn insert_line_item(&mut self, item: &LineItem) -> Result<()> {
        if self.line_for_coffee(item.cart_id, item.coffee_id).await?.is_some() {
            return Err(CommerceError::StorageError(format!(
                "duplicate line for coffee {} in cart {}",
                item.coffee_id, item.cart_id
            )));
        }
        self.working.line_items.push(item.clone());
        Ok(())
    }

    async fn update_line_item(&mut self, item: &LineItem) -> Result<()> {
        let existing = self
            .working
            .line_items
            .iter_mut()
            .find(|i| i.id == item.id)
            .ok_or_else(|| CommerceError::StorageError(format!("line item {} vanished", item.id)))?;
        *existing = item.clone();
        Ok(())
    }

    async fn delete_line_item(&mut self, item_id: Uuid) -> Result<()> {
        self.working.line_items.retain(|i| i.id != item_id);
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        if self.working.orders.values().any(|o| o.cart_id == order.cart_id) {
            return Err(CommerceError::StorageError(format!("cart {} already has an order", order.cart_id)));
        }
        self.working.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn update_cart(&mut self, cart: &Cart) -> Result<()> {
        #[cfg(test)]
        if self.working.fail_cart_updates {
            return Err(CommerceError::StorageError("injected cart update failure".into()));
        }
        self.working.carts.insert(cart.id, cart.clone());
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        let MemoryTx { mut guard, working } = self;
        *guard = working;
        Ok(())
    }
}
