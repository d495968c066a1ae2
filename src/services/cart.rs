//! Cart aggregation: line item lifecycle and quantity rules.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::{Cart, CartLine, CartView, LineItem};
use crate::domain::events::DomainEvent;
use crate::publisher::EventPublisher;
use crate::services::{CartPolicy, FinalizedCartPolicy};
use crate::store::{CommerceStore, StoreTx};
use crate::{CommerceError, Result};

/// Acknowledgment returned when a line item is deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RemovedItem {
    pub cart_id: Uuid,
    pub item_id: Uuid,
    pub message: String,
}

impl RemovedItem {
    fn new(cart_id: Uuid, item_id: Uuid) -> Self {
        Self { cart_id, item_id, message: format!("Item {item_id} removed from cart {cart_id}") }
    }
}

/// Outcome of an absolute quantity update; zero removes the line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ItemUpdate {
    Updated(CartLine),
    Removed(RemovedItem),
}

pub struct CartService<S> {
    store: Arc<S>,
    policy: CartPolicy,
    events: EventPublisher,
}

impl<S> Clone for CartService<S> {
    fn clone(&self) -> Self {
        Self { store: self.store.clone(), policy: self.policy, events: self.events.clone() }
    }
}

impl<S: CommerceStore> CartService<S> {
    pub fn new(store: Arc<S>, policy: CartPolicy, events: EventPublisher) -> Self {
        Self { store, policy, events }
    }

    pub fn policy(&self) -> &CartPolicy {
        &self.policy
    }

    /// Returns the owner's open cart if there is one, otherwise persists a new empty cart.
    #[tracing::instrument(skip(self))]
    pub async fn get_or_create_cart(&self, owner_id: Option<&str>) -> Result<CartView> {
        if let Some(owner) = owner_id {
            if let Some(cart) = self.store.find_open_cart_by_owner(owner).await? {
                let items = self.store.cart_lines(cart.id).await?;
                return Ok(CartView { cart, items });
            }
        }

        let cart = Cart::open(owner_id.map(str::to_owned));
        self.store.insert_cart(&cart).await?;
        tracing::info!(cart_id = %cart.id, "cart created");
        self.events.publish(DomainEvent::CartCreated { cart_id: cart.id, owner_id: cart.owner_id.clone() }).await;
        Ok(CartView { cart, items: vec![] })
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_cart(&self, cart_id: Uuid) -> Result<CartView> {
        let cart = self.store.find_cart(cart_id).await?.ok_or(CommerceError::CartNotFound(cart_id))?;
        let items = self.store.cart_lines(cart_id).await?;
        Ok(CartView { cart, items })
    }

    /// Adds `quantity` units of a coffee, merging into an existing line.
    ///
    /// A new line snapshots the coffee's current price; a merge keeps the
    /// snapshot. A merge that would pass the ceiling changes nothing.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(&self, cart_id: Uuid, coffee_id: Uuid, quantity: u32) -> Result<CartLine> {
        let bounds = self.policy.bounds;
        bounds.check(quantity)?;

        let mut tx = self.store.begin().await?;
        let mut cart = self.lock_mutable_cart(&mut tx, cart_id).await?;
        let coffee = tx.find_coffee(coffee_id).await?.ok_or(CommerceError::CoffeeNotFound(coffee_id))?;

        let item = match tx.line_for_coffee(cart_id, coffee_id).await? {
            Some(mut existing) => {
                let merged = bounds
                    .merge(existing.quantity, quantity)
                    .ok_or_else(|| CommerceError::QuantityLimitExceeded { coffee: coffee.name.clone(), max: bounds.max() })?;
                existing.set_quantity(merged);
                tx.update_line_item(&existing).await?;
                existing
            }
            None => {
                let item = LineItem::snapshot(cart_id, &coffee, quantity);
                tx.insert_line_item(&item).await?;
                item
            }
        };
        let line = CartLine::new(item, coffee.summary())?;
        cart.touch();
        tx.update_cart(&cart).await?;
        tx.commit().await?;

        tracing::info!(%cart_id, item_id = %line.item.id, quantity = line.item.quantity, "item added");
        self.events
            .publish(DomainEvent::ItemAdded { cart_id, item_id: line.item.id, coffee_id, quantity })
            .await;
        Ok(line)
    }

    /// Overwrites a line's quantity. Zero deletes the line.
    #[tracing::instrument(skip(self))]
    pub async fn update_item(&self, cart_id: Uuid, item_id: Uuid, quantity: u32) -> Result<ItemUpdate> {
        let mut tx = self.store.begin().await?;
        let mut cart = self.lock_mutable_cart(&mut tx, cart_id).await?;
        let line = tx
            .cart_line(cart_id, item_id)
            .await?
            .ok_or(CommerceError::LineItemNotFound { cart_id, item_id })?;

        if quantity == 0 {
            tx.delete_line_item(item_id).await?;
            cart.touch();
            tx.update_cart(&cart).await?;
            tx.commit().await?;
            tracing::info!(%cart_id, %item_id, "item removed by zero quantity");
            self.events.publish(DomainEvent::ItemRemoved { cart_id, item_id }).await;
            return Ok(ItemUpdate::Removed(RemovedItem::new(cart_id, item_id)));
        }

        self.policy.bounds.check(quantity)?;
        let CartLine { mut item, coffee, .. } = line;
        item.set_quantity(quantity);
        tx.update_line_item(&item).await?;
        let line = CartLine::new(item, coffee)?;
        cart.touch();
        tx.update_cart(&cart).await?;
        tx.commit().await?;

        tracing::info!(%cart_id, %item_id, quantity, "item updated");
        self.events.publish(DomainEvent::ItemUpdated { cart_id, item_id, quantity }).await;
        Ok(ItemUpdate::Updated(line))
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_item(&self, cart_id: Uuid, item_id: Uuid) -> Result<RemovedItem> {
        let mut tx = self.store.begin().await?;
        let mut cart = self.lock_mutable_cart(&mut tx, cart_id).await?;
        if tx.cart_line(cart_id, item_id).await?.is_none() {
            return Err(CommerceError::LineItemNotFound { cart_id, item_id });
        }
        tx.delete_line_item(item_id).await?;
        cart.touch();
        tx.update_cart(&cart).await?;
        tx.commit().await?;

        tracing::info!(%cart_id, %item_id, "item removed");
        self.events.publish(DomainEvent::ItemRemoved { cart_id, item_id }).await;
        Ok(RemovedItem::new(cart_id, item_id))
    }

    async fn lock_mutable_cart(&self, tx: &mut S::Tx, cart_id: Uuid) -> Result<Cart> {
        let cart = tx.lock_cart(cart_id).await?.ok_or(CommerceError::CartNotFound(cart_id))?;
        if cart.is_finalized() && self.policy.finalized == FinalizedCartPolicy::Reject {
            return Err(CommerceError::CartFinalized(cart_id));
        }
        Ok(cart)
    }
}
