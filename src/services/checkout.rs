//! Checkout: turns an open cart into an order in one atomic step.

use std::sync::Arc;

use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::domain::aggregates::{CheckoutTotals, Order, OrderSummary};
use crate::domain::events::DomainEvent;
use crate::domain::value_objects::Money;
use crate::publisher::EventPublisher;
use crate::services::CartService;
use crate::store::{CommerceStore, StoreTx};
use crate::{CommerceError, Result};

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct CheckoutRequest {
    pub cart_id: Uuid,
    #[validate(length(min = 1, max = 500))]
    pub delivery_address: String,
    #[validate(length(min = 1, max = 50))]
    pub payment_method: String,
}

pub struct CheckoutService<S> {
    carts: CartService<S>,
    store: Arc<S>,
    shipping_fee: Money,
    events: EventPublisher,
}

impl<S> Clone for CheckoutService<S> {
    fn clone(&self) -> Self {
        Self {
            carts: self.carts.clone(),
            store: self.store.clone(),
            shipping_fee: self.shipping_fee,
            events: self.events.clone(),
        }
    }
}

impl<S: CommerceStore> CheckoutService<S> {
    pub fn new(store: Arc<S>, carts: CartService<S>, shipping_fee: Money, events: EventPublisher) -> Self {
        Self { carts, store, shipping_fee, events }
    }

    /// Places an order for the cart and finalizes it.
    ///
    /// The order insert and the cart transition commit together or not at all.
    /// The cart's lines stay in place as the order's line record.
    #[tracing::instrument(skip(self, request), fields(cart_id = %request.cart_id))]
    pub async fn create_order(&self, request: CheckoutRequest) -> Result<OrderSummary> {
        let cart_id = request.cart_id;

        // Cheap rejection before taking the lock.
        let view = self.carts.get_cart(cart_id).await?;
        if view.is_empty() {
            return Err(CommerceError::EmptyCart(cart_id));
        }
        if view.cart.is_finalized() {
            return Err(CommerceError::CartFinalized(cart_id));
        }

        let mut tx = self.store.begin().await?;
        let mut cart = tx.lock_cart(cart_id).await?.ok_or(CommerceError::CartNotFound(cart_id))?;
        let lines = tx.cart_lines(cart_id).await?;
        if lines.is_empty() {
            return Err(CommerceError::EmptyCart(cart_id));
        }
        if cart.is_finalized() {
            return Err(CommerceError::CartFinalized(cart_id));
        }

        let totals = CheckoutTotals::compute(&lines, self.shipping_fee)?;
        let order = Order::place(cart_id, &totals, request.delivery_address, request.payment_method);
        let summary = OrderSummary::new(&order, &lines)?;
        tx.insert_order(&order).await?;
        cart.finalize(order.created_at)?;
        tx.update_cart(&cart).await?;
        tx.commit().await?;

        tracing::info!(order_id = %order.id, total = %order.total_amount, items = order.total_items, "order placed");
        self.events
            .publish(DomainEvent::OrderPlaced { order_id: order.id, cart_id, total: order.total_amount })
            .await;
        Ok(summary)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderSummary> {
        let order = self.store.find_order(order_id).await?.ok_or(CommerceError::OrderNotFound(order_id))?;
        let lines = self.store.cart_lines(order.cart_id).await?;
        OrderSummary::new(&order, &lines)
    }

    pub fn shipping_fee(&self) -> Money {
        self.shipping_fee
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{CartStatus, OrderStatus, PaymentStatus};
    use crate::services::cart::tests::seed_coffee;
    use crate::services::{CartPolicy, FinalizedCartPolicy, ItemUpdate};
    use crate::store::InMemoryStore;
    use rust_decimal::Decimal;

    fn services(store: &Arc<InMemoryStore>, policy: CartPolicy) -> (CartService<InMemoryStore>, CheckoutService<InMemoryStore>) {
        let carts = CartService::new(store.clone(), policy, EventPublisher::disabled());
        let fee = Money::new(Decimal::new(1000, 2));
        let checkout = CheckoutService::new(store.clone(), carts.clone(), fee, EventPublisher::disabled());
        (carts, checkout)
    }

    fn request(cart_id: Uuid) -> CheckoutRequest {
        CheckoutRequest { cart_id, delivery_address: "Rua das Flores, 42".into(), payment_method: "credit_card".into() }
    }

    async fn filled_cart(store: &InMemoryStore, carts: &CartService<InMemoryStore>) -> Uuid {
        let espresso = seed_coffee(store, "Espresso", 500).await;
        let latte = seed_coffee(store, "Latte", 300).await;
        let cart = carts.get_or_create_cart(Some("ana")).await.unwrap().cart;
        carts.add_item(cart.id, espresso.id, 2).await.unwrap();
        carts.add_item(cart.id, latte.id, 1).await.unwrap();
        cart.id
    }

    #[tokio::test]
    async fn test_checkout_totals_and_finalization() {
        let store = Arc::new(InMemoryStore::new());
        let (carts, checkout) = services(&store, CartPolicy::default());
        let cart_id = filled_cart(&store, &carts).await;
        let before = carts.get_cart(cart_id).await.unwrap().items;

        let summary = checkout.create_order(request(cart_id)).await.unwrap();
        assert_eq!(summary.total_items, 3);
        assert_eq!(summary.unique_categories, 2);
        assert_eq!(summary.items_total.amount(), Decimal::new(1300, 2));
        assert_eq!(summary.shipping_fee.amount(), Decimal::new(1000, 2));
        assert_eq!(summary.total.amount(), Decimal::new(2300, 2));
        assert_eq!(summary.status, OrderStatus::AwaitingPayment);

        let view = carts.get_cart(cart_id).await.unwrap();
        assert_eq!(view.cart.status, CartStatus::Finalized);
        assert_eq!(view.cart.payment_status, Some(PaymentStatus::Pending));
        assert!(view.cart.completed_at.is_some());
        assert_eq!(view.items.len(), before.len());
        for (after, earlier) in view.items.iter().zip(&before) {
            assert_eq!(after.item.id, earlier.item.id);
            assert_eq!(after.item.coffee_id, earlier.item.coffee_id);
            assert_eq!(after.item.quantity, earlier.item.quantity);
            assert_eq!(after.item.unit_price, earlier.item.unit_price);
        }

        let fetched = checkout.get_order(summary.id).await.unwrap();
        assert_eq!(fetched.total, summary.total);
        for lines in [&summary.items, &fetched.items] {
            let mut seen: Vec<_> = lines
                .iter()
                .map(|l| (l.name.as_str(), l.quantity, l.unit_price.amount()))
                .collect();
            seen.sort();
            assert_eq!(seen, vec![("Espresso", 2, Decimal::new(500, 2)), ("Latte", 1, Decimal::new(300, 2))]);
        }
    }

    #[tokio::test]
    async fn test_empty_cart_rejected() {
        let store = Arc::new(InMemoryStore::new());
        let (carts, checkout) = services(&store, CartPolicy::default());
        let cart = carts.get_or_create_cart(None).await.unwrap().cart;

        let err = checkout.create_order(request(cart.id)).await.unwrap_err();
        assert!(matches!(err, CommerceError::EmptyCart(_)));
        assert_eq!(carts.get_cart(cart.id).await.unwrap().cart.status, CartStatus::Open);
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_cart_and_order() {
        let store = Arc::new(InMemoryStore::new());
        let (_, checkout) = services(&store, CartPolicy::default());
        assert!(matches!(checkout.create_order(request(Uuid::now_v7())).await, Err(CommerceError::CartNotFound(_))));
        assert!(matches!(checkout.get_order(Uuid::now_v7()).await, Err(CommerceError::OrderNotFound(_))));
    }

    #[tokio::test]
    async fn test_second_checkout_rejected() {
        let store = Arc::new(InMemoryStore::new());
        let (carts, checkout) = services(&store, CartPolicy::default());
        let cart_id = filled_cart(&store, &carts).await;

        checkout.create_order(request(cart_id)).await.unwrap();
        let err = checkout.create_order(request(cart_id)).await.unwrap_err();
        assert!(matches!(err, CommerceError::CartFinalized(_)));
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn test_failed_cart_update_leaves_no_order() {
        let store = Arc::new(InMemoryStore::new());
        let (carts, checkout) = services(&store, CartPolicy::default());
        let cart_id = filled_cart(&store, &carts).await;

        store.fail_cart_updates(true).await;
        assert!(checkout.create_order(request(cart_id)).await.is_err());
        store.fail_cart_updates(false).await;

        assert_eq!(store.order_count().await, 0);
        let view = carts.get_cart(cart_id).await.unwrap();
        assert_eq!(view.cart.status, CartStatus::Open);
        assert!(view.cart.payment_status.is_none());

        checkout.create_order(request(cart_id)).await.unwrap();
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn test_finalized_cart_rejects_mutation() {
        let store = Arc::new(InMemoryStore::new());
        let (carts, checkout) = services(&store, CartPolicy::default());
        let cart_id = filled_cart(&store, &carts).await;
        let mocha = seed_coffee(&store, "Mocha", 450).await;
        checkout.create_order(request(cart_id)).await.unwrap();
        let before = carts.get_cart(cart_id).await.unwrap().items;
        let item_id = before[0].item.id;

        assert!(matches!(carts.add_item(cart_id, mocha.id, 1).await, Err(CommerceError::CartFinalized(_))));
        assert!(matches!(carts.update_item(cart_id, item_id, 4).await, Err(CommerceError::CartFinalized(_))));
        assert!(matches!(carts.update_item(cart_id, item_id, 0).await, Err(CommerceError::CartFinalized(_))));
        assert!(matches!(carts.remove_item(cart_id, item_id).await, Err(CommerceError::CartFinalized(_))));

        let after = carts.get_cart(cart_id).await.unwrap().items;
        assert_eq!(after, before);
    }

    #[tokio::test]
    async fn test_finalized_cart_mutable_when_allowed() {
        let store = Arc::new(InMemoryStore::new());
        let permissive = CartPolicy { finalized: FinalizedCartPolicy::Allow, ..Default::default() };
        let (carts, checkout) = services(&store, permissive);
        let cart_id = filled_cart(&store, &carts).await;
        let mocha = seed_coffee(&store, "Mocha", 450).await;
        let order = checkout.create_order(request(cart_id)).await.unwrap();
        let lines = carts.get_cart(cart_id).await.unwrap().items;
        let (espresso, latte) = (lines[0].item.id, lines[1].item.id);

        let added = carts.add_item(cart_id, mocha.id, 1).await.unwrap();
        let ItemUpdate::Updated(updated) = carts.update_item(cart_id, espresso, 4).await.unwrap() else {
            panic!("expected an updated line");
        };
        assert_eq!(updated.item.quantity, 4);
        assert!(matches!(carts.update_item(cart_id, latte, 0).await.unwrap(), ItemUpdate::Removed(_)));
        carts.remove_item(cart_id, added.item.id).await.unwrap();

        let items = carts.get_cart(cart_id).await.unwrap().items;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].item.quantity, 4);

        // The order keeps the totals it was placed with.
        let fetched = checkout.get_order(order.id).await.unwrap();
        assert_eq!(fetched.total_items, 3);
        assert_eq!(fetched.items_total.amount(), Decimal::new(1300, 2));
        assert_eq!(fetched.total.amount(), Decimal::new(2300, 2));
        assert_eq!(fetched.items_total.checked_add(fetched.shipping_fee).unwrap(), fetched.total);
    }

    #[test]
    fn test_request_validation() {
        let mut req = request(Uuid::now_v7());
        assert!(req.validate().is_ok());
        req.delivery_address.clear();
        assert!(req.validate().is_err());
    }
}
