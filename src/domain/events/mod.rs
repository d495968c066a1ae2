//! Domain events
use crate::domain::value_objects::Money;
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    CartCreated { cart_id: Uuid, owner_id: Option<String> },
    ItemAdded { cart_id: Uuid, item_id: Uuid, coffee_id: Uuid, quantity: u32 },
    ItemUpdated { cart_id: Uuid, item_id: Uuid, quantity: u32 },
    ItemRemoved { cart_id: Uuid, item_id: Uuid },
    OrderPlaced { order_id: Uuid, cart_id: Uuid, total: Money },
}

impl DomainEvent {
    pub fn subject(&self) -> &'static str {
        match self {
            Self::CartCreated { .. } => "coffee.cart.created",
            Self::ItemAdded { .. } => "coffee.cart.item_added",
            Self::ItemUpdated { .. } => "coffee.cart.item_updated",
            Self::ItemRemoved { .. } => "coffee.cart.item_removed",
            Self::OrderPlaced { .. } => "coffee.order.placed",
        }
    }
}
