//! Cart Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;
use crate::domain::aggregates::coffee::{Coffee, CoffeeSummary};
use crate::domain::value_objects::Money;
use crate::{CommerceError, Result};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CartStatus { #[default] Open, Finalized }

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus { Pending, Paid, Failed }

impl CartStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Open => "open", Self::Finalized => "finalized" }
    }
}

impl FromStr for CartStatus {
    type Err = CommerceError;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "open" => Ok(Self::Open),
            "finalized" => Ok(Self::Finalized),
            other => Err(CommerceError::StorageError(format!("unknown cart status {other}"))),
        }
    }
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Pending => "pending", Self::Paid => "paid", Self::Failed => "failed" }
    }
}

impl FromStr for PaymentStatus {
    type Err = CommerceError;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            other => Err(CommerceError::StorageError(format!("unknown payment status {other}"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub id: Uuid,
    pub owner_id: Option<String>,
    pub status: CartStatus,
    pub payment_status: Option<PaymentStatus>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    pub fn open(owner_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(), owner_id, status: CartStatus::Open, payment_status: None,
            completed_at: None, created_at: now, updated_at: now,
        }
    }

    pub fn is_finalized(&self) -> bool { self.status == CartStatus::Finalized }

    /// Closes the cart for checkout. Happens exactly once.
    pub fn finalize(&mut self, at: DateTime<Utc>) -> Result<()> {
        if self.is_finalized() { return Err(CommerceError::CartFinalized(self.id)); }
        self.status = CartStatus::Finalized;
        self.payment_status = Some(PaymentStatus::Pending);
        self.completed_at = Some(at);
        self.updated_at = at;
        Ok(())
    }

    pub fn touch(&mut self) { self.updated_at = Utc::now(); }
}

/// One coffee's quantity and locked-in price within a cart.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: Uuid,
    pub cart_id: Uuid,
    pub coffee_id: Uuid,
    pub quantity: u32,
    pub unit_price: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LineItem {
    /// New line priced at the coffee's current catalog price.
    pub fn snapshot(cart_id: Uuid, coffee: &Coffee, quantity: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(), cart_id, coffee_id: coffee.id, quantity,
            unit_price: coffee.price, created_at: now, updated_at: now,
        }
    }

    pub fn subtotal(&self) -> Result<Money> { self.unit_price.checked_times(self.quantity) }

    pub fn set_quantity(&mut self, quantity: u32) {
        self.quantity = quantity;
        self.updated_at = Utc::now();
    }
}

/// A line item enriched with catalog details and its subtotal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CartLine {
    #[serde(flatten)]
    pub item: LineItem,
    pub coffee: CoffeeSummary,
    pub subtotal: Money,
}

impl CartLine {
    pub fn new(item: LineItem, coffee: CoffeeSummary) -> Result<Self> {
        let subtotal = item.subtotal()?;
        Ok(Self { item, coffee, subtotal })
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct CartView {
    #[serde(flatten)]
    pub cart: Cart,
    pub items: Vec<CartLine>,
}

impl CartView {
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
}
