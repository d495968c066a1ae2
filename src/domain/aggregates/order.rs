//! Order Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;
use uuid::Uuid;
use crate::domain::aggregates::cart::CartLine;
use crate::domain::value_objects::Money;
use crate::{CommerceError, Result};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus { #[default] AwaitingPayment, Paid, Cancelled }

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::AwaitingPayment => "awaiting_payment", Self::Paid => "paid", Self::Cancelled => "cancelled" }
    }
}

impl FromStr for OrderStatus {
    type Err = CommerceError;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "awaiting_payment" => Ok(Self::AwaitingPayment),
            "paid" => Ok(Self::Paid),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(CommerceError::StorageError(format!("unknown order status {other}"))),
        }
    }
}

/// Settlement record. Written once, at checkout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub cart_id: Uuid,
    pub total_items: u32,
    pub shipping_fee: Money,
    pub total_amount: Money,
    pub status: OrderStatus,
    pub delivery_address: String,
    pub payment_method: String,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn place(cart_id: Uuid, totals: &CheckoutTotals, delivery_address: impl Into<String>, payment_method: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(), cart_id, total_items: totals.total_items, shipping_fee: totals.shipping_fee,
            total_amount: totals.total, status: OrderStatus::AwaitingPayment,
            delivery_address: delivery_address.into(), payment_method: payment_method.into(), created_at: Utc::now(),
        }
    }
}

/// Figures derived from a cart's lines at checkout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CheckoutTotals {
    pub total_items: u32,
    pub items_total: Money,
    pub unique_categories: usize,
    pub shipping_fee: Money,
    pub total: Money,
}

impl CheckoutTotals {
    /// Categories are counted by coffee name.
    pub fn compute(lines: &[CartLine], shipping_fee: Money) -> Result<Self> {
        let total_items = lines.iter().map(|l| l.item.quantity).sum();
        let items_total = Money::try_sum(lines.iter().map(|l| l.subtotal))?;
        let total = items_total.checked_add(shipping_fee)?;
        Ok(Self { total_items, items_total, unique_categories: unique_categories(lines), shipping_fee, total })
    }
}

fn unique_categories(lines: &[CartLine]) -> usize {
    lines.iter().map(|l| l.coffee.name.as_str()).collect::<HashSet<_>>().len()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OrderLine { pub coffee_id: Uuid, pub name: String, pub quantity: u32, pub unit_price: Money }

/// Order as presented to clients.
///
/// Totals always come from the stored order. `items` and `unique_categories`
/// describe the cart's current lines, which only differ from checkout time
/// when finalized carts are left mutable.
#[derive(Clone, Debug, Serialize)]
pub struct OrderSummary {
    pub id: Uuid,
    pub cart_id: Uuid,
    pub items: Vec<OrderLine>,
    pub unique_categories: usize,
    pub total_items: u32,
    pub items_total: Money,
    pub shipping_fee: Money,
    pub total: Money,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl OrderSummary {
    pub fn new(order: &Order, lines: &[CartLine]) -> Result<Self> {
        Ok(Self {
            id: order.id,
            cart_id: order.cart_id,
            items: lines.iter().map(|l| OrderLine {
                coffee_id: l.item.coffee_id, name: l.coffee.name.clone(), quantity: l.item.quantity, unit_price: l.item.unit_price,
            }).collect(),
            unique_categories: unique_categories(lines),
            total_items: order.total_items,
            items_total: order.total_amount.checked_sub(order.shipping_fee)?,
            shipping_fee: order.shipping_fee,
            total: order.total_amount,
            status: order.status,
            created_at: order.created_at,
        })
    }
}
