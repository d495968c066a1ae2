//! Coffee Commerce
//!
//! Cart and checkout backend for a coffee shop.
//!
//! ## Features
//! - Coffee catalog with tags and search
//! - Shopping carts with bounded, merged line items
//! - Price snapshot at first add
//! - Atomic checkout into immutable orders
//! - Postgres or in-memory storage

pub mod config;
pub mod domain;
pub mod publisher;
pub mod routes;
pub mod services;
pub mod store;

use thiserror::Error;
use uuid::Uuid;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum CommerceError {
    #[error("Cart {0} not found")]
    CartNotFound(Uuid),

    #[error("Coffee {0} not found")]
    CoffeeNotFound(Uuid),

    #[error("Item {item_id} not found in cart {cart_id}")]
    LineItemNotFound { cart_id: Uuid, item_id: Uuid },

    #[error("Order {0} not found")]
    OrderNotFound(Uuid),

    #[error("Quantity must be between {min} and {max} units, got {quantity}")]
    QuantityOutOfRange { quantity: u32, min: u32, max: u32 },

    #[error("Total quantity for coffee {coffee} would exceed the limit of {max} units")]
    QuantityLimitExceeded { coffee: String, max: u32 },

    #[error("Cannot checkout an empty cart ({0})")]
    EmptyCart(Uuid),

    #[error("Cart {0} is finalized")]
    CartFinalized(Uuid),

    #[error("Price must not be negative, got {0}")]
    NegativePrice(rust_decimal::Decimal),

    #[error("Price {price} must have at most two decimal places and not exceed {max}")]
    PriceOutOfRange { price: rust_decimal::Decimal, max: rust_decimal::Decimal },

    #[error("Amount is outside the supported range")]
    AmountOverflow,

    #[error("Coffee {0} is still referenced by cart items")]
    CoffeeInUse(Uuid),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Coarse classification used by callers that only care about the outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    Infrastructure,
}

impl CommerceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CartNotFound(_)
            | Self::CoffeeNotFound(_)
            | Self::LineItemNotFound { .. }
            | Self::OrderNotFound(_) => ErrorKind::NotFound,
            Self::QuantityOutOfRange { .. }
            | Self::QuantityLimitExceeded { .. }
            | Self::EmptyCart(_)
            | Self::CartFinalized(_)
            | Self::NegativePrice(_)
            | Self::PriceOutOfRange { .. }
            | Self::AmountOverflow
            | Self::CoffeeInUse(_) => ErrorKind::InvalidInput,
            Self::InvalidConfig(_)
            | Self::StorageError(_)
            | Self::Database(_)
            | Self::Migration(_) => ErrorKind::Infrastructure,
        }
    }
}

pub type Result<T> = std::result::Result<T, CommerceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(CommerceError::CartNotFound(Uuid::nil()).kind(), ErrorKind::NotFound);
        assert_eq!(
            CommerceError::LineItemNotFound { cart_id: Uuid::nil(), item_id: Uuid::nil() }.kind(),
            ErrorKind::NotFound
        );
        assert_eq!(CommerceError::EmptyCart(Uuid::nil()).kind(), ErrorKind::InvalidInput);
        assert_eq!(CommerceError::StorageError("down".into()).kind(), ErrorKind::Infrastructure);
    }

    #[test]
    fn test_merge_error_names_coffee() {
        let err = CommerceError::QuantityLimitExceeded { coffee: "Espresso".into(), max: 5 };
        assert!(err.to_string().contains("Espresso"));
        assert!(err.to_string().contains('5'));
    }
}
