//! Application configuration loaded from environment variables.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::domain::value_objects::{Money, QuantityBounds};
use crate::services::{CartPolicy, FinalizedCartPolicy};
use crate::{CommerceError, Result};

/// Server configuration with sensible defaults.
///
/// Reads from environment variables (after `.env` is loaded):
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `8083`)
/// - `DATABASE_URL` — Postgres URL; unset means the in-memory store
/// - `DATABASE_MAX_CONNECTIONS` — pool size (default: `10`)
/// - `NATS_URL` — event bus; unset disables publication
/// - `CART_MIN_QUANTITY` / `CART_MAX_QUANTITY` — per-line bounds (default: `1` / `5`)
/// - `CART_FINALIZED_POLICY` — `reject` or `allow` mutation of finalized carts (default: `reject`)
/// - `SHIPPING_FEE` — flat fee added at checkout (default: `10.00`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub nats_url: Option<String>,
    pub cart: CartPolicy,
    pub shipping_fee: Money,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let min = parse_or(&lookup, "CART_MIN_QUANTITY", QuantityBounds::DEFAULT_MIN)?;
        let max = parse_or(&lookup, "CART_MAX_QUANTITY", QuantityBounds::DEFAULT_MAX)?;
        let shipping_fee = Money::new(parse_or(&lookup, "SHIPPING_FEE", defaults.shipping_fee.amount())?)
            .validate_price()
            .map_err(|e| CommerceError::InvalidConfig(format!("SHIPPING_FEE: {e}")))?;

        Ok(Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "PORT", defaults.port)?,
            database_url: lookup("DATABASE_URL").filter(|v| !v.is_empty()),
            max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", defaults.max_connections)?,
            nats_url: lookup("NATS_URL").filter(|v| !v.is_empty()),
            cart: CartPolicy {
                bounds: QuantityBounds::new(min, max)?,
                finalized: parse_or(&lookup, "CART_FINALIZED_POLICY", FinalizedCartPolicy::default())?,
            },
            shipping_fee,
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8083,
            database_url: None,
            max_connections: 10,
            nats_url: None,
            cart: CartPolicy::default(),
            shipping_fee: Money::new(Decimal::new(1000, 2)),
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| CommerceError::InvalidConfig(format!("{key}={raw}: {e}"))),
        _ => Ok(default),
    }
}
