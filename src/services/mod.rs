//! Application services over a [`CommerceStore`](crate::store::CommerceStore).

pub mod cart;
pub mod catalog;
pub mod checkout;

use std::fmt;
use std::str::FromStr;

use crate::domain::value_objects::QuantityBounds;

pub use cart::{CartService, ItemUpdate, RemovedItem};
pub use catalog::CatalogService;
pub use checkout::{CheckoutRequest, CheckoutService};

/// What happens when a line item mutation targets a finalized cart.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FinalizedCartPolicy {
    #[default]
    Reject,
    /// Legacy behaviour: finalized carts stay mutable.
    Allow,
}

impl FromStr for FinalizedCartPolicy {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, String> {
        match s.to_ascii_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "allow" => Ok(Self::Allow),
            other => Err(format!("expected `reject` or `allow`, got `{other}`")),
        }
    }
}

impl fmt::Display for FinalizedCartPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::Reject => write!(f, "reject"), Self::Allow => write!(f, "allow") }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CartPolicy {
    pub bounds: QuantityBounds,
    pub finalized: FinalizedCartPolicy,
}
