//! Aggregates module
pub mod coffee;
pub mod order;
pub mod cart;

pub use coffee::{Coffee, CoffeeChanges, CoffeeQuery, CoffeeSummary, NewCoffee, Page, Pagination, Tag};
pub use order::{CheckoutTotals, Order, OrderLine, OrderStatus, OrderSummary};
pub use cart::{Cart, CartLine, CartStatus, CartView, LineItem, PaymentStatus};
