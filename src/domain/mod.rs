//! Domain model: catalog, carts and orders
pub mod aggregates;
pub mod events;
pub mod value_objects;
