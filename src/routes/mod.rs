//! HTTP surface under `/api/v1`.

pub mod carts;
pub mod checkout;
pub mod coffees;
pub mod error;
pub mod extract;

use std::sync::Arc;

use axum::{routing::{get, patch, post}, Json, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;
use crate::publisher::EventPublisher;
use crate::services::{CartService, CatalogService, CheckoutService};
use crate::store::CommerceStore;

pub use error::ApiError;

pub struct AppState<S> {
    pub carts: CartService<S>,
    pub checkout: CheckoutService<S>,
    pub catalog: CatalogService<S>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self { carts: self.carts.clone(), checkout: self.checkout.clone(), catalog: self.catalog.clone() }
    }
}

impl<S: CommerceStore> AppState<S> {
    /// Wires every service over one shared store.
    pub fn new(store: Arc<S>, config: &Config, events: EventPublisher) -> Self {
        let carts = CartService::new(store.clone(), config.cart, events.clone());
        let checkout = CheckoutService::new(store.clone(), carts.clone(), config.shipping_fee, events);
        Self { carts, checkout, catalog: CatalogService::new(store) }
    }
}

pub fn router<S: CommerceStore + 'static>(state: AppState<S>) -> Router {
    let api = Router::new()
        .route("/carts", post(carts::create::<S>))
        .route("/carts/:cart_id", get(carts::get::<S>))
        .route("/carts/:cart_id/items", post(carts::add_item::<S>))
        .route("/carts/:cart_id/items/:item_id", patch(carts::update_item::<S>).delete(carts::remove_item::<S>))
        .route("/checkout", post(checkout::create::<S>))
        .route("/orders/:order_id", get(checkout::get::<S>))
        .route("/coffees", get(coffees::list::<S>).post(coffees::create::<S>))
        .route("/coffees/search", get(coffees::search::<S>))
        .route("/coffees/:coffee_id", get(coffees::get::<S>).patch(coffees::update::<S>).delete(coffees::delete::<S>))
        .with_state(state);

    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "coffee-commerce"})) }))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
