//! Postgres store behaviour. Needs a live server:
//! `DATABASE_URL=postgres://... cargo test --features postgres-tests`.
#![cfg(feature = "postgres-tests")]

use std::sync::Arc;

use coffee_commerce::domain::aggregates::{Cart, CoffeeQuery, NewCoffee};
use coffee_commerce::domain::value_objects::{Money, QuantityBounds};
use coffee_commerce::publisher::EventPublisher;
use coffee_commerce::services::{CartPolicy, CartService, CatalogService, CheckoutRequest, CheckoutService};
use coffee_commerce::store::{CatalogStore, CommerceStore, PgStore, StoreTx};
use coffee_commerce::CommerceError;
use rust_decimal::Decimal;
use sqlx::PgPool;

fn new_coffee(name: &str, cents: i64, tags: &[&str]) -> NewCoffee {
    NewCoffee {
        name: name.into(),
        description: format!("{name} from the house"),
        price: Money::new(Decimal::new(cents, 2)),
        image_url: "https://example.com/coffee.jpg".into(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn test_coffee_round_trip_and_search(pool: PgPool) {
    let catalog = CatalogService::new(Arc::new(PgStore::new(pool)));
    let espresso = catalog.create(new_coffee("Espresso", 450, &["intenso", "classic"])).await.unwrap();
    catalog.create(new_coffee("Espresso Doppio", 550, &["intenso"])).await.unwrap();
    catalog.create(new_coffee("Latte", 600, &["milk"])).await.unwrap();

    let stored = catalog.get(espresso.id).await.unwrap();
    assert_eq!(stored.price.to_string(), "4.50");
    assert_eq!(stored.tags.len(), 2);

    let by_name = catalog
        .search(CoffeeQuery { name: Some("ESPRESSO".into()), limit: 1, ..Default::default() })
        .await
        .unwrap();
    assert_eq!(by_name.data.len(), 1);
    assert_eq!(by_name.pagination.total, 2);
    assert!(by_name.pagination.has_more);

    let by_tag = catalog.search(CoffeeQuery { tags: vec!["MILK".into()], ..Default::default() }).await.unwrap();
    assert_eq!(by_tag.data.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(), vec!["Latte"]);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_referenced_coffee_cannot_be_deleted(pool: PgPool) {
    let store = Arc::new(PgStore::new(pool));
    let catalog = CatalogService::new(store.clone());
    let carts = CartService::new(store.clone(), CartPolicy::default(), EventPublisher::disabled());
    let coffee = catalog.create(new_coffee("Mocha", 500, &[])).await.unwrap();
    let cart = carts.get_or_create_cart(None).await.unwrap().cart;
    carts.add_item(cart.id, coffee.id, 1).await.unwrap();

    assert!(matches!(catalog.delete(coffee.id).await, Err(CommerceError::CoffeeInUse(_))));
    assert!(store.coffee_exists(coffee.id).await.unwrap());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_uncommitted_transaction_rolls_back(pool: PgPool) {
    let store = PgStore::new(pool);
    let cart = Cart::open(None);
    store.insert_cart(&cart).await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let mut locked = tx.lock_cart(cart.id).await.unwrap().unwrap();
    locked.finalize(chrono::Utc::now()).unwrap();
    tx.update_cart(&locked).await.unwrap();
    drop(tx);

    assert!(!store.find_cart(cart.id).await.unwrap().unwrap().is_finalized());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_concurrent_adds_serialize_on_cart_lock(pool: PgPool) {
    let store = Arc::new(PgStore::new(pool));
    let policy = CartPolicy { bounds: QuantityBounds::new(1, 100).unwrap(), ..Default::default() };
    let carts = CartService::new(store.clone(), policy, EventPublisher::disabled());
    let coffee_id = store.insert_coffee(new_coffee("Americano", 300, &[])).await.unwrap().id;
    let cart_id = carts.get_or_create_cart(None).await.unwrap().cart.id;

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let carts = carts.clone();
            tokio::spawn(async move { carts.add_item(cart_id, coffee_id, 1).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let view = carts.get_cart(cart_id).await.unwrap();
    assert_eq!(view.items.len(), 1);
    assert_eq!(view.items[0].item.quantity, 20);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_checkout_persists_order(pool: PgPool) {
    let store = Arc::new(PgStore::new(pool));
    let carts = CartService::new(store.clone(), CartPolicy::default(), EventPublisher::disabled());
    let checkout =
        CheckoutService::new(store.clone(), carts.clone(), Money::new(Decimal::new(1000, 2)), EventPublisher::disabled());
    let espresso = store.insert_coffee(new_coffee("Espresso", 500, &[])).await.unwrap();
    let latte = store.insert_coffee(new_coffee("Latte", 300, &[])).await.unwrap();
    let cart_id = carts.get_or_create_cart(Some("ana")).await.unwrap().cart.id;
    carts.add_item(cart_id, espresso.id, 2).await.unwrap();
    carts.add_item(cart_id, latte.id, 1).await.unwrap();

    let request = CheckoutRequest {
        cart_id,
        delivery_address: "Rua das Flores, 42".into(),
        payment_method: "pix".into(),
    };
    let placed = checkout.create_order(request.clone()).await.unwrap();
    let fetched = checkout.get_order(placed.id).await.unwrap();
    assert_eq!(fetched.total_items, 3);
    assert_eq!(fetched.total.amount(), Decimal::new(2300, 2));
    assert_eq!(fetched.items_total.amount(), Decimal::new(1300, 2));

    assert!(carts.get_cart(cart_id).await.unwrap().cart.is_finalized());
    assert!(matches!(checkout.create_order(request).await, Err(CommerceError::CartFinalized(_))));
}
