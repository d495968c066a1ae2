use axum::{extract::{rejection::JsonRejection, State}, http::StatusCode, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::aggregates::{CartLine, CartView};
use crate::routes::extract::{AppJson, AppPath};
use crate::routes::{ApiError, AppState};
use crate::services::{ItemUpdate, RemovedItem};
use crate::store::CommerceStore;

#[derive(Debug, Default, Deserialize)]
pub struct CreateCartRequest { pub owner_id: Option<String> }

#[derive(Debug, Deserialize)]
pub struct AddItemRequest { pub coffee_id: Uuid, pub quantity: u32 }

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest { pub quantity: u32 }

/// Body is optional; without an owner a fresh anonymous cart is created.
/// A body that is sent must still be valid JSON.
pub async fn create<S: CommerceStore>(State(s): State<AppState<S>>, body: Result<Json<CreateCartRequest>, JsonRejection>) -> Result<(StatusCode, Json<CartView>), ApiError> {
    let req = match body {
        Ok(Json(req)) => req,
        Err(JsonRejection::MissingJsonContentType(_)) => CreateCartRequest::default(),
        Err(rejection) => return Err(rejection.into()),
    };
    let cart = s.carts.get_or_create_cart(req.owner_id.as_deref()).await?;
    Ok((StatusCode::CREATED, Json(cart)))
}

pub async fn get<S: CommerceStore>(State(s): State<AppState<S>>, AppPath(cart_id): AppPath<Uuid>) -> Result<Json<CartView>, ApiError> {
    Ok(Json(s.carts.get_cart(cart_id).await?))
}

pub async fn add_item<S: CommerceStore>(State(s): State<AppState<S>>, AppPath(cart_id): AppPath<Uuid>, AppJson(req): AppJson<AddItemRequest>) -> Result<(StatusCode, Json<CartLine>), ApiError> {
    let line = s.carts.add_item(cart_id, req.coffee_id, req.quantity).await?;
    Ok((StatusCode::CREATED, Json(line)))
}

pub async fn update_item<S: CommerceStore>(State(s): State<AppState<S>>, AppPath((cart_id, item_id)): AppPath<(Uuid, Uuid)>, AppJson(req): AppJson<UpdateItemRequest>) -> Result<Json<ItemUpdate>, ApiError> {
    Ok(Json(s.carts.update_item(cart_id, item_id, req.quantity).await?))
}

pub async fn remove_item<S: CommerceStore>(State(s): State<AppState<S>>, AppPath((cart_id, item_id)): AppPath<(Uuid, Uuid)>) -> Result<Json<RemovedItem>, ApiError> {
    Ok(Json(s.carts.remove_item(cart_id, item_id).await?))
}
