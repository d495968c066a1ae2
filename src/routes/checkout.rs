use axum::{extract::State, http::StatusCode, Json};
use uuid::Uuid;
use validator::Validate;

use crate::domain::aggregates::OrderSummary;
use crate::routes::extract::{AppJson, AppPath};
use crate::routes::{ApiError, AppState};
use crate::services::CheckoutRequest;
use crate::store::CommerceStore;

pub async fn create<S: CommerceStore>(State(s): State<AppState<S>>, AppJson(req): AppJson<CheckoutRequest>) -> Result<(StatusCode, Json<OrderSummary>), ApiError> {
    req.validate()?;
    let summary = s.checkout.create_order(req).await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

pub async fn get<S: CommerceStore>(State(s): State<AppState<S>>, AppPath(order_id): AppPath<Uuid>) -> Result<Json<OrderSummary>, ApiError> {
    Ok(Json(s.checkout.get_order(order_id).await?))
}
