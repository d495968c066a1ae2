//! Extractors whose rejections render as `ApiError`, so malformed bodies,
//! paths and query strings get the same JSON error shape as everything else.

use axum::extract::{FromRequest, FromRequestParts};

use crate::routes::ApiError;

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct AppPath<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct AppQuery<T>(pub T);
