use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::aggregates::{Coffee, CoffeeChanges, CoffeeQuery, NewCoffee, Page};
use crate::routes::extract::{AppJson, AppPath, AppQuery};
use crate::routes::{ApiError, AppState};
use crate::store::CommerceStore;

/// Query string for `GET /coffees/search`; `tags` is comma separated.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub name: Option<String>,
    pub tags: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl From<SearchParams> for CoffeeQuery {
    fn from(p: SearchParams) -> Self {
        let tags = p.tags.map(|raw| raw.split(',').map(str::trim).filter(|t| !t.is_empty()).map(str::to_owned).collect()).unwrap_or_default();
        Self {
            name: p.name.filter(|n| !n.trim().is_empty()),
            tags,
            start_date: p.start_date,
            end_date: p.end_date,
            limit: p.limit.unwrap_or(CoffeeQuery::DEFAULT_LIMIT),
            offset: p.offset.unwrap_or(0),
        }
    }
}

pub async fn list<S: CommerceStore>(State(s): State<AppState<S>>) -> Result<Json<Vec<Coffee>>, ApiError> {
    Ok(Json(s.catalog.list().await?))
}

pub async fn get<S: CommerceStore>(State(s): State<AppState<S>>, AppPath(coffee_id): AppPath<Uuid>) -> Result<Json<Coffee>, ApiError> {
    Ok(Json(s.catalog.get(coffee_id).await?))
}

pub async fn create<S: CommerceStore>(State(s): State<AppState<S>>, AppJson(req): AppJson<NewCoffee>) -> Result<(StatusCode, Json<Coffee>), ApiError> {
    Ok((StatusCode::CREATED, Json(s.catalog.create(req).await?)))
}

pub async fn update<S: CommerceStore>(State(s): State<AppState<S>>, AppPath(coffee_id): AppPath<Uuid>, AppJson(req): AppJson<CoffeeChanges>) -> Result<Json<Coffee>, ApiError> {
    Ok(Json(s.catalog.update(coffee_id, req).await?))
}

pub async fn delete<S: CommerceStore>(State(s): State<AppState<S>>, AppPath(coffee_id): AppPath<Uuid>) -> Result<StatusCode, ApiError> {
    s.catalog.delete(coffee_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn search<S: CommerceStore>(State(s): State<AppState<S>>, AppQuery(p): AppQuery<SearchParams>) -> Result<Json<Page<Coffee>>, ApiError> {
    Ok(Json(s.catalog.search(p.into()).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_params_split_tags() {
        let params = SearchParams { tags: Some("Intenso, frutado,,".into()), name: Some("  ".into()), ..Default::default() };
        let query = CoffeeQuery::from(params);
        assert_eq!(query.tags, vec!["Intenso".to_string(), "frutado".to_string()]);
        assert!(query.name.is_none());
        assert_eq!(query.limit, CoffeeQuery::DEFAULT_LIMIT);
    }
}
