//! Catalog item endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use domain::{ItemUpdateRequest, NewItemRequest};
use serde::Deserialize;
use store::{Item, MarketplaceStore};

use crate::error::ApiError;
use crate::extract::{ApiForm, ApiQuery};
use crate::session::CurrentSession;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
}

/// POST /new/item: list an item sold by the caller.
#[tracing::instrument(skip_all)]
pub async fn create<S: MarketplaceStore>(
    State(state): State<Arc<AppState<S>>>,
    CurrentSession(session): CurrentSession,
    ApiForm(req): ApiForm<NewItemRequest>,
) -> Result<Json<Item>, ApiError> {
    let item = state.catalog.create_item(session.as_ref(), req).await?;
    Ok(Json(item))
}

/// POST /update/item/{id}: change fields of an item the caller sells.
#[tracing::instrument(skip(state, session, req))]
pub async fn update<S: MarketplaceStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    CurrentSession(session): CurrentSession,
    ApiForm(req): ApiForm<ItemUpdateRequest>,
) -> Result<Json<Item>, ApiError> {
    let item = state
        .catalog
        .update_item(session.as_ref(), &id, req)
        .await?;
    Ok(Json(item))
}

/// GET /list/items: items whose title contains `search`.
#[tracing::instrument(skip(state))]
pub async fn list<S: MarketplaceStore>(
    State(state): State<Arc<AppState<S>>>,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> Result<Json<Vec<Item>>, ApiError> {
    let items = state.catalog.search(query.search.as_deref()).await?;
    Ok(Json(items))
}
