//! Order placement and transaction listing endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use domain::{OrderError, OrderOutcome, OrderRequest};
use serde::Serialize;
use store::{MarketplaceStore, Transaction};

use crate::error::ApiError;
use crate::extract::ApiForm;
use crate::session::CurrentSession;
use crate::state::AppState;

/// Soft failure body for an order that reserved nothing.
#[derive(Serialize)]
pub struct NoStockResponse {
    pub error: &'static str,
}

/// POST /new/order: reserve stock for a cart and record the transaction.
#[tracing::instrument(skip_all)]
pub async fn create<S: MarketplaceStore>(
    State(state): State<Arc<AppState<S>>>,
    CurrentSession(session): CurrentSession,
    ApiForm(req): ApiForm<OrderRequest>,
) -> Result<Response, ApiError> {
    let outcome = state.orders.place_order(session.as_ref(), req).await?;

    let response = match outcome {
        OrderOutcome::Placed(transaction) => Json(transaction).into_response(),
        OrderOutcome::NoStockAvailable => Json(NoStockResponse {
            error: "No more stock available",
        })
        .into_response(),
    };
    Ok(response)
}

/// GET /list/transaction: the caller's transactions, newest first.
#[tracing::instrument(skip_all)]
pub async fn list<S: MarketplaceStore>(
    State(state): State<Arc<AppState<S>>>,
    CurrentSession(session): CurrentSession,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    let session = session.ok_or(OrderError::Unauthenticated)?;
    let transactions = state.orders.transactions_for(&session).await?;
    Ok(Json(transactions))
}
