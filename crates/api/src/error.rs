//! API error types with HTTP response mapping.

use axum::extract::rejection::{FormRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{AccountError, CatalogError, OrderError};
use thiserror::Error;

/// Message shown to clients when the failure is ours, not theirs.
const GENERIC_FAILURE: &str = "An error has occurred";

/// API-level error type that maps to HTTP responses.
///
/// Every variant renders as `{"error": "<message>"}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Account(#[from] AccountError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// The form body could not be read or decoded.
    #[error(transparent)]
    Form(#[from] FormRejection),

    /// The query string could not be decoded.
    #[error(transparent)]
    Query(#[from] QueryRejection),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Order(err) => order_error_to_response(err),
            ApiError::Account(err) => account_error_to_response(err),
            ApiError::Catalog(err) => catalog_error_to_response(err),
            ApiError::Form(rejection) => {
                tracing::debug!(error = %rejection, "rejected form body");
                (StatusCode::INTERNAL_SERVER_ERROR, rejection.body_text())
            }
            ApiError::Query(rejection) => {
                tracing::debug!(error = %rejection, "rejected query string");
                (StatusCode::INTERNAL_SERVER_ERROR, rejection.body_text())
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn order_error_to_response(err: OrderError) -> (StatusCode, String) {
    match &err {
        OrderError::Unauthenticated => (StatusCode::UNAUTHORIZED, err.to_string()),
        OrderError::PersistenceFailure(source) => {
            tracing::error!(error = %source, "order persistence failed");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
        _ => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

fn account_error_to_response(err: AccountError) -> (StatusCode, String) {
    match &err {
        AccountError::Unauthenticated => (StatusCode::UNAUTHORIZED, err.to_string()),
        AccountError::Store(_) | AccountError::PasswordHash | AccountError::TokenGeneration => {
            tracing::error!(error = %err, "account operation failed");
            (StatusCode::INTERNAL_SERVER_ERROR, GENERIC_FAILURE.to_string())
        }
        _ => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

fn catalog_error_to_response(err: CatalogError) -> (StatusCode, String) {
    match &err {
        CatalogError::Unauthenticated => (StatusCode::UNAUTHORIZED, err.to_string()),
        CatalogError::NotOwner => (StatusCode::FORBIDDEN, err.to_string()),
        CatalogError::Conflict(_) => (StatusCode::CONFLICT, err.to_string()),
        CatalogError::Store(_) => {
            tracing::error!(error = %err, "catalog operation failed");
            (StatusCode::INTERNAL_SERVER_ERROR, GENERIC_FAILURE.to_string())
        }
        _ => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}
