use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use serde_json::json;

use super::domain::ListingId;
use super::lifecycle::{LifecycleError, Operation, TransitionOutcome};
use super::repository::{ListingRepository, ListingView, RepositoryError};
use super::service::{ListingDraft, ListingService, ListingServiceError};

/// Router builder exposing listing creation, lookup, and lifecycle operations.
pub fn listing_router<R>(service: Arc<ListingService<R>>) -> Router
where
    R: ListingRepository + 'static,
{
    Router::new()
        .route(
            "/api/v1/listings",
            post(create_handler::<R>).get(list_handler::<R>),
        )
        .route("/api/v1/listings/:listing_id", get(get_handler::<R>))
        .route(
            "/api/v1/listings/:listing_id/:operation",
            post(operation_handler::<R>),
        )
        .with_state(service)
}

#[derive(Debug, Serialize)]
pub struct TransitionResponse {
    pub listing: ListingView,
    pub outcome: TransitionOutcome,
}

pub(crate) async fn create_handler<R>(
    State(service): State<Arc<ListingService<R>>>,
    axum::Json(draft): axum::Json<ListingDraft>,
) -> Response
where
    R: ListingRepository + 'static,
{
    match service.create(draft) {
        Ok(listing) => {
            let view = ListingView::from(&listing);
            (StatusCode::CREATED, axum::Json(view)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn list_handler<R>(State(service): State<Arc<ListingService<R>>>) -> Response
where
    R: ListingRepository + 'static,
{
    match service.list() {
        Ok(listings) => {
            let views: Vec<ListingView> = listings.iter().map(ListingView::from).collect();
            (StatusCode::OK, axum::Json(views)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn get_handler<R>(
    State(service): State<Arc<ListingService<R>>>,
    Path(listing_id): Path<String>,
) -> Response
where
    R: ListingRepository + 'static,
{
    match service.get(&ListingId(listing_id)) {
        Ok(listing) => (StatusCode::OK, axum::Json(ListingView::from(&listing))).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn operation_handler<R>(
    State(service): State<Arc<ListingService<R>>>,
    Path((listing_id, operation)): Path<(String, String)>,
) -> Response
where
    R: ListingRepository + 'static,
{
    let operation: Operation = match operation.parse() {
        Ok(operation) => operation,
        Err(error) => {
            let payload = json!({ "error": error.to_string() });
            return (StatusCode::NOT_FOUND, axum::Json(payload)).into_response();
        }
    };

    match service.apply(&ListingId(listing_id), operation) {
        Ok((listing, outcome)) => {
            let body = TransitionResponse {
                listing: ListingView::from(&listing),
                outcome,
            };
            (StatusCode::OK, axum::Json(body)).into_response()
        }
        Err(error) => error_response(error),
    }
}

fn error_response(error: ListingServiceError) -> Response {
    let message = error.to_string();
    let (status, payload) = match error {
        ListingServiceError::Validation(_)
        | ListingServiceError::Lifecycle(LifecycleError::Validation(_)) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({ "error": message }),
        ),
        ListingServiceError::Lifecycle(LifecycleError::InvalidTransition { operation, state }) => (
            StatusCode::CONFLICT,
            json!({
                "error": message,
                "operation": operation,
                "state": state,
                "allowed_operations": state.allowed_operations(),
            }),
        ),
        ListingServiceError::Lifecycle(LifecycleError::Observer { outcome, .. }) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({
                "error": message,
                "committed": true,
                "persisted": true,
                "state": outcome.to,
                "outcome": outcome,
            }),
        ),
        ListingServiceError::Persistence { outcome, .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({
                "error": message,
                "committed": true,
                "persisted": false,
                "state": outcome.to,
                "outcome": outcome,
            }),
        ),
        ListingServiceError::Repository(RepositoryError::NotFound) => {
            (StatusCode::NOT_FOUND, json!({ "error": message }))
        }
        ListingServiceError::Repository(RepositoryError::Conflict) => {
            (StatusCode::CONFLICT, json!({ "error": message }))
        }
        ListingServiceError::Repository(RepositoryError::Unavailable(_)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": message }),
        ),
    };

    (status, axum::Json(payload)).into_response()
}
