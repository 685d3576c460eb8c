//! Entity CRUD routes. Parameterized paths so handlers resolve the entity by path segment.
//! Every matched route requires a valid API token.

use crate::extractors::require_token;
use crate::handlers::entity::{create, delete, list, partial_update, read, update};
use crate::state::AppState;
use axum::{middleware, routing::get, Router};

pub fn entity_routes(state: AppState) -> Router {
    Router::new()
        .route("/:path_segment", get(list).post(create))
        .route(
            "/:path_segment/:id",
            get(read).put(update).patch(partial_update).delete(delete),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token))
        .with_state(state)
}
