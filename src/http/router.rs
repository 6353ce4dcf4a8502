use super::handlers;
use super::AppState;
use crate::ledger::Ledger;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn create_router<L: Ledger + 'static>(state: AppState<L>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/GetAllowance/:owner/:spender",
            get(handlers::get_allowance::<L>),
        )
        .route("/GetBalance/:address", get(handlers::get_balance::<L>))
        .route("/SetApprove", post(handlers::set_approve::<L>))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
