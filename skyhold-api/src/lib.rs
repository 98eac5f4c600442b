use axum::{
    extract::State,
    http::Method,
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod admin;
pub mod demo;
pub mod documents;
pub mod error;
pub mod flights;
pub mod middleware;
pub mod reservations;
pub mod state;
pub mod tickets;
pub mod worker;

pub use state::{AppState, AuthConfig, Backends};

use middleware::{admin_auth_middleware, customer_auth_middleware, rate_limit_middleware};

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    let customer = Router::new()
        .merge(reservations::routes())
        .merge(tickets::customer_routes())
        .route_layer(from_fn_with_state(state.clone(), customer_auth_middleware));

    let admin = admin::routes().route_layer(from_fn_with_state(state.clone(), admin_auth_middleware));

    Router::new()
        .route("/health", get(health))
        .merge(flights::routes())
        .merge(tickets::public_routes())
        .merge(customer)
        .merge(admin)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(from_fn_with_state(state.clone(), rate_limit_middleware))
        .with_state(state)
}

/// GET /health
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let redis = match &state.redis {
        None => "disabled",
        Some(client) => match client.ping().await {
            Ok(()) => "ok",
            Err(_) => "unreachable",
        },
    };
    Json(json!({ "status": "ok", "redis": redis }))
}
