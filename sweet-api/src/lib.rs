use axum::{
    extract::State,
    http::Method,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod error;
pub mod middleware;
pub mod notifications;
pub mod payments;
pub mod state;
pub mod webhooks;

pub use state::{AppState, AuthConfig};

pub fn app(state: AppState) -> Router {
    // CORS Middleware
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::HeaderName::from_static(webhooks::SIGNATURE_HEADER),
        ]);

    Router::new()
        .route("/health", get(health))
        .merge(webhooks::routes())
        .merge(payments::routes())
        .merge(notifications::routes(state.clone()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health
async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "payments": state.payments.is_some(),
        "webhooks": state.webhooks.is_some() && state.signature.is_some(),
    }))
}
