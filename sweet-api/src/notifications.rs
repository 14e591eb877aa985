use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Extension, Json, Router,
};
use futures_util::{Stream, StreamExt};
use serde_json::{json, Value};
use std::convert::Infallible;
use sweet_core::repository::NotificationRepository;
use tokio_stream::wrappers::BroadcastStream;

use crate::error::AppError;
use crate::middleware::{customer_auth_middleware, CustomerClaims};
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/notifications", get(list_notifications).delete(clear_notifications))
        .route("/v1/notifications/stream", get(stream_notifications))
        .layer(middleware::from_fn_with_state(state, customer_auth_middleware))
}

/// GET /v1/notifications
/// Newest first, at most ten.
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
) -> Result<Json<Value>, AppError> {
    let notifications = state.notifier.feed().recent(&claims.sub).await?;
    Ok(Json(json!({ "data": notifications })))
}

/// DELETE /v1/notifications
pub async fn clear_notifications(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
) -> Result<StatusCode, AppError> {
    state.notifier.feed().clear(&claims.sub).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /v1/notifications/stream
/// Live notifications for the caller as server-sent events.
pub async fn stream_notifications(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let user_id = claims.sub;
    let rx = state.notifier.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(move |result| {
        let user_id = user_id.clone();
        async move {
            match result {
                Ok(notification) if notification.user_id == user_id => {
                    match Event::default().event("notification").json_data(&notification) {
                        Ok(event) => Some(Ok(event)),
                        Err(e) => {
                            tracing::warn!("Failed to encode notification {}: {}", notification.id, e);
                            None
                        }
                    }
                }
                Ok(_) => None,
                Err(e) => {
                    tracing::warn!("Notification stream lagged for {}: {}", user_id, e);
                    None
                }
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
