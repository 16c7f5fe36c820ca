//! HTTP endpoint receiving deletion notifications.
//!
//! `POST /v1/events` queues a notification for the next pass;
//! `GET /health` answers liveness checks.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::SyncResult;
use crate::events::{EventQueue, Notification};

/// Builds the listener routes over `queue`.
pub fn router(queue: Arc<EventQueue>) -> Router {
    Router::new()
        .route("/v1/events", post(events_handler))
        .route("/health", get(health_handler))
        .with_state(queue)
}

/// Binds `addr`, then serves on a background task.
///
/// A bind failure is returned to the caller instead of ending the task.
pub async fn spawn(addr: SocketAddr, queue: Arc<EventQueue>) -> SyncResult<JoinHandle<()>> {
    let listener = TcpListener::bind(addr).await?;
    Ok(tokio::spawn(async move {
        if let Err(e) = serve_on(listener, queue).await {
            error!(error = %e, "Event listener stopped");
        }
    }))
}

/// Serves on an already bound listener.
pub async fn serve_on(listener: TcpListener, queue: Arc<EventQueue>) -> SyncResult<()> {
    info!(addr = ?listener.local_addr().ok(), "Event listener started");
    axum::serve(listener, router(queue)).await?;
    Ok(())
}

async fn events_handler(
    State(queue): State<Arc<EventQueue>>,
    Json(notification): Json<Notification>,
) -> impl IntoResponse {
    if !notification.is_known() {
        warn!(event_type = %notification.event_type, "Rejecting unknown event type");
        return (StatusCode::BAD_REQUEST, "unknown event_type");
    }
    queue.enqueue(notification);
    (StatusCode::ACCEPTED, "queued")
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
