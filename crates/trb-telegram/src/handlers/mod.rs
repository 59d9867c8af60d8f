//! HTTP endpoint handlers.
//!
//! Every endpoint is deliberately quiet about internal failures: Telegram
//! only needs a prompt acknowledgment, and the external scheduler that calls
//! `/tick` treats error statuses as job failures and may disable the job.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::router::AppState;

mod commands;
mod tick;

pub use commands::{handle_update, CommandKind};

/// `POST /webhook`
pub async fn webhook(State(state): State<Arc<AppState>>, body: Bytes) -> Json<Value> {
    match serde_json::from_slice::<Value>(&body) {
        Ok(update) => {
            handle_update(&state, &update).await;
        }
        Err(e) => tracing::warn!(error = %e, "ignoring malformed webhook body"),
    }
    Json(json!({ "ok": true }))
}

/// `GET /tick`
pub async fn tick(State(state): State<Arc<AppState>>) -> StatusCode {
    tick::broadcast_reminder(&state).await;
    StatusCode::NO_CONTENT
}

/// `GET /tick_test`
pub async fn tick_test(State(state): State<Arc<AppState>>) -> StatusCode {
    tick::send_test_reminder(&state).await
}

/// `GET /health`
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
