use axum::http::StatusCode;

use trb_core::broadcast::BroadcastReport;

use crate::router::AppState;

pub(crate) async fn broadcast_reminder(state: &AppState) -> BroadcastReport {
    let subscribers = state.store.load().await;
    if subscribers.is_empty() {
        tracing::info!("no subscribers to notify");
        return BroadcastReport::default();
    }

    let report = state
        .broadcaster
        .broadcast(&subscribers, &state.cfg.message_text)
        .await;
    tracing::info!(
        attempted = report.attempted,
        delivered = report.delivered,
        failed = report.failed,
        "reminder broadcast finished"
    );
    report
}

pub(crate) async fn send_test_reminder(state: &AppState) -> StatusCode {
    let Some(admin) = state.cfg.admin_chat_id else {
        tracing::warn!("tick_test called but ADMIN_CHAT_ID is not configured");
        return StatusCode::BAD_REQUEST;
    };

    match state.broadcaster.send(admin, &state.cfg.message_text).await {
        Ok(()) => StatusCode::NO_CONTENT,
        Err(_) => StatusCode::BAD_GATEWAY,
    }
}
