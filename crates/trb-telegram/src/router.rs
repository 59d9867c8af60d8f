use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use teloxide::prelude::*;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use trb_core::{
    broadcast::Broadcaster,
    config::Config,
    messaging::{
        port::MessagingPort,
        throttled::{ThrottleConfig, ThrottledMessenger},
    },
    store::SubscriberStore,
};

use crate::handlers;
use crate::TelegramMessenger;

/// Everything a request handler needs. Built once in `run_webhook_server`
/// (or a test) and shared through axum's `State`.
pub struct AppState {
    pub cfg: Arc<Config>,
    pub store: Arc<SubscriberStore>,
    pub broadcaster: Arc<Broadcaster>,
}

impl AppState {
    pub fn new(cfg: Arc<Config>, messenger: Arc<dyn MessagingPort>) -> Self {
        Self {
            store: Arc::new(SubscriberStore::new(cfg.subscribers_path.clone())),
            broadcaster: Arc::new(Broadcaster::new(messenger)),
            cfg,
        }
    }
}

/// Routes:
/// - `POST /webhook` -- Telegram update push, always `{"ok": true}`; no body
///   size limit, so a large update is never answered with 413
/// - `GET /tick` -- broadcast the reminder to all subscribers, always 204
/// - `GET /tick_test` -- send the reminder to the admin chat only
/// - `GET /health` -- liveness check
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/webhook",
            post(handlers::webhook).layer(DefaultBodyLimit::disable()),
        )
        .route("/tick", get(handlers::tick))
        .route("/tick_test", get(handlers::tick_test))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_webhook_server(cfg: Arc<Config>) -> anyhow::Result<()> {
    let telegram = TelegramMessenger::new(cfg.bot_token.clone(), cfg.send_timeout)?;

    // Basic startup info; a bad token shows up here first.
    match telegram.bot().get_me().await {
        Ok(me) => tracing::info!(username = %me.username(), "trb started"),
        Err(e) => tracing::warn!(error = %e, "getMe failed; check BOT_TOKEN"),
    }

    let raw_messenger: Arc<dyn MessagingPort> = Arc::new(telegram);
    let messenger: Arc<dyn MessagingPort> = if cfg.throttle_enabled {
        Arc::new(ThrottledMessenger::new(
            raw_messenger,
            ThrottleConfig::default(),
        ))
    } else {
        raw_messenger
    };

    let state = Arc::new(AppState::new(cfg.clone(), messenger));
    let path = state.store.path().display().to_string();
    match state.store.try_load().await {
        Ok(ids) => tracing::info!(
            %path,
            subscribers = ids.len(),
            admin_configured = cfg.admin_chat_id.is_some(),
            "subscriber store ready"
        ),
        // Not fatal: reads treat it as empty and the next /start rewrites it.
        Err(e) => tracing::warn!(
            %path,
            error = %e,
            admin_configured = cfg.admin_chat_id.is_some(),
            "subscriber file unreadable; starting with an empty set"
        ),
    }

    let addr = cfg.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("bind failed on {addr}: {e}"))?;
    tracing::info!(%addr, "listening for webhook and tick requests");

    axum::serve(listener, build_router(state))
        .await
        .map_err(|e| anyhow::anyhow!("serve error: {e}"))?;

    Ok(())
}
