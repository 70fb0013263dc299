// SPDX-FileCopyrightText: 2026 Forecourt Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Route groups:
//! - `/health` -- unauthenticated liveness probe
//! - `/notifications/send`, `/notifications/pending` -- operator API
//!   behind bearer auth
//! - `/notifications/webhook/*` -- provider callbacks, authenticated by
//!   request signature rather than bearer token

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use forecourt_config::ForecourtConfig;
use forecourt_core::ForecourtError;
use forecourt_dispatch::Dispatcher;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{auth_middleware, AuthConfig};
use crate::handlers;
use crate::webhook;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub dispatcher: Arc<Dispatcher>,
    pub config: Arc<ForecourtConfig>,
}

/// Assemble the full router. Separated from [`serve`] so tests can drive
/// it with `tower::ServiceExt::oneshot` without binding a socket.
pub fn build_router(state: GatewayState) -> Router {
    let auth_state = AuthConfig {
        bearer_token: state.config.gateway.bearer_token.clone(),
    };

    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/notifications/send", post(handlers::post_send))
        .route("/notifications/pending", get(handlers::get_pending))
        .route_layer(axum_middleware::from_fn_with_state(
            auth_state,
            auth_middleware,
        ))
        .with_state(state.clone());

    let webhook_routes = Router::new()
        .route("/notifications/webhook/status", post(webhook::post_status))
        .route("/notifications/webhook/inbound", post(webhook::post_inbound))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .merge(webhook_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve until the shutdown token fires.
pub async fn serve(state: GatewayState, shutdown: CancellationToken) -> Result<(), ForecourtError> {
    let addr = format!(
        "{}:{}",
        state.config.gateway.host, state.config.gateway.port
    );
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
        ForecourtError::Internal(format!("failed to bind gateway to {addr}: {e}"))
    })?;

    tracing::info!(%addr, "gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| ForecourtError::Internal(format!("gateway server error: {e}")))?;

    Ok(())
}
