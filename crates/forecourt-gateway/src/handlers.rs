// SPDX-FileCopyrightText: 2026 Forecourt Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operator API handlers: send requests, queue visibility, health.

use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use forecourt_core::types::{Channel, MessageType};
use forecourt_core::ForecourtError;
use forecourt_dispatch::{SendOutcome, SendRequest};
use forecourt_storage::queries::queue;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::server::GatewayState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SendApiRequest {
    pub recipient: String,
    pub message_type: MessageType,
    #[serde(default)]
    pub variables: HashMap<String, String>,
    #[serde(default)]
    pub channel_preference: Option<Channel>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub vehicle_reg: Option<String>,
    /// ISO 8601; a future value defers the send.
    #[serde(default)]
    pub scheduled_at: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendApiResponse {
    pub message_id: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: &'static str,
    pub message: String,
}

fn error_response(err: ForecourtError) -> Response {
    let (status, kind) = match &err {
        ForecourtError::MalformedNumber { .. } => (StatusCode::BAD_REQUEST, "malformed_number"),
        ForecourtError::MissingVariable { .. } => (StatusCode::BAD_REQUEST, "missing_variable"),
        ForecourtError::ConsentBlocked { .. } => (StatusCode::FORBIDDEN, "consent_blocked"),
        ForecourtError::Internal(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
        _ => {
            error!(error = %err, "send request failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal")
        }
    };
    (
        status,
        Json(ApiError {
            error: kind,
            message: err.to_string(),
        }),
    )
        .into_response()
}

/// `POST /notifications/send`. Returns 202 once the message is accepted
/// into `queued` or the verification queue; callers never wait for the
/// provider round trip.
pub async fn post_send(
    State(state): State<GatewayState>,
    Json(body): Json<SendApiRequest>,
) -> Response {
    let request = SendRequest {
        recipient: body.recipient,
        message_type: body.message_type,
        variables: body.variables,
        channel_preference: body.channel_preference,
        customer_id: body.customer_id,
        vehicle_reg: body.vehicle_reg,
        scheduled_at: body.scheduled_at,
    };

    match state.dispatcher.submit(request).await {
        Ok(SendOutcome::Queued { message_id }) => {
            let dispatcher = state.dispatcher.clone();
            let id = message_id.clone();
            tokio::spawn(async move {
                if let Err(e) = dispatcher.dispatch(&id).await {
                    error!(message_id = %id, error = %e, "background dispatch failed");
                }
            });
            (
                StatusCode::ACCEPTED,
                Json(SendApiResponse {
                    message_id,
                    status: "queued".to_string(),
                }),
            )
                .into_response()
        }
        Ok(SendOutcome::Held { message_id, reason }) => (
            StatusCode::ACCEPTED,
            Json(SendApiResponse {
                message_id,
                status: format!("held:{reason}"),
            }),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

#[derive(Debug, Deserialize)]
pub struct PendingQuery {
    #[serde(default = "default_pending_limit")]
    pub limit: u32,
}

fn default_pending_limit() -> u32 {
    50
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingEntry {
    pub message_id: String,
    pub reason: String,
    pub recheck_at: String,
    pub created_at: String,
}

/// `GET /notifications/pending?limit=N`. Operator visibility into the
/// verification queue.
pub async fn get_pending(
    State(state): State<GatewayState>,
    Query(params): Query<PendingQuery>,
) -> Response {
    match queue::list_pending(state.dispatcher.database(), params.limit).await {
        Ok(entries) => {
            let out: Vec<PendingEntry> = entries
                .into_iter()
                .map(|e| PendingEntry {
                    message_id: e.message_id,
                    reason: e.reason.to_string(),
                    recheck_at: e.recheck_at,
                    created_at: e.created_at,
                })
                .collect();
            Json(out).into_response()
        }
        Err(e) => {
            error!(error = %e, "failed to list pending queue entries");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// `GET /health`. Unauthenticated liveness probe.
pub async fn get_health(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": state.config.service.name,
    }))
}
