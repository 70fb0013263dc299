// SPDX-FileCopyrightText: 2026 Forecourt Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider webhook endpoints.
//!
//! Callbacks are authenticated by recomputing the provider's request
//! signature over the canonical URL plus sorted form parameters. A
//! mismatch is `403` in production; in development it is accepted with a
//! warning so replayed callbacks work against local instances.
//!
//! The status endpoint always answers `200` for well-signed requests --
//! including unknown SIDs and duplicate callbacks -- so the provider
//! stops redelivering.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Form,
};
use forecourt_config::Environment;
use forecourt_core::types::{AuditActor, MessageStatus};
use forecourt_core::ContactNormalizer;
use forecourt_storage::queries::{audit, messages};
use forecourt_twilio::validate_signature;
use regex::Regex;
use tracing::{info, warn};

use crate::server::GatewayState;

const SIGNATURE_HEADER: &str = "x-twilio-signature";

fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Reconstruct the URL the provider signed. Signatures are computed
/// against the externally visible address, not the bind address.
fn canonical_url(state: &GatewayState, path: &str) -> String {
    match &state.config.gateway.public_url {
        Some(base) => format!("{}{path}", base.trim_end_matches('/')),
        None => format!(
            "http://{}:{}{path}",
            state.config.gateway.host, state.config.gateway.port
        ),
    }
}

/// Check the signature; returns `None` to proceed or a `403` response.
fn check_signature(
    state: &GatewayState,
    headers: &HeaderMap,
    path: &str,
    params: &[(String, String)],
) -> Option<Response> {
    let Some(auth_token) = state.config.twilio.auth_token.as_deref() else {
        warn!("no auth token configured, skipping webhook signature check");
        return None;
    };

    let presented = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let url = canonical_url(state, path);
    if validate_signature(auth_token, &url, params, presented) {
        return None;
    }

    if state.config.service.environment == Environment::Production {
        warn!(path, "webhook signature mismatch, rejecting");
        Some(StatusCode::FORBIDDEN.into_response())
    } else {
        warn!(path, "webhook signature mismatch, accepting outside production");
        None
    }
}

/// `POST /notifications/webhook/status` -- delivery status callbacks.
pub async fn post_status(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Form(params): Form<Vec<(String, String)>>,
) -> Response {
    if let Some(rejection) =
        check_signature(&state, &headers, "/notifications/webhook/status", &params)
    {
        return rejection;
    }

    let Some(sid) = param(&params, "MessageSid").or_else(|| param(&params, "SmsSid")) else {
        warn!("status callback without a message sid");
        return StatusCode::OK.into_response();
    };
    let Some(raw_status) =
        param(&params, "MessageStatus").or_else(|| param(&params, "SmsStatus"))
    else {
        warn!(sid, "status callback without a status field");
        return StatusCode::OK.into_response();
    };
    let price = param(&params, "Price").and_then(|p| p.parse::<f64>().ok().map(f64::abs));

    match forecourt_dispatch::apply_status_update(
        state.dispatcher.database(),
        sid,
        raw_status,
        price,
    )
    .await
    {
        Ok(_) => StatusCode::OK.into_response(),
        Err(e) => {
            warn!(sid, error = %e, "failed to apply status callback");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// `POST /notifications/webhook/inbound` -- verification-code capture
/// from inbound SMS bodies, DTMF digits, or call transcriptions.
pub async fn post_inbound(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Form(params): Form<Vec<(String, String)>>,
) -> Response {
    if let Some(rejection) =
        check_signature(&state, &headers, "/notifications/webhook/inbound", &params)
    {
        return rejection;
    }

    let Some(from) = param(&params, "From") else {
        warn!("inbound callback without a From field");
        return StatusCode::OK.into_response();
    };
    let text = param(&params, "Body")
        .or_else(|| param(&params, "Digits"))
        .or_else(|| param(&params, "TranscriptionText"))
        .unwrap_or("");

    let Some(code) = extract_code(text) else {
        info!(from, "inbound callback without a verification code");
        return StatusCode::OK.into_response();
    };

    let normalizer = ContactNormalizer::new(state.config.contact.default_country_code.clone());
    let sender = match normalizer.normalize(from.trim_start_matches("whatsapp:")) {
        Ok(s) => s,
        Err(e) => {
            warn!(from, error = %e, "inbound sender failed normalization");
            return StatusCode::OK.into_response();
        }
    };

    let db = state.dispatcher.database();
    let sid = param(&params, "MessageSid");
    match messages::upsert_verification_code(db, &sender, &code, sid).await {
        Ok(message_id) => {
            if let Err(e) = audit::append(
                db,
                &message_id,
                None,
                MessageStatus::Delivered,
                AuditActor::Webhook,
                "verification_code_captured",
            )
            .await
            {
                warn!(message_id, error = %e, "failed to audit code capture");
            }
            info!(sender = %sender, "verification code captured");
            StatusCode::OK.into_response()
        }
        Err(e) => {
            warn!(sender = %sender, error = %e, "failed to persist verification code");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// First run of exactly six digits in the text.
fn extract_code(text: &str) -> Option<String> {
    // Compiled per call; inbound volume does not justify a cached regex.
    let re = Regex::new(r"(?:^|\D)(\d{6})(?:\D|$)").ok()?;
    re.captures(text).map(|c| c[1].to_string())
}
