// SPDX-FileCopyrightText: 2026 Forecourt Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook signature validation.
//!
//! Twilio signs callbacks by appending each POST parameter (sorted by
//! key, key immediately followed by value, no separators) to the full
//! request URL, HMAC-SHA1ing that string with the account auth token,
//! and base64-encoding the digest into the `X-Twilio-Signature` header.

use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Compute the expected signature for a callback.
pub fn compute_signature(auth_token: &str, url: &str, params: &[(String, String)]) -> String {
    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    let mut payload = String::from(url);
    for (key, value) in sorted {
        payload.push_str(key);
        payload.push_str(value);
    }

    // HMAC accepts keys of any length.
    let mut mac =
        HmacSha1::new_from_slice(auth_token.as_bytes()).unwrap_or_else(|_| unreachable!());
    mac.update(payload.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}

/// Constant-time check of a presented signature against the expected one.
pub fn validate_signature(
    auth_token: &str,
    url: &str,
    params: &[(String, String)],
    presented: &str,
) -> bool {
    let Ok(presented_bytes) = base64::engine::general_purpose::STANDARD.decode(presented) else {
        return false;
    };

    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    let mut payload = String::from(url);
    for (key, value) in sorted {
        payload.push_str(key);
        payload.push_str(value);
    }

    let mut mac =
        HmacSha1::new_from_slice(auth_token.as_bytes()).unwrap_or_else(|_| unreachable!());
    mac.update(payload.as_bytes());
    mac.verify_slice(&presented_bytes).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> Vec<(String, String)> {
        vec![
            ("MessageSid".to_string(), "SM123".to_string()),
            ("MessageStatus".to_string(), "delivered".to_string()),
            ("To".to_string(), "whatsapp:+447843275372".to_string()),
        ]
    }

    #[test]
    fn valid_signature_round_trips() {
        let url = "https://garage.example.com/notifications/webhook/status";
        let sig = compute_signature("token", url, &params());
        assert!(validate_signature("token", url, &params(), &sig));
    }

    #[test]
    fn signature_is_order_insensitive() {
        let url = "https://garage.example.com/notifications/webhook/status";
        let mut reversed = params();
        reversed.reverse();
        assert_eq!(
            compute_signature("token", url, &params()),
            compute_signature("token", url, &reversed)
        );
    }

    #[test]
    fn tampered_params_fail_validation() {
        let url = "https://garage.example.com/notifications/webhook/status";
        let sig = compute_signature("token", url, &params());

        let mut tampered = params();
        tampered[1].1 = "failed".to_string();
        assert!(!validate_signature("token", url, &tampered, &sig));
    }

    #[test]
    fn wrong_token_or_url_fails_validation() {
        let url = "https://garage.example.com/notifications/webhook/status";
        let sig = compute_signature("token", url, &params());
        assert!(!validate_signature("other", url, &params(), &sig));
        assert!(!validate_signature(
            "token",
            "https://attacker.example.com/notifications/webhook/status",
            &params(),
            &sig
        ));
    }

    #[test]
    fn garbage_signature_is_rejected() {
        let url = "https://garage.example.com/notifications/webhook/status";
        assert!(!validate_signature("token", url, &params(), "not base64 !!!"));
        assert!(!validate_signature("token", url, &params(), ""));
    }
}
