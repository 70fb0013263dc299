// SPDX-FileCopyrightText: 2026 Forecourt Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Consent and verification gate.
//!
//! The single legal entry point into the pipeline. Every send request
//! passes through [`ConsentGate::evaluate`] before a message row exists;
//! the dispatcher is never invoked directly by callers.

use forecourt_core::types::{Channel, ConsentRecord, HoldReason, MessageType};

/// Outcome of gating one send request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Eligible now; create the message in `queued` and dispatch.
    Allow,
    /// Not yet eligible; hold in the verification queue.
    Defer(HoldReason),
    /// Consent rules out delivery entirely; no message is created.
    Block(String),
}

/// Pure decision logic over the consent record and request shape. All
/// database reads and side effects (queue entries, audit rows) belong to
/// the caller.
pub struct ConsentGate {
    approved_templates: Vec<String>,
}

impl ConsentGate {
    pub fn new(approved_templates: Vec<String>) -> Self {
        Self { approved_templates }
    }

    /// Decide whether a send may proceed.
    ///
    /// `now` and `scheduled_at` are ISO 8601 strings; lexicographic
    /// comparison matches chronological order.
    pub fn evaluate(
        &self,
        consent: Option<&ConsentRecord>,
        message_type: MessageType,
        scheduled_at: Option<&str>,
        now: &str,
    ) -> GateDecision {
        if let Some(record) = consent {
            if record.opted_in == Some(false) || record.blocks_all_channels() {
                return GateDecision::Block("recipient has opted out".to_string());
            }
        }

        if let Some(at) = scheduled_at
            && at > now
        {
            return GateDecision::Defer(HoldReason::Scheduled);
        }

        if !self.approved_templates.contains(&message_type.to_string()) {
            return GateDecision::Defer(HoldReason::AwaitingTemplateApproval);
        }

        // Free-form messages need an explicit opt-in on file; transactional
        // templates are sendable absent any recorded opt-out.
        if message_type == MessageType::Custom
            && consent.and_then(|c| c.opted_in) != Some(true)
        {
            return GateDecision::Defer(HoldReason::AwaitingConsentCheck);
        }

        GateDecision::Allow
    }

    /// Channels the consent record still permits. A single-channel opt-out
    /// narrows selection rather than blocking the send.
    pub fn permitted_channels(consent: Option<&ConsentRecord>) -> Vec<Channel> {
        [Channel::Whatsapp, Channel::Sms]
            .into_iter()
            .filter(|&c| consent.is_none_or(|r| r.permits(c)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forecourt_core::types::now_iso8601;

    fn gate() -> ConsentGate {
        ConsentGate::new(vec![
            "mot_reminder".to_string(),
            "job_update".to_string(),
            "verification".to_string(),
            "custom".to_string(),
        ])
    }

    fn record(
        opted_in: Option<bool>,
        whatsapp_opt_out: bool,
        sms_opt_out: bool,
    ) -> ConsentRecord {
        ConsentRecord {
            recipient: "+447843275372".to_string(),
            opted_in,
            whatsapp_opt_out,
            sms_opt_out,
            changed_at: now_iso8601(),
        }
    }

    #[test]
    fn no_consent_record_allows_transactional_sends() {
        let decision = gate().evaluate(None, MessageType::MotReminder, None, &now_iso8601());
        assert_eq!(decision, GateDecision::Allow);
    }

    #[test]
    fn full_opt_out_blocks() {
        let r = record(None, true, true);
        let decision = gate().evaluate(Some(&r), MessageType::MotReminder, None, &now_iso8601());
        assert!(matches!(decision, GateDecision::Block(_)));
    }

    #[test]
    fn explicit_opt_out_blocks_even_with_channels_open() {
        let r = record(Some(false), false, false);
        let decision = gate().evaluate(Some(&r), MessageType::JobUpdate, None, &now_iso8601());
        assert!(matches!(decision, GateDecision::Block(_)));
    }

    #[test]
    fn single_channel_opt_out_narrows_rather_than_blocks() {
        let r = record(None, true, false);
        let decision = gate().evaluate(Some(&r), MessageType::MotReminder, None, &now_iso8601());
        assert_eq!(decision, GateDecision::Allow);
        assert_eq!(ConsentGate::permitted_channels(Some(&r)), vec![Channel::Sms]);
    }

    #[test]
    fn future_schedule_defers() {
        let decision = gate().evaluate(
            None,
            MessageType::MotReminder,
            Some("9999-01-01T00:00:00.000Z"),
            &now_iso8601(),
        );
        assert_eq!(decision, GateDecision::Defer(HoldReason::Scheduled));
    }

    #[test]
    fn past_schedule_sends_immediately() {
        let decision = gate().evaluate(
            None,
            MessageType::MotReminder,
            Some("2020-01-01T00:00:00.000Z"),
            &now_iso8601(),
        );
        assert_eq!(decision, GateDecision::Allow);
    }

    #[test]
    fn unapproved_template_defers() {
        let narrow = ConsentGate::new(vec!["verification".to_string()]);
        let decision = narrow.evaluate(None, MessageType::MotReminder, None, &now_iso8601());
        assert_eq!(
            decision,
            GateDecision::Defer(HoldReason::AwaitingTemplateApproval)
        );
    }

    #[test]
    fn custom_without_opt_in_awaits_consent_check() {
        let decision = gate().evaluate(None, MessageType::Custom, None, &now_iso8601());
        assert_eq!(
            decision,
            GateDecision::Defer(HoldReason::AwaitingConsentCheck)
        );

        let r = record(Some(true), false, false);
        let decision = gate().evaluate(Some(&r), MessageType::Custom, None, &now_iso8601());
        assert_eq!(decision, GateDecision::Allow);
    }
}
