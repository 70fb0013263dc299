// SPDX-FileCopyrightText: 2026 Forecourt Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel selection and fallback ordering.

use forecourt_core::types::{Channel, ConsentRecord};
use forecourt_core::MessagingProvider;

/// Result of one selection round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Channel(Channel),
    /// No channel remains: everything is attempted, opted out, or
    /// unconfigured. The message transitions to `failed`.
    Exhausted,
}

/// Pick the next channel to attempt.
///
/// Preference first (WhatsApp when the caller expressed none), then the
/// alternate. A channel is skipped when it was already attempted, the
/// consent record opts it out, or the provider has no sender configured
/// for it. Consent filtering here is what guarantees an opted-out channel
/// never reaches `sending`, even on the fallback path.
pub fn select_channel(
    preference: Option<Channel>,
    consent: Option<&ConsentRecord>,
    provider: &dyn MessagingProvider,
    prior_attempts: &[Channel],
) -> Selection {
    let first = preference.unwrap_or(Channel::Whatsapp);
    for candidate in [first, first.other()] {
        if prior_attempts.contains(&candidate) {
            continue;
        }
        if let Some(record) = consent
            && !record.permits(candidate)
        {
            continue;
        }
        if !provider.supports(candidate) {
            continue;
        }
        return Selection::Channel(candidate);
    }
    Selection::Exhausted
}
