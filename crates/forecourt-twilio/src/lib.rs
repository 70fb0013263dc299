// SPDX-FileCopyrightText: 2026 Forecourt Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Twilio integration: the outbound Messages API client and webhook
//! signature validation. Everything provider-specific lives here; the
//! rest of the workspace only sees the [`forecourt_core::MessagingProvider`]
//! trait.

pub mod client;
pub mod signature;

pub use client::TwilioProvider;
pub use signature::{compute_signature, validate_signature};
