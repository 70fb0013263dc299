// SPDX-FileCopyrightText: 2026 Forecourt Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Forecourt notification service.
//!
//! Provides the error taxonomy, domain types, message state machine,
//! contact normalizer, and the [`MessagingProvider`] trait implemented by
//! provider integrations and test doubles.

pub mod contact;
pub mod error;
pub mod traits;
pub mod types;

pub use contact::ContactNormalizer;
pub use error::ForecourtError;
pub use traits::MessagingProvider;
pub use types::{
    AuditActor, AuditEntry, Channel, ConsentRecord, DeliveryAttempt, DispatchRequest,
    HoldReason, Message, MessageStatus, MessageType, ProviderFailure, ProviderReceipt,
    ProviderStatus, QueueEntry, now_iso8601,
};
