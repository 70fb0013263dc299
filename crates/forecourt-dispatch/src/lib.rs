// SPDX-FileCopyrightText: 2026 Forecourt Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Forecourt dispatch pipeline: consent gate, template renderer,
//! channel selection with fallback, the delivery dispatcher state
//! machine, webhook status application, and the verification-queue
//! sweeper.

pub mod backoff;
pub mod dispatcher;
pub mod gate;
pub mod selector;
pub mod sweep;
pub mod template;
pub mod update;

pub use backoff::BackoffPolicy;
pub use dispatcher::{Dispatcher, SendOutcome, SendRequest};
pub use gate::{ConsentGate, GateDecision};
pub use selector::{select_channel, Selection};
pub use sweep::QueueSweeper;
pub use template::TemplateRenderer;
pub use update::{apply_status_update, UpdateOutcome};
