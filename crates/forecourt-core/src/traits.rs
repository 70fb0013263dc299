// SPDX-FileCopyrightText: 2026 Forecourt Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The provider trait seam between the dispatcher and the outside world.

use async_trait::async_trait;

use crate::types::{Channel, DispatchRequest, ProviderFailure, ProviderReceipt};

/// An external messaging provider reachable over HTTP.
///
/// The delivery dispatcher is the only caller. Implementations classify
/// every failure into [`ProviderFailure`] so the dispatcher can decide
/// between same-channel retry, channel fallback, and giving up without
/// knowing provider specifics.
#[async_trait]
pub trait MessagingProvider: Send + Sync {
    /// Short provider name for logs and audit reasons.
    fn name(&self) -> &str;

    /// Whether the provider account is configured to send on `channel`.
    fn supports(&self, channel: Channel) -> bool;

    /// Submit one message for delivery. Success means the provider
    /// accepted the message and assigned it an identifier; actual
    /// delivery is reported later via webhook.
    async fn dispatch(
        &self,
        request: &DispatchRequest,
    ) -> Result<ProviderReceipt, ProviderFailure>;
}
