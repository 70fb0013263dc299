// SPDX-FileCopyrightText: 2026 Forecourt Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted [`MessagingProvider`] double for dispatcher tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use forecourt_core::types::{Channel, DispatchRequest, ProviderFailure, ProviderReceipt};
use forecourt_core::MessagingProvider;

/// A provider whose responses are scripted up front.
///
/// Outcomes queued with [`enqueue_outcome`](Self::enqueue_outcome) are
/// returned in order; once the script runs dry every call succeeds with a
/// generated SID. All incoming requests are recorded for assertion.
pub struct MockProvider {
    whatsapp: bool,
    sms: bool,
    script: Mutex<VecDeque<Result<ProviderReceipt, ProviderFailure>>>,
    calls: Mutex<Vec<DispatchRequest>>,
    sid_counter: AtomicU64,
}

impl MockProvider {
    /// A provider supporting both channels with an empty script.
    pub fn new() -> Self {
        Self {
            whatsapp: true,
            sms: true,
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            sid_counter: AtomicU64::new(0),
        }
    }

    /// Restrict which channels the provider reports as supported.
    pub fn with_channels(mut self, whatsapp: bool, sms: bool) -> Self {
        self.whatsapp = whatsapp;
        self.sms = sms;
        self
    }

    /// Queue the outcome for the next unscripted dispatch call.
    pub fn enqueue_outcome(&self, outcome: Result<ProviderReceipt, ProviderFailure>) {
        self.script.lock().unwrap().push_back(outcome);
    }

    /// Shorthand for queueing a success with the given SID.
    pub fn enqueue_success(&self, sid: &str) {
        self.enqueue_outcome(Ok(ProviderReceipt {
            sid: sid.to_string(),
            raw_status: "queued".to_string(),
            response_code: 201,
        }));
    }

    /// Shorthand for queueing a failure.
    pub fn enqueue_failure(&self, failure: ProviderFailure) {
        self.enqueue_outcome(Err(failure));
    }

    /// All dispatch requests received so far, in order.
    pub fn calls(&self) -> Vec<DispatchRequest> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of dispatch calls received.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessagingProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn supports(&self, channel: Channel) -> bool {
        match channel {
            Channel::Whatsapp => self.whatsapp,
            Channel::Sms => self.sms,
        }
    }

    async fn dispatch(
        &self,
        request: &DispatchRequest,
    ) -> Result<ProviderReceipt, ProviderFailure> {
        self.calls.lock().unwrap().push(request.clone());
        if let Some(outcome) = self.script.lock().unwrap().pop_front() {
            return outcome;
        }
        let n = self.sid_counter.fetch_add(1, Ordering::Relaxed);
        Ok(ProviderReceipt {
            sid: format!("SM-mock-{n}"),
            raw_status: "queued".to_string(),
            response_code: 201,
        })
    }
}
