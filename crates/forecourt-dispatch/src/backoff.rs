// SPDX-FileCopyrightText: 2026 Forecourt Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Explicit backoff policy for same-channel transient retries.

use std::time::Duration;

use forecourt_config::DispatchConfig;

/// Exponential backoff parameters, injected into the dispatcher so tests
/// can drive retries on a paused clock.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
}

impl BackoffPolicy {
    pub fn from_config(config: &DispatchConfig) -> Self {
        Self {
            max_retries: config.max_transient_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            multiplier: config.backoff_multiplier,
        }
    }

    /// Delay before retry number `retry` (0-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self.multiplier.powi(retry as i32);
        self.base_delay.mul_f64(factor)
    }
}
