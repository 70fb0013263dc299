// SPDX-FileCopyrightText: 2026 Forecourt Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contact normalization: raw phone input to one canonical identity.
//!
//! The canonical form is the dedup key for consent lookups, so
//! normalization must be deterministic -- the same physical number always
//! produces the same identity regardless of input formatting.

use crate::error::ForecourtError;

/// Fewest digits a plausible subscriber number can carry after the
/// country-code prefix is resolved.
const MIN_DIGITS: usize = 10;
/// E.164 upper bound.
const MAX_DIGITS: usize = 15;

/// Normalizes raw phone strings against a configured default country code.
///
/// Injected explicitly rather than read from process-wide state so tests
/// can run in parallel with distinct country codes.
#[derive(Debug, Clone)]
pub struct ContactNormalizer {
    /// Country code digits substituted for a national trunk `0` prefix,
    /// without `+` (e.g. `"44"`).
    default_country_code: String,
}

impl ContactNormalizer {
    pub fn new(default_country_code: impl Into<String>) -> Self {
        Self {
            default_country_code: default_country_code.into(),
        }
    }

    /// Normalize a raw phone string to canonical `+<digits>` form.
    ///
    /// Accepted shapes: `+<cc><number>`, `00<cc><number>`, `0<number>`
    /// (national trunk form, resolved with the default country code), or
    /// bare `<cc><number>`. Whitespace, dashes, dots, and parentheses are
    /// stripped. Anything else is [`ForecourtError::MalformedNumber`].
    pub fn normalize(&self, raw: &str) -> Result<String, ForecourtError> {
        let trimmed = raw.trim();
        let has_plus = trimmed.starts_with('+');

        let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return Err(self.malformed(raw, "no digits present"));
        }

        // Reject raw input containing characters other than digits,
        // grouping punctuation, and an optional leading plus.
        let stray = trimmed
            .chars()
            .enumerate()
            .any(|(i, c)| {
                !(c.is_ascii_digit()
                    || c.is_ascii_whitespace()
                    || matches!(c, '-' | '.' | '(' | ')')
                    || (c == '+' && i == 0))
            });
        if stray {
            return Err(self.malformed(raw, "unexpected characters"));
        }

        let canonical = if has_plus {
            digits
        } else if let Some(rest) = digits.strip_prefix("00") {
            rest.to_string()
        } else if let Some(rest) = digits.strip_prefix('0') {
            format!("{}{rest}", self.default_country_code)
        } else {
            // No trunk prefix and no `+`/`00`: the country code must
            // already be explicit.
            digits
        };

        if canonical.starts_with('0') {
            return Err(self.malformed(raw, "country code cannot start with 0"));
        }
        if canonical.len() < MIN_DIGITS {
            return Err(self.malformed(raw, "too few digits"));
        }
        if canonical.len() > MAX_DIGITS {
            return Err(self.malformed(raw, "too many digits"));
        }

        Ok(format!("+{canonical}"))
    }

    fn malformed(&self, input: &str, detail: &str) -> ForecourtError {
        ForecourtError::MalformedNumber {
            input: input.to_string(),
            detail: detail.to_string(),
        }
    }
}
