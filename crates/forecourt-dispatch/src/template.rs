// SPDX-FileCopyrightText: 2026 Forecourt Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Template rendering.
//!
//! A template is plain text with `{placeholder}` markers. Every marker
//! must be bound by the caller's variable map; a missing key is a hard
//! [`ForecourtError::MissingVariable`], never an empty substitution.
//! Output is byte-identical regardless of which channel eventually
//! carries the message.

use std::collections::HashMap;

use forecourt_core::types::MessageType;
use forecourt_core::ForecourtError;
use regex::Regex;

fn template_for(message_type: MessageType) -> Option<&'static str> {
    match message_type {
        MessageType::MotReminder => Some(
            "Hi {name}, the MOT for {reg} is due on {date}. \
             Reply or call us to book it in.",
        ),
        MessageType::JobUpdate => Some("Hi {name}, an update on {reg}: {update}"),
        MessageType::Verification => Some("Your verification code is {code}."),
        MessageType::Custom => Some("{body}"),
        // Inbound capture only; never rendered for sending.
        MessageType::VerificationCode => None,
    }
}

/// Renders named templates against a caller-supplied variable map.
pub struct TemplateRenderer {
    placeholder: Regex,
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self {
            // Anchored to simple snake_case identifiers; literal braces in
            // variable values are never re-scanned.
            placeholder: Regex::new(r"\{([a-z][a-z0-9_]*)\}").unwrap_or_else(|_| unreachable!()),
        }
    }

    /// Render the template for `message_type`, binding every placeholder
    /// from `variables`.
    pub fn render(
        &self,
        message_type: MessageType,
        variables: &HashMap<String, String>,
    ) -> Result<String, ForecourtError> {
        let template = template_for(message_type).ok_or_else(|| {
            ForecourtError::Internal(format!(
                "message type {message_type} has no outbound template"
            ))
        })?;

        let mut rendered = String::with_capacity(template.len());
        let mut last_end = 0;
        for captures in self.placeholder.captures_iter(template) {
            let whole = captures.get(0).ok_or_else(|| {
                ForecourtError::Internal("placeholder capture missing".to_string())
            })?;
            let name = &captures[1];
            let value = variables
                .get(name)
                .ok_or_else(|| ForecourtError::MissingVariable {
                    template: message_type.to_string(),
                    variable: name.to_string(),
                })?;
            rendered.push_str(&template[last_end..whole.start()]);
            rendered.push_str(value);
            last_end = whole.end();
        }
        rendered.push_str(&template[last_end..]);
        Ok(rendered)
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn mot_reminder_renders_all_placeholders() {
        let renderer = TemplateRenderer::new();
        let body = renderer
            .render(
                MessageType::MotReminder,
                &vars(&[("name", "J Smith"), ("reg", "AB12CDE"), ("date", "2025-03-15")]),
            )
            .unwrap();
        assert_eq!(
            body,
            "Hi J Smith, the MOT for AB12CDE is due on 2025-03-15. \
             Reply or call us to book it in."
        );
    }

    #[test]
    fn missing_variable_is_a_hard_error() {
        let renderer = TemplateRenderer::new();
        let err = renderer
            .render(
                MessageType::MotReminder,
                &vars(&[("name", "J Smith"), ("reg", "AB12CDE")]),
            )
            .unwrap_err();
        match err {
            ForecourtError::MissingVariable { template, variable } => {
                assert_eq!(template, "mot_reminder");
                assert_eq!(variable, "date");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn no_partial_substitution_on_error() {
        // The error path must not leak a half-rendered string anywhere;
        // render returns Err, not a body with blanks.
        let renderer = TemplateRenderer::new();
        assert!(renderer
            .render(MessageType::JobUpdate, &vars(&[("name", "J Smith")]))
            .is_err());
    }

    #[test]
    fn custom_passes_body_through() {
        let renderer = TemplateRenderer::new();
        let body = renderer
            .render(
                MessageType::Custom,
                &vars(&[("body", "We close early on Friday.")]),
            )
            .unwrap();
        assert_eq!(body, "We close early on Friday.");
    }

    #[test]
    fn braces_in_values_are_not_rescanned() {
        let renderer = TemplateRenderer::new();
        let body = renderer
            .render(MessageType::Custom, &vars(&[("body", "literal {name} stays")]))
            .unwrap();
        assert_eq!(body, "literal {name} stays");
    }

    #[test]
    fn inbound_type_has_no_template() {
        let renderer = TemplateRenderer::new();
        assert!(renderer
            .render(MessageType::VerificationCode, &HashMap::new())
            .is_err());
    }
}
