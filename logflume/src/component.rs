// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Shared pieces of the component contract. Readers, parsers and senders
//! all expose the same property-bag surface; the concrete class behind each
//! is selected at configuration time.

/// Failure to apply a configuration property to a component.
#[derive(Debug, thiserror::Error)]
pub enum PropertyError {
    #[error("unknown property '{0}'")]
    Unknown(String),
    #[error("invalid value for '{key}': {reason}")]
    Invalid { key: String, reason: String },
}

impl PropertyError {
    pub fn invalid(key: &str, reason: impl ToString) -> Self {
        PropertyError::Invalid {
            key: key.to_owned(),
            reason: reason.to_string(),
        }
    }
}
