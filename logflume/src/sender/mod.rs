// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Sender stage: components that forward structured [`Event`]s downstream.

mod elk;

pub use elk::ElkSender;

use crate::component::PropertyError;
use logflume_core::record::Event;
use logflume_core::socket::SocketError;

/// Why an event was not delivered. The event is destroyed by the caller
/// either way; delivery is best-effort.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("sender has no destination configured")]
    Unconfigured,
    #[error(transparent)]
    Socket(#[from] SocketError),
    #[error("event serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("transmit failed: {0}")]
    Transmit(#[source] std::io::Error),
}

pub trait Sender: Send {
    fn set(&mut self, key: &str, value: &str) -> Result<(), PropertyError>;
    fn get(&self, key: &str) -> Option<String>;
    /// Attempts to deliver one event.
    fn send(&mut self, event: &Event) -> Result<(), SendError>;
}
