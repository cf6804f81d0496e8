// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Reader stage: components that produce raw [`LogLine`]s from a source.

mod file;
mod journal;

pub use file::FileReader;
pub use journal::{JournalCursor, JournalReader, JournalctlCursor};

use crate::component::PropertyError;
use logflume_core::record::LogLine;

/// Why a read produced no line.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    /// The source has no data right now; the stage sleeps briefly and
    /// retries.
    #[error("no data available")]
    TryAgain,
    /// An oversize line was discarded; subsequent reads resynchronize on
    /// the next newline.
    #[error("line exceeds the assembly buffer")]
    LineTooLong,
    /// Unrecoverable source failure; the reader stage exits.
    #[error(transparent)]
    Fatal(#[from] anyhow::Error),
}

/// A source of raw log records.
pub trait Reader: Send {
    fn set(&mut self, key: &str, value: &str) -> Result<(), PropertyError>;
    fn get(&self, key: &str) -> Option<String>;
    /// Produces the next record, or describes why there is none.
    fn read(&mut self) -> Result<LogLine, ReadError>;
}
