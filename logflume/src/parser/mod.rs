// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Parser stage: components that extract structured [`Event`]s from raw
//! [`LogLine`]s. A parser that does not recognize a line returns `None`;
//! that is the primary control flow for non-matches, not an error.

mod bind;
mod sshd;

pub use bind::BindParser;
pub use sshd::SshdParser;

use crate::component::PropertyError;
use logflume_core::record::{Event, LogLine};
use regex::Regex;

pub trait Parser: Send {
    fn set(&mut self, key: &str, value: &str) -> Result<(), PropertyError>;
    fn get(&self, key: &str) -> Option<String>;
    /// Extracts an event from the line, or `None` if the line is not one
    /// this parser understands.
    fn parse(&self, line: &LogLine) -> Option<Event>;
}

/// Template for parsers built around one compiled regular expression with
/// numbered capture groups and a static field map.
pub struct RegexParser {
    re: Regex,
    fields: &'static [(&'static str, usize)],
}

impl RegexParser {
    pub fn new(
        pattern: &str,
        fields: &'static [(&'static str, usize)],
    ) -> Result<Self, regex::Error> {
        Ok(RegexParser {
            re: Regex::new(pattern)?,
            fields,
        })
    }

    /// Runs the expression against the line text. On a match, the event is
    /// stamped from the line's clock and each mapped capture group is
    /// copied out of the line by offset. A missing group drops the partial
    /// event.
    pub fn parse_line(&self, line: &LogLine) -> Option<Event> {
        let caps = self.re.captures(line.what())?;
        let mut event = Event::new();
        event.set_time(line.when());
        for (name, group) in self.fields {
            let m = caps.get(*group)?;
            event.set_str(name, m.as_str());
        }
        Some(event)
    }
}
