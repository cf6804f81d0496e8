// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Parser for sshd authentication-failure lines.

use super::{Parser, RegexParser};
use crate::component::PropertyError;
use logflume_core::record::{Event, LogLine};

const SSHD_PATTERN: &str = concat!(
    "^",
    "Failed ",
    "([a-z-]+)",       // 1: method
    " for ",
    "(invalid user |)", // 2: ignored
    "([0-9a-z-]+)",    // 3: login
    " from ",
    "([0-9A-Fa-f:.]+)", // 4: client address
    " port ",
    "([0-9]+)",        // 5: client port
    " ",
    "ssh([0-9.]+)",    // 6: protocol version
    "$",
);

const SSHD_FIELDS: &[(&str, usize)] = &[
    ("method", 1),
    ("login", 3),
    ("client_addr", 4),
    ("client_port", 5),
    ("protocol", 6),
];

pub struct SshdParser {
    inner: RegexParser,
}

impl SshdParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(SshdParser {
            inner: RegexParser::new(SSHD_PATTERN, SSHD_FIELDS)?,
        })
    }
}

impl Parser for SshdParser {
    fn set(&mut self, key: &str, _value: &str) -> Result<(), PropertyError> {
        Err(PropertyError::Unknown(key.to_owned()))
    }

    fn get(&self, _key: &str) -> Option<String> {
        None
    }

    fn parse(&self, line: &LogLine) -> Option<Event> {
        self.inner.parse_line(line)
    }
}
