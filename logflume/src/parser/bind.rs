// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Parser for BIND query-log lines.

use super::{Parser, RegexParser};
use crate::component::PropertyError;
use logflume_core::record::{Event, LogLine};

// The stretch between the client port and ": query: " may hold a signer
// and a qname; the greedy wildcard swallows both.
const BIND_PATTERN: &str = concat!(
    "^",
    "queries:",
    "( [0-9a-z]+:)?",   // 1: optional severity
    " client ",
    "([0-9A-Fa-f:.]+)", // 2: client address
    "#",
    "([0-9]+)",         // 3: client port
    ".*",               //    optional signer, qname
    ": query: ",
    "([0-9A-Za-z._-]+)", // 4: queried name
    " ",
    "([A-Z]+)",         // 5: class
    " ",
    "([0-9A-Z]+)",      // 6: type
    " ",
    "([+-])",           // 7: recursion and flags
    "([A-Z]*)",         // 8: recursion and flags
    " ",
    "\\(([0-9A-Fa-f:.]+)\\)", // 9: server address
    "$",
);

const BIND_FIELDS: &[(&str, usize)] = &[
    ("client_addr", 2),
    ("client_port", 3),
    ("dnsname", 4),
    ("class", 5),
    ("type", 6),
    ("recurse", 7),
    ("flags", 8),
    ("server_addr", 9),
];

pub struct BindParser {
    inner: RegexParser,
}

impl BindParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(BindParser {
            inner: RegexParser::new(BIND_PATTERN, BIND_FIELDS)?,
        })
    }
}

impl Parser for BindParser {
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

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(what: &str) -> Option<Event> {
        BindParser::new().unwrap().parse(&LogLine::new(1_000_000, what))
    }

    #[test]
    fn extracts_query_fields_in_order() {
        let ev = parse(
            "queries: info: client 198.51.100.7#53123 (example.com): \
             query: example.com IN A +E (203.0.113.9)",
        )
        .unwrap();
        let keys: Vec<_> = ev.keys().collect();
        assert_eq!(
            keys,
            vec![
                "timestamp",
                "client_addr",
                "client_port",
                "dnsname",
                "class",
                "type",
                "recurse",
                "flags",
                "server_addr"
            ]
        );
        assert_eq!(ev.get_str("client_addr"), Some("198.51.100.7"));
        assert_eq!(ev.get_str("client_port"), Some("53123"));
        assert_eq!(ev.get_str("dnsname"), Some("example.com"));
        assert_eq!(ev.get_str("class"), Some("IN"));
        assert_eq!(ev.get_str("type"), Some("A"));
        assert_eq!(ev.get_str("recurse"), Some("+"));
        assert_eq!(ev.get_str("flags"), Some("E"));
        assert_eq!(ev.get_str("server_addr"), Some("203.0.113.9"));
    }

    #[test]
    fn severity_is_optional() {
        let ev = parse(
            "queries: client 198.51.100.7#53123: query: example.org IN AAAA -D (203.0.113.9)",
        )
        .unwrap();
        assert_eq!(ev.get_str("dnsname"), Some("example.org"));
        assert_eq!(ev.get_str("recurse"), Some("-"));
        assert_eq!(ev.get_str("flags"), Some("D"));
    }

    #[test]
    fn ignores_unrelated_lines() {
        assert!(parse("resolver: client 1.2.3.4#1: query: a IN A +E (5.6.7.8)").is_none());
        assert!(parse("queries: info: client oops").is_none());
    }
}
