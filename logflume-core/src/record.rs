// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The two record types flowing through a flume: raw [`LogLine`]s from the
//! reader and structured [`Event`]s from the parser.

use serde_json::{Map, Value};
use std::io;
use std::time::{SystemTime, UNIX_EPOCH};

/// Upper bound on the text of a [`LogLine`], in octets, including the
/// terminator of the wire format this model descends from. The usable
/// payload is one octet less.
pub const MAX_LINE_OCTETS: usize = 1024;

/// Microseconds since the Unix epoch.
pub fn now_micros() -> u64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_micros() as u64,
        Err(_) => 0,
    }
}

/// An immutable raw record produced by a reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    when: u64,
    what: String,
}

impl LogLine {
    /// Creates a record stamped `when` microseconds after the epoch. Text
    /// beyond the payload bound is truncated on a character boundary.
    pub fn new(when: u64, what: &str) -> Self {
        LogLine {
            when,
            what: truncate_utf8(what, MAX_LINE_OCTETS - 1).to_owned(),
        }
    }

    pub fn when(&self) -> u64 {
        self.when
    }

    pub fn what(&self) -> &str {
        &self.what
    }
}

/// Truncates `s` to at most `max` bytes without splitting a character.
fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// A mutable structured record produced by a parser: an insertion-ordered
/// map of string keys to string or integer values, with a reserved
/// `timestamp` field in whole seconds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Event {
    fields: Map<String, Value>,
}

impl Event {
    pub fn new() -> Self {
        Event::default()
    }

    /// Stamps the reserved `timestamp` field from a microsecond clock value.
    pub fn set_time(&mut self, when_micros: u64) {
        self.fields
            .insert("timestamp".to_owned(), Value::from(when_micros / 1_000_000));
    }

    pub fn set_str(&mut self, key: &str, value: &str) {
        self.fields.insert(key.to_owned(), Value::from(value));
    }

    pub fn set_int(&mut self, key: &str, value: i64) {
        self.fields.insert(key.to_owned(), Value::from(value));
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn timestamp(&self) -> Option<u64> {
        self.fields.get("timestamp").and_then(Value::as_u64)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Keys in insertion order, which is also serialization order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Overlays `other` onto this event. Colliding keys take `other`'s
    /// value but keep their original position; new keys append.
    pub fn update_from(&mut self, other: &Event) {
        for (key, value) in &other.fields {
            self.fields.insert(key.clone(), value.clone());
        }
    }

    /// Serializes the event as compact JSON, key order preserved, straight
    /// into `w`. Each serializer chunk becomes one `write` call on `w`.
    pub fn write_json<W: io::Write>(&self, w: W) -> serde_json::Result<()> {
        serde_json::to_writer(w, &self.fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logline_truncates_to_payload_bound() {
        let text = "x".repeat(2000);
        let ll = LogLine::new(1, &text);
        assert_eq!(ll.what().len(), MAX_LINE_OCTETS - 1);
        // exactly at the bound: all payload octets retained
        let text = "y".repeat(MAX_LINE_OCTETS - 1);
        let ll = LogLine::new(1, &text);
        assert_eq!(ll.what(), text);
        // one past it: the first 1023 payload octets survive
        let text = "z".repeat(MAX_LINE_OCTETS);
        let ll = LogLine::new(1, &text);
        assert_eq!(ll.what().len(), MAX_LINE_OCTETS - 1);
    }

    #[test]
    fn logline_truncation_respects_char_boundary() {
        // 'é' is two octets; force the cut into the middle of one
        let text = "é".repeat(MAX_LINE_OCTETS);
        let ll = LogLine::new(1, &text);
        assert!(ll.what().len() <= MAX_LINE_OCTETS - 1);
        assert!(ll.what().chars().all(|c| c == 'é'));
    }

    #[test]
    fn event_timestamp_is_seconds() {
        let mut ev = Event::new();
        ev.set_time(1_700_000_000_000_000);
        assert_eq!(ev.timestamp(), Some(1_700_000_000));
    }

    #[test]
    fn event_serializes_in_insertion_order() {
        let mut ev = Event::new();
        ev.set_time(1_000_000);
        ev.set_str("b", "2");
        ev.set_str("a", "1");
        let mut buf = Vec::new();
        ev.write_json(&mut buf).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            r#"{"timestamp":1,"b":"2","a":"1"}"#
        );
    }

    #[test]
    fn update_keeps_position_of_colliding_keys() {
        let mut ev = Event::new();
        ev.set_str("application", "stale");
        ev.set_str("login", "alice");
        let mut template = Event::new();
        template.set_str("logowner", "ops");
        template.set_str("application", "sshd");
        ev.update_from(&template);
        let keys: Vec<_> = ev.keys().collect();
        assert_eq!(keys, vec!["application", "login", "logowner"]);
        assert_eq!(ev.get_str("application"), Some("sshd"));
    }
}
