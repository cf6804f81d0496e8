// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Journal-cursor reader: a system-scope journal tailed through an opaque
//! cursor, filtered to one service unit.
//!
//! The cursor abstraction keeps the journal backend out of the core: any
//! type that can seek to the tail, install a unit match and step entries
//! will do. The shipped backend follows the journald export stream from a
//! `journalctl` child process, one JSON object per line.

use super::{ReadError, Reader};
use crate::component::PropertyError;
use anyhow::Context;
use logflume_core::record::{now_micros, LogLine};
use serde_json::Value;
use std::io::Read;
use std::os::fd::AsRawFd;
use std::process::{Child, Command, Stdio};
use tracing::debug;

const MESSAGE_FIELD: &str = "MESSAGE";
const TIMESTAMP_FIELD: &str = "_SOURCE_REALTIME_TIMESTAMP";

/// Cursor over a local, system-scope journal.
pub trait JournalCursor: Send {
    /// Positions the cursor after the newest entry.
    fn seek_tail(&mut self) -> anyhow::Result<()>;
    /// Removes all installed matches.
    fn clear_matches(&mut self);
    /// Restricts the cursor to entries of one service unit.
    fn match_unit(&mut self, unit: &str) -> anyhow::Result<()>;
    /// Steps to the next entry; false means none is available yet.
    fn advance(&mut self) -> anyhow::Result<bool>;
    /// Message text of the current entry.
    fn message(&self) -> Option<String>;
    /// Source real-time timestamp of the current entry, in microseconds.
    fn source_timestamp_micros(&self) -> Option<u64>;
}

pub struct JournalReader {
    cursor: Box<dyn JournalCursor>,
    unit: Option<String>,
}

impl JournalReader {
    pub fn new(cursor: Box<dyn JournalCursor>) -> Self {
        JournalReader { cursor, unit: None }
    }

    /// Installs a new unit filter. Past the clear there is no return: the
    /// old filter is gone even if installing the new match fails.
    fn set_unit(&mut self, unit: &str) -> anyhow::Result<()> {
        self.cursor.clear_matches();
        self.unit = Some(unit.to_owned());
        self.cursor
            .match_unit(unit)
            .with_context(|| format!("installing match for unit {unit}"))?;
        self.cursor.seek_tail()?;
        Ok(())
    }
}

impl Reader for JournalReader {
    fn set(&mut self, key: &str, value: &str) -> Result<(), PropertyError> {
        match key {
            "unit" => self
                .set_unit(value)
                .map_err(|e| PropertyError::invalid(key, format!("{e:#}"))),
            _ => Err(PropertyError::Unknown(key.to_owned())),
        }
    }

    fn get(&self, key: &str) -> Option<String> {
        match key {
            "unit" => self.unit.clone(),
            _ => None,
        }
    }

    fn read(&mut self) -> Result<LogLine, ReadError> {
        match self.cursor.advance() {
            Ok(true) => {}
            Ok(false) => return Err(ReadError::TryAgain),
            Err(e) => return Err(ReadError::Fatal(e)),
        }
        // no point in the entry without its message
        let message = self
            .cursor
            .message()
            .context("journal entry carries no message")
            .map_err(ReadError::Fatal)?;
        let when = self
            .cursor
            .source_timestamp_micros()
            .filter(|&t| t > 0)
            .unwrap_or_else(now_micros);
        Ok(LogLine::new(when, &message))
    }
}

/// Journal cursor over a `journalctl --follow` child process in JSON
/// output mode, stdout switched to non-blocking so an empty journal reads
/// as "no entry yet" rather than stalling the stage.
pub struct JournalctlCursor {
    child: Option<Child>,
    pending: Vec<u8>,
    current: Option<serde_json::Map<String, Value>>,
    unit: Option<String>,
}

impl JournalctlCursor {
    pub fn new() -> Self {
        JournalctlCursor {
            child: None,
            pending: Vec::new(),
            current: None,
            unit: None,
        }
    }

    fn respawn(&mut self) -> anyhow::Result<()> {
        self.kill_child();
        let mut cmd = Command::new("journalctl");
        cmd.args(["--system", "--follow", "--output=json", "--lines=0"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        if let Some(unit) = &self.unit {
            cmd.arg(format!("--unit={unit}"));
        }
        let child = cmd.spawn().context("spawning journalctl")?;
        if let Some(stdout) = &child.stdout {
            set_nonblocking(stdout.as_raw_fd())?;
        }
        debug!(unit = self.unit.as_deref(), "journal cursor started");
        self.child = Some(child);
        self.pending.clear();
        self.current = None;
        Ok(())
    }

    fn kill_child(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }

    /// Pulls whatever the journal has buffered without blocking.
    fn fill_pending(&mut self) -> anyhow::Result<()> {
        let child = match &mut self.child {
            Some(c) => c,
            None => return Ok(()),
        };
        let stdout = child
            .stdout
            .as_mut()
            .context("journal stream has no stdout")?;
        let mut chunk = [0u8; 4096];
        loop {
            match stdout.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

impl Default for JournalctlCursor {
    fn default() -> Self {
        Self::new()
    }
}

impl JournalCursor for JournalctlCursor {
    fn seek_tail(&mut self) -> anyhow::Result<()> {
        self.respawn()
    }

    fn clear_matches(&mut self) {
        self.kill_child();
        self.unit = None;
    }

    fn match_unit(&mut self, unit: &str) -> anyhow::Result<()> {
        self.unit = Some(unit.to_owned());
        Ok(())
    }

    fn advance(&mut self) -> anyhow::Result<bool> {
        if self.child.is_none() {
            // unfiltered cursor; tail everything
            self.respawn()?;
        }
        self.fill_pending()?;
        let Some(eol) = self.pending.iter().position(|&b| b == b'\n') else {
            return Ok(false);
        };
        let line: Vec<u8> = self.pending.drain(..=eol).collect();
        let entry = serde_json::from_slice(&line[..line.len() - 1])
            .context("malformed journal export entry")?;
        self.current = Some(entry);
        Ok(true)
    }

    fn message(&self) -> Option<String> {
        match self.current.as_ref()?.get(MESSAGE_FIELD)? {
            Value::String(s) => Some(s.clone()),
            // binary-safe entries export the message as a byte array
            Value::Array(bytes) => {
                let raw: Vec<u8> = bytes
                    .iter()
                    .filter_map(Value::as_u64)
                    .map(|b| b as u8)
                    .collect();
                Some(String::from_utf8_lossy(&raw).into_owned())
            }
            _ => None,
        }
    }

    fn source_timestamp_micros(&self) -> Option<u64> {
        self.current
            .as_ref()?
            .get(TIMESTAMP_FIELD)?
            .as_str()?
            .parse()
            .ok()
    }
}

impl Drop for JournalctlCursor {
    fn drop(&mut self) {
        self.kill_child();
    }
}

fn set_nonblocking(fd: std::os::fd::RawFd) -> anyhow::Result<()> {
    // SAFETY: fd is a valid descriptor owned by the child handle.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(std::io::Error::last_os_error()).context("F_GETFL");
    }
    // SAFETY: same descriptor, flags read above.
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
        return Err(std::io::Error::last_os_error()).context("F_SETFL");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct MockCursor {
        entries: VecDeque<(Option<String>, Option<u64>)>,
        current: Option<(Option<String>, Option<u64>)>,
        unit: Option<String>,
        seeks: usize,
        fail_match: bool,
    }

    impl JournalCursor for MockCursor {
        fn seek_tail(&mut self) -> anyhow::Result<()> {
            self.seeks += 1;
            Ok(())
        }

        fn clear_matches(&mut self) {
            self.unit = None;
        }

        fn match_unit(&mut self, unit: &str) -> anyhow::Result<()> {
            if self.fail_match {
                anyhow::bail!("no such unit");
            }
            self.unit = Some(unit.to_owned());
            Ok(())
        }

        fn advance(&mut self) -> anyhow::Result<bool> {
            match self.entries.pop_front() {
                Some(e) => {
                    self.current = Some(e);
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        fn message(&self) -> Option<String> {
            self.current.as_ref()?.0.clone()
        }

        fn source_timestamp_micros(&self) -> Option<u64> {
            self.current.as_ref()?.1
        }
    }

    #[test]
    fn empty_journal_reports_try_again() {
        let mut r = JournalReader::new(Box::new(MockCursor::default()));
        assert!(matches!(r.read(), Err(ReadError::TryAgain)));
    }

    #[test]
    fn entry_becomes_logline_with_source_timestamp() {
        let mut cursor = MockCursor::default();
        cursor
            .entries
            .push_back((Some("hello".to_owned()), Some(1_700_000_000_000_000)));
        let mut r = JournalReader::new(Box::new(cursor));
        let ll = r.read().unwrap();
        assert_eq!(ll.what(), "hello");
        assert_eq!(ll.when(), 1_700_000_000_000_000);
    }

    #[test]
    fn missing_timestamp_falls_back_to_wall_clock() {
        let mut cursor = MockCursor::default();
        cursor.entries.push_back((Some("hello".to_owned()), None));
        let before = now_micros();
        let mut r = JournalReader::new(Box::new(cursor));
        assert!(r.read().unwrap().when() >= before);
    }

    #[test]
    fn missing_message_is_fatal() {
        let mut cursor = MockCursor::default();
        cursor.entries.push_back((None, Some(1)));
        let mut r = JournalReader::new(Box::new(cursor));
        assert!(matches!(r.read(), Err(ReadError::Fatal(_))));
    }

    #[test]
    fn long_message_is_truncated() {
        let mut cursor = MockCursor::default();
        cursor.entries.push_back((Some("m".repeat(5000)), Some(1)));
        let mut r = JournalReader::new(Box::new(cursor));
        assert_eq!(r.read().unwrap().what().len(), 1023);
    }

    #[test]
    fn set_unit_clears_then_installs_and_seeks() {
        let mut r = JournalReader::new(Box::new(MockCursor::default()));
        r.set("unit", "sshd.service").unwrap();
        assert_eq!(r.get("unit").as_deref(), Some("sshd.service"));
    }

    #[test]
    fn failed_match_surfaces_error_after_clearing() {
        let cursor = MockCursor {
            fail_match: true,
            ..Default::default()
        };
        let mut r = JournalReader::new(Box::new(cursor));
        assert!(r.set("unit", "nope.service").is_err());
        // the reader still records the requested unit; the old filter is gone
        assert_eq!(r.get("unit").as_deref(), Some("nope.service"));
    }
}
