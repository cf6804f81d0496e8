// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Tail-follow reader for a rotating text file.
//!
//! Lines are assembled in a fixed buffer with three cursors: `pos` (start
//! of the next line), `endl` (scan position) and `len` (valid data). At end
//! of file the configured path is re-stat()ed; a device or inode change
//! means the file was rotated, and the reader reopens by path. Rotation
//! also raises SIGUSR2 so the supervisor emits queue statistics.

use super::{ReadError, Reader};
use crate::component::PropertyError;
use anyhow::Context;
use chrono::{Local, NaiveDateTime, TimeZone};
use logflume_core::record::{now_micros, LogLine};
use nix::sys::signal::{raise, Signal};
use std::fs::{self, File};
use std::io::Read;
use std::os::unix::fs::MetadataExt;
use tracing::{debug, warn};

/// Size of the line-assembly buffer. A line that outgrows it is discarded
/// wholesale; its tail arrives later as a truncated line.
const BUF_SIZE: usize = 64 * 1024;

pub struct FileReader {
    file: Option<File>,
    dev: u64,
    ino: u64,
    path: String,
    datefmt: Option<String>,
    buf: Box<[u8]>,
    pos: usize,
    endl: usize,
    len: usize,
}

impl FileReader {
    pub fn new() -> Self {
        FileReader {
            file: None,
            dev: 0,
            ino: 0,
            path: String::new(),
            datefmt: None,
            buf: vec![0u8; BUF_SIZE].into_boxed_slice(),
            pos: 0,
            endl: 0,
            len: 0,
        }
    }

    /// (Re)opens the file, by a new path or by the configured one, and
    /// resets the assembly buffer.
    fn reopen(&mut self, path: Option<&str>) -> std::io::Result<()> {
        let path = path.unwrap_or(&self.path).to_owned();
        let file = File::open(&path)?;
        let md = file.metadata()?;
        self.path = path;
        self.file = Some(file);
        self.dev = md.dev();
        self.ino = md.ino();
        self.pos = 0;
        self.endl = 0;
        self.len = 0;
        Ok(())
    }

    /// Compacts the buffer and reads once into its tail.
    fn fill_buf(&mut self) -> Result<(), ReadError> {
        if self.pos > 0 {
            self.buf.copy_within(self.pos..self.len, 0);
            self.len -= self.pos;
            self.endl -= self.pos;
            self.pos = 0;
        }
        let file = self
            .file
            .as_mut()
            .context("no path configured")
            .map_err(ReadError::Fatal)?;
        let rlen = match file.read(&mut self.buf[self.len..]) {
            Ok(n) => n,
            Err(e) => {
                warn!("{}: {}", self.path, e);
                return Err(ReadError::Fatal(e.into()));
            }
        };
        if rlen == 0 {
            // end of file; has it been rotated under us?
            if let Ok(md) = fs::metadata(&self.path) {
                if md.dev() != self.dev || md.ino() != self.ino {
                    debug!("{} has been rotated", self.path);
                    let _ = raise(Signal::SIGUSR2);
                    self.reopen(None)
                        .with_context(|| format!("reopening {}", self.path))
                        .map_err(ReadError::Fatal)?;
                }
            }
            return Err(ReadError::TryAgain);
        }
        self.len += rlen;
        Ok(())
    }

    fn get_line(&mut self) -> Result<String, ReadError> {
        self.endl = self.pos;
        loop {
            // search for EOL in existing data
            while self.endl < self.len {
                if self.buf[self.endl] == b'\n' {
                    let line =
                        String::from_utf8_lossy(&self.buf[self.pos..self.endl]).into_owned();
                    self.endl += 1;
                    self.pos = self.endl;
                    return Ok(line);
                }
                self.endl += 1;
            }
            // A full buffer with no EOL holds the head of a mega-line.
            // Discard it all; the tail will come back as a truncated line
            // and most likely be rejected downstream.
            if self.pos == 0 && self.endl == BUF_SIZE {
                self.endl = 0;
                self.len = 0;
                warn!("{}: line exceeds {} octets, discarded", self.path, BUF_SIZE);
                return Err(ReadError::LineTooLong);
            }
            self.fill_buf()?;
        }
    }
}

impl Default for FileReader {
    fn default() -> Self {
        Self::new()
    }
}

impl Reader for FileReader {
    fn set(&mut self, key: &str, value: &str) -> Result<(), PropertyError> {
        match key {
            "path" => self
                .reopen(Some(value))
                .map_err(|e| PropertyError::invalid(key, e)),
            "datefmt" => {
                self.datefmt = Some(value.to_owned());
                Ok(())
            }
            _ => Err(PropertyError::Unknown(key.to_owned())),
        }
    }

    fn get(&self, key: &str) -> Option<String> {
        match key {
            "path" if !self.path.is_empty() => Some(self.path.clone()),
            "datefmt" => self.datefmt.clone(),
            _ => None,
        }
    }

    fn read(&mut self) -> Result<LogLine, ReadError> {
        let line = self.get_line()?;
        let mut when = 0;
        if let Some(fmt) = &self.datefmt {
            when = parse_leading_timestamp(&line, fmt).unwrap_or(0);
        }
        if when == 0 {
            when = now_micros();
        }
        Ok(LogLine::new(when, &line))
    }
}

/// Parses a leading timestamp in strftime format, interpreted in local
/// time, into microseconds since the epoch. Trailing text is ignored.
fn parse_leading_timestamp(line: &str, datefmt: &str) -> Option<u64> {
    let (ndt, _rest) = NaiveDateTime::parse_and_remainder(line, datefmt).ok()?;
    let micros = Local
        .from_local_datetime(&ndt)
        .earliest()?
        .timestamp_micros();
    u64::try_from(micros).ok().filter(|&t| t > 0)
}
