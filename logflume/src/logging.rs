// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Diagnostic output for the daemon itself. The destination is chosen by a
//! logspec: absent or empty means standard error, `syslog:` means the
//! system log (daemon facility, PID in the identifier), anything else is a
//! file to append to.

use crate::config::LogLevel;
use anyhow::{anyhow, Context};
use std::fs::OpenOptions;
use std::io;
use std::sync::{Arc, Mutex};
use syslog::{Facility, Formatter3164, Logger, LoggerBackend};
use tracing::{Level, Metadata};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;

/// Maps the configured verbosity onto the subscriber's filter.
fn level_filter(level: LogLevel) -> LevelFilter {
    match level {
        LogLevel::Debug => LevelFilter::TRACE,
        LogLevel::Verbose => LevelFilter::DEBUG,
        LogLevel::Notice => LevelFilter::INFO,
        LogLevel::Warning => LevelFilter::WARN,
        LogLevel::Error => LevelFilter::ERROR,
    }
}

/// Installs the global subscriber per the logspec.
pub fn init(ident: &str, logspec: Option<&str>, level: LogLevel) -> anyhow::Result<()> {
    let filter = level_filter(level);
    match logspec {
        None | Some("") => tracing_subscriber::fmt()
            .with_max_level(filter)
            .with_ansi(false)
            .with_writer(io::stderr)
            .try_init()
            .map_err(|e| anyhow!("installing stderr logger: {e}")),
        Some("syslog:") => {
            let formatter = Formatter3164 {
                facility: Facility::LOG_DAEMON,
                hostname: None,
                process: ident.to_owned(),
                pid: std::process::id(),
            };
            let logger = syslog::unix(formatter)
                .map_err(|e| anyhow!("opening syslog: {e}"))?;
            tracing_subscriber::fmt()
                .with_max_level(filter)
                .with_ansi(false)
                .with_level(false)
                .with_target(false)
                .without_time()
                .with_writer(SyslogMakeWriter {
                    logger: Arc::new(Mutex::new(logger)),
                })
                .try_init()
                .map_err(|e| anyhow!("installing syslog logger: {e}"))
        }
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("unable to open log file {path}"))?;
            tracing_subscriber::fmt()
                .with_max_level(filter)
                .with_ansi(false)
                .with_writer(Arc::new(file))
                .try_init()
                .map_err(|e| anyhow!("installing file logger: {e}"))
        }
    }
}

type SharedLogger = Arc<Mutex<Logger<LoggerBackend, Formatter3164>>>;

struct SyslogMakeWriter {
    logger: SharedLogger,
}

struct SyslogWriter {
    logger: SharedLogger,
    level: Level,
}

impl io::Write for SyslogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let text = String::from_utf8_lossy(buf);
        let msg = text.trim_end();
        if msg.is_empty() {
            return Ok(buf.len());
        }
        let mut logger = self.logger.lock().expect("lock poisoned");
        let res = if self.level == Level::ERROR {
            logger.err(msg)
        } else if self.level == Level::WARN {
            logger.warning(msg)
        } else if self.level == Level::INFO {
            logger.notice(msg)
        } else if self.level == Level::DEBUG {
            logger.info(msg)
        } else {
            logger.debug(msg)
        };
        res.map_err(|e| io::Error::other(e.to_string()))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for SyslogMakeWriter {
    type Writer = SyslogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SyslogWriter {
            logger: Arc::clone(&self.logger),
            level: Level::INFO,
        }
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        SyslogWriter {
            logger: Arc::clone(&self.logger),
            level: *meta.level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_mapping_is_monotonic() {
        assert_eq!(level_filter(LogLevel::Debug), LevelFilter::TRACE);
        assert_eq!(level_filter(LogLevel::Verbose), LevelFilter::DEBUG);
        assert_eq!(level_filter(LogLevel::Notice), LevelFilter::INFO);
        assert_eq!(level_filter(LogLevel::Warning), LevelFilter::WARN);
        assert_eq!(level_filter(LogLevel::Error), LevelFilter::ERROR);
    }
}
