// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Configuration binding: a JSON file describing exactly one flume, with a
//! class and a bag of string properties per component. Anything the schema
//! does not name is a fatal error; a component that rejects a property is
//! a fatal error too. All of this happens before the pipeline starts.

use crate::flume::Flume;
use crate::parser::{BindParser, Parser, SshdParser};
use crate::reader::{FileReader, JournalReader, JournalctlCursor, Reader};
use crate::sender::{ElkSender, Sender};
use anyhow::{bail, Context};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::Path;

/// Diagnostic verbosity, most verbose first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Verbose,
    Notice,
    Warning,
    Error,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    flumes: Vec<RawFlume>,
    #[serde(default)]
    log_level: Option<LogLevel>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFlume {
    reader: RawComponent,
    parser: RawComponent,
    sender: RawComponent,
}

#[derive(Deserialize)]
struct RawComponent {
    class: String,
    #[serde(flatten)]
    properties: Map<String, Value>,
}

/// Everything the daemon needs that came out of the configuration file.
pub struct Config {
    pub flume: Flume,
    pub log_level: Option<LogLevel>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("log_level", &self.log_level)
            .finish_non_exhaustive()
    }
}

/// Loads and binds the configuration file.
pub fn load(path: &Path) -> anyhow::Result<Config> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("{}: cannot read", path.display()))?;
    let raw: RawConfig = serde_json::from_str(&text)
        .with_context(|| format!("{}: malformed configuration", path.display()))?;
    let mut flumes = raw.flumes;
    let flume = match flumes.len() {
        0 => bail!("{}: at least one flume is required", path.display()),
        1 => flumes.remove(0),
        _ => bail!("{}: multiple flumes are not yet supported", path.display()),
    };
    Ok(Config {
        flume: Flume {
            reader: unpack_reader(flume.reader)?,
            parser: unpack_parser(flume.parser)?,
            sender: unpack_sender(flume.sender)?,
        },
        log_level: raw.log_level,
    })
}

fn unpack_reader(raw: RawComponent) -> anyhow::Result<Box<dyn Reader>> {
    let mut reader: Box<dyn Reader> = match raw.class.as_str() {
        "file" => Box::new(FileReader::new()),
        "systemd" => Box::new(JournalReader::new(Box::new(JournalctlCursor::new()))),
        other => bail!("unrecognized reader class '{other}'"),
    };
    for (key, value) in &raw.properties {
        let value = property_string(value)
            .with_context(|| format!("reader property '{key}'"))?;
        reader
            .set(key, value)
            .with_context(|| format!("reader property '{key}'"))?;
    }
    Ok(reader)
}

fn unpack_parser(raw: RawComponent) -> anyhow::Result<Box<dyn Parser>> {
    let mut parser: Box<dyn Parser> = match raw.class.as_str() {
        "sshd" => Box::new(SshdParser::new().context("initializing sshd parser")?),
        "bind" => Box::new(BindParser::new().context("initializing bind parser")?),
        other => bail!("unrecognized parser class '{other}'"),
    };
    for (key, value) in &raw.properties {
        let value = property_string(value)
            .with_context(|| format!("parser property '{key}'"))?;
        parser
            .set(key, value)
            .with_context(|| format!("parser property '{key}'"))?;
    }
    Ok(parser)
}

fn unpack_sender(raw: RawComponent) -> anyhow::Result<Box<dyn Sender>> {
    let mut sender: Box<dyn Sender> = match raw.class.as_str() {
        "elk" => Box::new(ElkSender::new()),
        other => bail!("unrecognized sender class '{other}'"),
    };
    for (key, value) in &raw.properties {
        let value = property_string(value)
            .with_context(|| format!("sender property '{key}'"))?;
        sender
            .set(key, value)
            .with_context(|| format!("sender property '{key}'"))?;
    }
    Ok(sender)
}

fn property_string(value: &Value) -> anyhow::Result<&str> {
    value.as_str().context("must be a string")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(json: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(json.as_bytes()).unwrap();
        f
    }

    fn valid_config(dir: &Path) -> String {
        let log = dir.join("app.log");
        std::fs::write(&log, "").unwrap();
        format!(
            r#"{{
                "log_level": "verbose",
                "flumes": [{{
                    "reader": {{"class": "file", "path": "{}"}},
                    "parser": {{"class": "sshd"}},
                    "sender": {{"class": "elk", "server": "localhost:9999",
                                "logowner": "ops", "application": "sshd"}}
                }}]
            }}"#,
            log.display()
        )
    }

    #[test]
    fn binds_a_complete_config() {
        let dir = tempfile::tempdir().unwrap();
        let f = write_config(&valid_config(dir.path()));
        let config = load(f.path()).unwrap();
        assert_eq!(config.log_level, Some(LogLevel::Verbose));
        assert_eq!(
            config.flume.sender.get("logowner").as_deref(),
            Some("ops")
        );
    }

    #[test]
    fn rejects_unknown_top_level_key() {
        let f = write_config(r#"{"flumes": [], "surprise": 1}"#);
        assert!(load(f.path()).is_err());
    }

    #[test]
    fn rejects_zero_and_multiple_flumes() {
        let f = write_config(r#"{"flumes": []}"#);
        let err = format!("{:#}", load(f.path()).unwrap_err());
        assert!(err.contains("at least one flume"));

        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("app.log");
        std::fs::write(&log, "").unwrap();
        let flume = format!(
            r#"{{"reader": {{"class": "file", "path": "{}"}},
                "parser": {{"class": "sshd"}},
                "sender": {{"class": "elk"}}}}"#,
            log.display()
        );
        let f = write_config(&format!(r#"{{"flumes": [{flume}, {flume}]}}"#));
        let err = format!("{:#}", load(f.path()).unwrap_err());
        assert!(err.contains("multiple flumes"));
    }

    #[test]
    fn rejects_unknown_class() {
        let f = write_config(
            r#"{"flumes": [{
                "reader": {"class": "carrier-pigeon"},
                "parser": {"class": "sshd"},
                "sender": {"class": "elk"}
            }]}"#,
        );
        let err = format!("{:#}", load(f.path()).unwrap_err());
        assert!(err.contains("unrecognized reader class"));
    }

    #[test]
    fn rejects_non_string_property() {
        let f = write_config(
            r#"{"flumes": [{
                "reader": {"class": "file", "path": 7},
                "parser": {"class": "sshd"},
                "sender": {"class": "elk"}
            }]}"#,
        );
        let err = format!("{:#}", load(f.path()).unwrap_err());
        assert!(err.contains("must be a string"));
    }

    #[test]
    fn rejects_unknown_property() {
        let f = write_config(
            r#"{"flumes": [{
                "reader": {"class": "file"},
                "parser": {"class": "sshd", "dialect": "modern"},
                "sender": {"class": "elk"}
            }]}"#,
        );
        let err = format!("{:#}", load(f.path()).unwrap_err());
        assert!(err.contains("parser property 'dialect'"));
    }

    #[test]
    fn level_names_are_exact() {
        let f = write_config(r#"{"flumes": [], "log_level": "chatty"}"#);
        assert!(load(f.path()).is_err());
    }
}
