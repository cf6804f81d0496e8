// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The logflume daemon: a three-stage pipeline (read, parse, send) wired
//! together by bounded lossy queues, converting free-form log records into
//! newline-delimited JSON events for an indexing backend.

pub mod component;
pub mod config;
pub mod flume;
pub mod logging;
pub mod parser;
pub mod pidfile;
pub mod reader;
pub mod sender;
