// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! ELK-style sender: one long-lived TCP (optionally TLS) stream carrying
//! compact JSON objects, one per line.
//!
//! Every transmission ends with exactly one newline, even when the object
//! serialization failed partway: the downstream collector frames on
//! newline, so the terminator bounds the damage to one record and
//! resynchronizes the stream.

use super::{SendError, Sender};
use crate::component::PropertyError;
use logflume_core::record::Event;
use logflume_core::socket::StreamSocket;
use std::io;
use tracing::debug;

pub struct ElkSender {
    template: Event,
    socket: Option<StreamSocket>,
    cert: Option<String>,
}

impl ElkSender {
    pub fn new() -> Self {
        ElkSender {
            template: Event::new(),
            socket: None,
            cert: None,
        }
    }

    /// Creates the socket for a destination and, if a certificate was
    /// configured first, provisions TLS on it.
    fn set_server(&mut self, target: &str) -> Result<(), PropertyError> {
        let mut socket = StreamSocket::new(target);
        if let Some(cert) = self.cert.clone() {
            Self::apply_cert(&mut socket, &cert)?;
        }
        self.socket = Some(socket);
        Ok(())
    }

    fn set_cert(&mut self, path: &str) -> Result<(), PropertyError> {
        if let Some(socket) = &mut self.socket {
            Self::apply_cert(socket, path)?;
        }
        self.cert = Some(path.to_owned());
        Ok(())
    }

    fn apply_cert(socket: &mut StreamSocket, path: &str) -> Result<(), PropertyError> {
        socket
            .use_tls()
            .and_then(|()| socket.use_cert(path))
            .map_err(|e| PropertyError::invalid("cert", e))
    }
}

impl Default for ElkSender {
    fn default() -> Self {
        Self::new()
    }
}

impl Sender for ElkSender {
    fn set(&mut self, key: &str, value: &str) -> Result<(), PropertyError> {
        match key {
            "server" => self.set_server(value),
            "cert" => self.set_cert(value),
            "logowner" | "application" => {
                self.template.set_str(key, value);
                Ok(())
            }
            _ => Err(PropertyError::Unknown(key.to_owned())),
        }
    }

    fn get(&self, key: &str) -> Option<String> {
        match key {
            "server" => self.socket.as_ref().map(|s| s.target().to_owned()),
            "cert" => self.cert.clone(),
            "logowner" | "application" => self.template.get_str(key).map(str::to_owned),
            _ => None,
        }
    }

    fn send(&mut self, event: &Event) -> Result<(), SendError> {
        let socket = self.socket.as_mut().ok_or(SendError::Unconfigured)?;
        if !socket.connected() {
            socket.reopen()?;
            debug!("reconnected to {}", socket.target());
        }
        // overlay the template; its fields win on collision
        let mut tx = event.clone();
        tx.update_from(&self.template);
        let mut writer = ChunkWriter { socket };
        write_framed(&tx, &mut writer)
    }
}

/// Streams the object, then the frame terminator. The terminator goes out
/// even when the object failed partway; success requires both.
fn write_framed<W: io::Write>(event: &Event, w: &mut W) -> Result<(), SendError> {
    let res = event.write_json(&mut *w);
    let newline = w.write_all(b"\n");
    res?;
    newline.map_err(SendError::Transmit)?;
    Ok(())
}

/// Forwards each serializer chunk as one socket write.
struct ChunkWriter<'a> {
    socket: &'a mut StreamSocket,
}

impl io::Write for ChunkWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.socket
            .write(buf)
            .map_err(io::Error::other)
            .map(|()| buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
