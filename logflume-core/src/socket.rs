// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Streaming byte channel to a remote endpoint, optionally TLS-protected.
//!
//! TLS readiness is tracked separately from TCP connectedness:
//!
//! ```text
//!   disabled ─(use_tls)─▶ enabled ─(open ok)─▶ connected
//!                            ▲                    │
//!                            └──── (close) ── failed (fatal protocol error)
//! ```
//!
//! The credentials handle survives connection failures, so a failed session
//! can be reopened without re-provisioning trust.

use crate::resolve::{self, ResolveError};
use rustls::pki_types::{InvalidDnsNameError, PrivateKeyDer, ServerName};
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};
use std::io::{self, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::time::Duration;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    #[error("socket is already open")]
    AlreadyOpen,
    #[error("socket is not connected")]
    NotConnected,
    #[error("TLS cannot be reconfigured in this state")]
    TlsState,
    #[error("no usable roots in the system trust store")]
    EmptyTrustStore,
    #[error("unusable certificate file: {0}")]
    Certificate(String),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("invalid server name in target")]
    ServerName(#[from] InvalidDnsNameError),
    #[error("TLS failure: {0}")]
    Tls(#[from] rustls::Error),
    #[error("I/O failure: {0}")]
    Io(#[from] io::Error),
}

/// Trust material carried across connections.
#[derive(Clone)]
struct TlsContext {
    roots: RootCertStore,
    config: Arc<ClientConfig>,
}

enum TlsState {
    Disabled,
    Enabled(TlsContext),
    Connected(TlsContext),
    Failed(TlsContext),
}

enum Transport {
    Plain(TcpStream),
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
}

/// A write-only streaming socket owning at most one connection at a time.
pub struct StreamSocket {
    target: String,
    transport: Option<Transport>,
    last_error: Option<io::ErrorKind>,
    tls: TlsState,
}

impl StreamSocket {
    /// Records the endpoint; no network activity happens until [`open`].
    ///
    /// [`open`]: StreamSocket::open
    pub fn new(target: &str) -> Self {
        StreamSocket {
            target: target.to_owned(),
            transport: None,
            last_error: None,
            tls: TlsState::Disabled,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn last_error(&self) -> Option<io::ErrorKind> {
        self.last_error
    }

    /// Provisions TLS credentials trusting the system root store. A no-op
    /// unless the socket is closed and TLS is currently disabled. On
    /// failure TLS stays disabled and the socket remains usable in
    /// plaintext.
    pub fn use_tls(&mut self) -> Result<(), SocketError> {
        if self.transport.is_some() || !matches!(self.tls, TlsState::Disabled) {
            return Ok(());
        }
        let loaded = rustls_native_certs::load_native_certs();
        let mut roots = RootCertStore::empty();
        let (added, _ignored) = roots.add_parsable_certificates(loaded.certs);
        if added == 0 {
            return Err(SocketError::EmptyTrustStore);
        }
        let config = ClientConfig::builder()
            .with_root_certificates(roots.clone())
            .with_no_client_auth();
        self.tls = TlsState::Enabled(TlsContext {
            roots,
            config: Arc::new(config),
        });
        Ok(())
    }

    /// Loads a client certificate and key from one PEM file. Only legal
    /// after [`use_tls`] succeeded and before [`open`].
    ///
    /// [`use_tls`]: StreamSocket::use_tls
    /// [`open`]: StreamSocket::open
    pub fn use_cert(&mut self, path: &str) -> Result<(), SocketError> {
        let ctx = match (&self.tls, self.transport.is_some()) {
            (TlsState::Enabled(ctx), false) => ctx,
            _ => return Err(SocketError::TlsState),
        };
        let pem = std::fs::read(path)
            .map_err(|e| SocketError::Certificate(format!("{path}: {e}")))?;
        let certs = rustls_pemfile::certs(&mut pem.as_slice())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| SocketError::Certificate(format!("{path}: {e}")))?;
        let key: PrivateKeyDer<'static> = rustls_pemfile::private_key(&mut pem.as_slice())
            .map_err(|e| SocketError::Certificate(format!("{path}: {e}")))?
            .ok_or_else(|| SocketError::Certificate(format!("{path}: no private key")))?;
        if certs.is_empty() {
            return Err(SocketError::Certificate(format!("{path}: no certificate")));
        }
        let config = ClientConfig::builder()
            .with_root_certificates(ctx.roots.clone())
            .with_client_auth_cert(certs, key)?;
        self.tls = TlsState::Enabled(TlsContext {
            roots: ctx.roots.clone(),
            config: Arc::new(config),
        });
        Ok(())
    }

    /// Resolves the target, connects, and if TLS is enabled drives the
    /// handshake to completion. A fatal handshake error closes the TCP
    /// connection and leaves TLS in the failed state.
    pub fn open(&mut self) -> Result<(), SocketError> {
        if self.transport.is_some() {
            return Err(SocketError::AlreadyOpen);
        }
        let tcp = match resolve::connect(&self.target, 0, None) {
            Ok(tcp) => tcp,
            Err(e) => {
                self.last_error = Some(io::ErrorKind::ConnectionRefused);
                return Err(e.into());
            }
        };
        match std::mem::replace(&mut self.tls, TlsState::Disabled) {
            TlsState::Disabled => {
                self.transport = Some(Transport::Plain(tcp));
            }
            TlsState::Enabled(ctx) | TlsState::Connected(ctx) | TlsState::Failed(ctx) => {
                match Self::handshake(&ctx, &self.target, tcp) {
                    Ok(stream) => {
                        self.transport = Some(Transport::Tls(Box::new(stream)));
                        self.tls = TlsState::Connected(ctx);
                    }
                    Err(e) => {
                        self.last_error = Some(io::ErrorKind::InvalidData);
                        self.tls = TlsState::Failed(ctx);
                        return Err(e);
                    }
                }
            }
        }
        self.last_error = None;
        Ok(())
    }

    fn handshake(
        ctx: &TlsContext,
        target: &str,
        mut tcp: TcpStream,
    ) -> Result<StreamOwned<ClientConnection, TcpStream>, SocketError> {
        let (host, _) = resolve::split_endpoint(target, 0)?;
        let name = ServerName::try_from(host)?;
        let mut conn = ClientConnection::new(Arc::clone(&ctx.config), name)?;
        tcp.set_read_timeout(Some(HANDSHAKE_TIMEOUT))?;
        tcp.set_write_timeout(Some(HANDSHAKE_TIMEOUT))?;
        while conn.is_handshaking() {
            match conn.complete_io(&mut tcp) {
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        tcp.set_read_timeout(None)?;
        tcp.set_write_timeout(None)?;
        Ok(StreamOwned::new(conn, tcp))
    }

    /// Tears down the connection. A connected TLS session gets a
    /// bidirectional shutdown, errors tolerated; the TLS state returns to
    /// enabled if it was ever enabled.
    pub fn close(&mut self) {
        if let Some(transport) = self.transport.take() {
            match transport {
                Transport::Plain(tcp) => {
                    let _ = tcp.shutdown(Shutdown::Both);
                }
                Transport::Tls(mut stream) => {
                    if matches!(self.tls, TlsState::Connected(_)) {
                        stream.conn.send_close_notify();
                        let _ = stream.flush();
                    }
                    let _ = stream.sock.shutdown(Shutdown::Both);
                }
            }
        }
        self.tls = match std::mem::replace(&mut self.tls, TlsState::Disabled) {
            TlsState::Connected(ctx) | TlsState::Failed(ctx) => TlsState::Enabled(ctx),
            other => other,
        };
        self.last_error = None;
    }

    pub fn reopen(&mut self) -> Result<(), SocketError> {
        self.close();
        self.open()
    }

    /// Writes the whole buffer, retrying partial writes and transient
    /// interruptions. Either all bytes are written or an error is returned;
    /// a fatal error records itself and fails the TLS session.
    pub fn write(&mut self, buf: &[u8]) -> Result<(), SocketError> {
        let res = match self.transport.as_mut() {
            None => return Err(SocketError::NotConnected),
            Some(t) => write_all(t, buf),
        };
        if let Err(e) = res {
            self.last_error = Some(e.kind());
            self.tls = match std::mem::replace(&mut self.tls, TlsState::Disabled) {
                TlsState::Connected(ctx) => TlsState::Failed(ctx),
                other => other,
            };
            return Err(e.into());
        }
        Ok(())
    }

    /// True iff TCP is open, no write has failed, and TLS is either
    /// disabled or fully established.
    pub fn connected(&self) -> bool {
        self.transport.is_some()
            && self.last_error.is_none()
            && matches!(self.tls, TlsState::Disabled | TlsState::Connected(_))
    }
}

impl Drop for StreamSocket {
    fn drop(&mut self) {
        self.close();
    }
}

fn write_all(transport: &mut Transport, buf: &[u8]) -> io::Result<()> {
    let mut sent = 0;
    while sent < buf.len() {
        let res = match transport {
            Transport::Plain(tcp) => tcp.write(&buf[sent..]),
            Transport::Tls(stream) => stream.write(&buf[sent..]),
        };
        match res {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "connection closed by peer",
                ))
            }
            Ok(n) => sent += n,
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
                ) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
