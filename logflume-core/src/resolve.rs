// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Endpoint parsing and resolution for the streaming socket.
//!
//! An endpoint is written `host[:port]`, with bracketed IPv6 literals
//! (`[::1]:80`) tolerated so the colons of the literal do not collide with
//! the port separator.

use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("missing ']' in bracketed address literal")]
    UnterminatedLiteral,
    #[error("invalid port in endpoint")]
    Port,
    #[error("resolution failed: {0}")]
    Resolution(#[source] io::Error),
    #[error("connection failed: {0}")]
    Connect(#[source] io::Error),
}

/// Splits an endpoint into host and port sections. When the endpoint names
/// no port, `default_port` fills in; a zero default means "no port".
pub fn split_endpoint(
    addr: &str,
    default_port: u16,
) -> Result<(String, Option<String>), ResolveError> {
    let (host, rest) = if let Some(literal) = addr.strip_prefix('[') {
        let (host, rest) = literal
            .split_once(']')
            .ok_or(ResolveError::UnterminatedLiteral)?;
        (host.to_owned(), rest)
    } else {
        match addr.split_once(':') {
            Some((host, port)) => (host.to_owned(), port),
            None => (addr.to_owned(), ""),
        }
    };
    let service = match rest {
        "" => {
            if default_port == 0 {
                None
            } else {
                Some(default_port.to_string())
            }
        }
        // tolerate one separator character before the port section
        s => Some(s.strip_prefix(':').unwrap_or(s).to_owned()),
    };
    Ok((host, service))
}

/// Address-family hint for resolution; `None` accepts both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrFamily {
    V4,
    V6,
}

/// Resolves an endpoint into an ordered candidate list via the system
/// resolver, stream sockets only, optionally restricted to one family.
pub fn resolve(
    addr: &str,
    default_port: u16,
    family: Option<AddrFamily>,
) -> Result<Vec<SocketAddr>, ResolveError> {
    let (host, service) = split_endpoint(addr, default_port)?;
    let port: u16 = match service {
        Some(s) => s.parse().map_err(|_| ResolveError::Port)?,
        None => return Err(ResolveError::Port),
    };
    if port == 0 {
        return Err(ResolveError::Port);
    }
    let candidates = (host.as_str(), port)
        .to_socket_addrs()
        .map_err(ResolveError::Resolution)?;
    Ok(candidates
        .filter(|a| match family {
            None => true,
            Some(AddrFamily::V4) => a.is_ipv4(),
            Some(AddrFamily::V6) => a.is_ipv6(),
        })
        .collect())
}

/// Establishes a TCP connection to the endpoint, trying each resolved
/// candidate in turn until one succeeds or the list is exhausted.
pub fn connect(
    addr: &str,
    default_port: u16,
    family: Option<AddrFamily>,
) -> Result<TcpStream, ResolveError> {
    let candidates = resolve(addr, default_port, family)?;
    let mut last = None;
    for candidate in candidates {
        match TcpStream::connect(candidate) {
            Ok(stream) => return Ok(stream),
            Err(e) => last = Some(e),
        }
    }
    Err(ResolveError::Connect(last.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, "no addresses resolved")
    })))
}
