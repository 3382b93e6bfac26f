// Parlance - A multi-dialect Statsd transport for Rust!
//
// Copyright 2015-2021 Nick Pillitteri
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::types::{ErrorKind, TransportError, TransportResult};
use std::fmt;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::{Arc, RwLock};

/// Host and port that metric datagrams are sent to.
///
/// Endpoints are usually parsed from a single `"host:port"` connection
/// string. Parsing is best effort: a missing or malformed port coerces to
/// port 0 instead of failing, leaving any resulting connect failure to be
/// reported (and suppressed) on the first send.
///
/// # Example
///
/// ```
/// use parlance::Endpoint;
///
/// let endpoint = Endpoint::from_connection_string("statsd.example.com:8125");
///
/// assert_eq!("statsd.example.com", endpoint.host());
/// assert_eq!(8125, endpoint.port());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    pub fn new<H: Into<String>>(host: H, port: u16) -> Endpoint {
        Endpoint {
            host: host.into(),
            port,
        }
    }

    /// Parse a `"host:port"` connection string, splitting at the first
    /// colon. Anything that doesn't parse as a port becomes port 0.
    pub fn from_connection_string(connection: &str) -> Endpoint {
        let (host, port) = match connection.split_once(':') {
            Some((host, port)) => (host, port.parse().unwrap_or(0)),
            None => (connection, 0),
        };
        Endpoint::new(host, port)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Endpoint::new("localhost", crate::DEFAULT_PORT)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Owner of the single outbound UDP socket for a transport.
///
/// The socket is created lazily, on the first request after construction
/// or after the endpoint changed, and stays connected until the endpoint
/// changes again. Send errors do not invalidate it: the next send reuses
/// the same handle.
#[derive(Debug)]
pub(crate) struct SocketManager {
    inner: RwLock<SocketState>,
}

#[derive(Debug)]
struct SocketState {
    endpoint: Endpoint,
    socket: Option<Arc<UdpSocket>>,
}

impl SocketManager {
    pub(crate) fn new(endpoint: Endpoint) -> SocketManager {
        SocketManager {
            inner: RwLock::new(SocketState { endpoint, socket: None }),
        }
    }

    pub(crate) fn endpoint(&self) -> Endpoint {
        self.inner.read().unwrap().endpoint.clone()
    }

    /// Replace both endpoint fields from a `"host:port"` connection string
    /// and invalidate the current socket.
    pub(crate) fn configure(&self, connection: &str) {
        self.replace_endpoint(Endpoint::from_connection_string(connection));
    }

    pub(crate) fn set_host(&self, host: &str) {
        let port = self.endpoint().port();
        self.replace_endpoint(Endpoint::new(host, port));
    }

    pub(crate) fn set_port(&self, port: u16) {
        let host = self.endpoint().host().to_string();
        self.replace_endpoint(Endpoint::new(host, port));
    }

    /// Drop the cached socket so the next send creates a fresh one.
    pub(crate) fn invalidate(&self) {
        self.inner.write().unwrap().socket = None;
    }

    fn replace_endpoint(&self, endpoint: Endpoint) {
        let mut state = self.inner.write().unwrap();
        state.endpoint = endpoint;
        state.socket = None;
    }

    /// Return the current socket, creating and connecting one if there is
    /// no cached handle.
    pub(crate) fn socket(&self) -> TransportResult<Arc<UdpSocket>> {
        if let Some(socket) = self.inner.read().unwrap().socket.clone() {
            return Ok(socket);
        }

        let mut state = self.inner.write().unwrap();
        // Another caller may have created the socket while we waited
        // for the write half of the lock
        if let Some(socket) = state.socket.clone() {
            return Ok(socket);
        }

        let socket = Arc::new(connect(&state.endpoint)?);
        state.socket = Some(socket.clone());
        Ok(socket)
    }

    /// Same as `socket()` but never waits for the internal lock. Used by
    /// the degraded send path where the caller must not block.
    pub(crate) fn try_socket(&self) -> TransportResult<Arc<UdpSocket>> {
        if let Ok(state) = self.inner.try_read() {
            if let Some(socket) = state.socket.clone() {
                return Ok(socket);
            }
        } else {
            return Err(lock_unavailable());
        }

        match self.inner.try_write() {
            Ok(mut state) => {
                if let Some(socket) = state.socket.clone() {
                    return Ok(socket);
                }
                let socket = Arc::new(connect(&state.endpoint)?);
                state.socket = Some(socket.clone());
                Ok(socket)
            }
            Err(_) => Err(lock_unavailable()),
        }
    }
}

fn lock_unavailable() -> TransportError {
    TransportError::from(io::Error::new(
        io::ErrorKind::WouldBlock,
        "socket state locked by another caller",
    ))
}

/// Attempt to convert the endpoint into a concrete `SocketAddr` instance,
/// returning an `InvalidInput` error if the address could not be resolved.
fn resolve_addr(endpoint: &Endpoint) -> TransportResult<SocketAddr> {
    match (endpoint.host(), endpoint.port()).to_socket_addrs()?.next() {
        Some(addr) => Ok(addr),
        None => Err(TransportError::from((
            ErrorKind::InvalidInput,
            "No socket addresses yielded",
        ))),
    }
}

/// Create a non-blocking UDP socket with the endpoint set as its default
/// destination. A UDP connect performs no handshake, so this cannot fail
/// just because nothing is listening on the other side.
fn connect(endpoint: &Endpoint) -> TransportResult<UdpSocket> {
    let addr = resolve_addr(endpoint)?;
    let bind_addr: SocketAddr = match addr {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    };

    let socket = UdpSocket::bind(bind_addr)?;
    socket.connect(addr)?;
    socket.set_nonblocking(true)?;
    Ok(socket)
}

#[cfg(test)]
mod tests {
    use super::{Endpoint, SocketManager};
    use std::sync::Arc;

    #[test]
    fn test_endpoint_from_connection_string() {
        let endpoint = Endpoint::from_connection_string("statsd.example.com:8125");

        assert_eq!("statsd.example.com", endpoint.host());
        assert_eq!(8125, endpoint.port());
    }

    #[test]
    fn test_endpoint_malformed_port_becomes_zero() {
        let endpoint = Endpoint::from_connection_string("statsd.example.com:bogus");

        assert_eq!("statsd.example.com", endpoint.host());
        assert_eq!(0, endpoint.port());
    }

    #[test]
    fn test_endpoint_missing_port_becomes_zero() {
        let endpoint = Endpoint::from_connection_string("statsd.example.com");

        assert_eq!("statsd.example.com", endpoint.host());
        assert_eq!(0, endpoint.port());
    }

    #[test]
    fn test_endpoint_display() {
        let endpoint = Endpoint::new("localhost", 8125);
        assert_eq!("localhost:8125", endpoint.to_string());
    }

    #[test]
    fn test_endpoint_default() {
        let endpoint = Endpoint::default();
        assert_eq!("localhost:8125", endpoint.to_string());
    }

    #[test]
    fn test_socket_manager_caches_socket() {
        let manager = SocketManager::new(Endpoint::new("127.0.0.1", 8125));

        let first = manager.socket().unwrap();
        let second = manager.socket().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_socket_manager_endpoint_change_invalidates() {
        let manager = SocketManager::new(Endpoint::new("127.0.0.1", 8125));

        let first = manager.socket().unwrap();
        manager.set_port(8126);
        let second = manager.socket().unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(8126, manager.endpoint().port());
    }

    #[test]
    fn test_socket_manager_configure_replaces_endpoint() {
        let manager = SocketManager::new(Endpoint::default());
        manager.configure("127.0.0.2:9125");

        assert_eq!("127.0.0.2", manager.endpoint().host());
        assert_eq!(9125, manager.endpoint().port());
    }

    #[test]
    fn test_socket_manager_set_host_keeps_port() {
        let manager = SocketManager::new(Endpoint::new("127.0.0.1", 8125));
        manager.set_host("127.0.0.2");

        assert_eq!("127.0.0.2", manager.endpoint().host());
        assert_eq!(8125, manager.endpoint().port());
    }

    #[test]
    fn test_socket_manager_invalidate_forces_new_socket() {
        let manager = SocketManager::new(Endpoint::new("127.0.0.1", 8125));

        let first = manager.socket().unwrap();
        manager.invalidate();
        let second = manager.socket().unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_socket_manager_unresolvable_host() {
        let manager = SocketManager::new(Endpoint::new("statsd.test.invalid", 8125));
        assert!(manager.socket().is_err());
    }

    #[test]
    fn test_socket_manager_try_socket_uncontended() {
        let manager = SocketManager::new(Endpoint::new("127.0.0.1", 8125));

        let first = manager.try_socket().unwrap();
        let second = manager.socket().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
    }
}
