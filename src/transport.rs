// Parlance - A multi-dialect Statsd transport for Rust!
//
// Copyright 2015-2021 Nick Pillitteri
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::dialect::Dialect;
use crate::encoder::PacketEncoder;
use crate::net::{Endpoint, SocketManager};
use crate::types::{Observation, TransportResult};
use log::{error, warn};
use rand::Rng;
use std::fmt;
use std::panic::RefUnwindSafe;
use std::sync::{Mutex, TryLockError};

/// Source of uniform random values in `[0, 1)` driving the sampling gate.
///
/// The default implementation uses the thread-local generator from the
/// `rand` crate. Supplying a custom implementation through the builder is
/// mostly useful for tests that need deterministic sampling decisions.
pub trait Sampling {
    fn roll(&self) -> f64;
}

/// Default `Sampling` implementation backed by `rand::thread_rng()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngSampler;

impl Sampling for ThreadRngSampler {
    fn roll(&self) -> f64 {
        rand::thread_rng().gen()
    }
}

/// Builder for creating and customizing `UdpTransport` instances.
///
/// Instances of the builder should be created by calling the `::builder()`
/// method on the `UdpTransport` struct.
///
/// # Example
///
/// ```no_run
/// use parlance::{Dialect, Observation, UdpTransport};
///
/// let transport = UdpTransport::builder("statsd.example.com:8125")
///     .with_dialect(Dialect::Datadog)
///     .build();
///
/// transport.collect(&Observation::counter("some.counter", 1));
/// ```
#[must_use]
pub struct UdpTransportBuilder {
    endpoint: Endpoint,
    dialect: Dialect,
    sampler: Box<dyn Sampling + Sync + Send + RefUnwindSafe>,
}

impl UdpTransportBuilder {
    fn new(connection: &str) -> Self {
        UdpTransportBuilder {
            endpoint: Endpoint::from_connection_string(connection),
            dialect: Dialect::default(),
            sampler: Box::new(ThreadRngSampler),
        }
    }

    /// Set the wire dialect packets are encoded with.
    ///
    /// The dialect is fixed for the lifetime of the transport. There is no
    /// process-wide default to mutate: a transport that doesn't pick one
    /// explicitly speaks the baseline `statsd` dialect.
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Set the source of random values used for sampling decisions.
    pub fn with_sampler<S>(mut self, sampler: S) -> Self
    where
        S: Sampling + Sync + Send + RefUnwindSafe + 'static,
    {
        self.sampler = Box::new(sampler);
        self
    }

    /// Construct a new `UdpTransport` instance based on current settings.
    pub fn build(self) -> UdpTransport {
        UdpTransport {
            dialect: self.dialect,
            sockets: SocketManager::new(self.endpoint),
            sampler: self.sampler,
            lock: Mutex::new(()),
        }
    }
}

impl Default for UdpTransportBuilder {
    fn default() -> Self {
        UdpTransportBuilder {
            endpoint: Endpoint::default(),
            dialect: Dialect::default(),
            sampler: Box::new(ThreadRngSampler),
        }
    }
}

/// Transport that emits observations as UDP datagrams, one per packet.
///
/// The transport is the last step before the network: it applies the
/// sampling gate, checks the observation kind against the configured
/// dialect, renders the wire bytes, and performs a single best-effort
/// datagram write. There is no buffering, batching, retrying, or delivery
/// guarantee of any sort beyond what UDP itself provides.
///
/// # Failure Behavior
///
/// The `collect` method is total. Environmental failures, an unreachable
/// or unresolvable destination, a refused connection, or any other socket
/// level fault, are logged at error severity and reported as a `false`
/// return value. They never panic and never surface as `Err` values to
/// instrumented code.
///
/// # Threading
///
/// A transport can be shared freely between threads (it is `Send` and
/// `Sync`). Datagram writes are serialized by an internal lock so that
/// concurrent sends don't interleave. The lock is only ever acquired with
/// a non-blocking attempt: a caller that loses the race sends without the
/// lock rather than waiting. This deliberately trades the serialization
/// guarantee for forward progress, since some calling contexts (a signal
/// handler firing during shutdown, say) can't afford to block on a lock
/// at all, and a rare interleaved write is a better outcome than a hung
/// process or a silently dropped metric.
///
/// # Example
///
/// ```no_run
/// use parlance::{Dialect, MetadataKey, Observation, UdpTransport};
///
/// let transport = UdpTransport::builder("localhost:8125")
///     .with_dialect(Dialect::Datadog)
///     .build();
///
/// transport.collect(&Observation::counter("requests.handled", 1));
/// transport.collect(&Observation::timer("request.duration", 42));
/// transport.collect(
///     &Observation::event("deploys", "rolled out v2")
///         .with_metadata(MetadataKey::Hostname, "web01.example.com"),
/// );
/// ```
pub struct UdpTransport {
    dialect: Dialect,
    sockets: SocketManager,
    sampler: Box<dyn Sampling + Sync + Send + RefUnwindSafe>,
    lock: Mutex<()>,
}

impl UdpTransport {
    /// Create a transport sending to the given `"host:port"` endpoint,
    /// speaking the baseline `statsd` dialect.
    ///
    /// Endpoint parsing is best effort, a malformed port coerces to port 0
    /// instead of failing. No socket is created until the first send, so
    /// construction itself cannot fail.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use parlance::UdpTransport;
    ///
    /// let transport = UdpTransport::new("localhost:8125");
    /// ```
    pub fn new(connection: &str) -> UdpTransport {
        Self::builder(connection).build()
    }

    /// Create a new builder with the provided `"host:port"` endpoint.
    ///
    /// All optional customizations, the dialect and the sampling source,
    /// can be set by calling methods on the returned builder. Anything not
    /// set by the caller uses defaults.
    pub fn builder(connection: &str) -> UdpTransportBuilder {
        UdpTransportBuilder::new(connection)
    }

    /// Dialect this transport encodes packets with
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Endpoint datagrams are currently sent to
    pub fn endpoint(&self) -> Endpoint {
        self.sockets.endpoint()
    }

    /// Point the transport at a new `"host:port"` endpoint.
    ///
    /// The current socket is dropped lazily: the next send connects a
    /// fresh one to the new endpoint. Reconfiguring a transport is meant
    /// for setup time. A reconfiguration racing in-flight sends only
    /// guarantees that sends eventually use the new endpoint, not that the
    /// change and any particular send are atomic.
    pub fn configure(&self, connection: &str) {
        self.sockets.configure(connection);
    }

    /// Change the destination host, keeping the port.
    pub fn set_host(&self, host: &str) {
        self.sockets.set_host(host);
    }

    /// Change the destination port, keeping the host.
    pub fn set_port(&self, port: u16) {
        self.sockets.set_port(port);
    }

    /// Emit a single observation, returning whether a packet was actually
    /// put on the wire.
    ///
    /// A `false` return means one of:
    ///
    /// * The observation kind isn't supported by the configured dialect
    ///   (logged as a warning, since it points at an instrumentation bug).
    /// * The observation was sampled out (not logged, sampling drops are
    ///   routine operation rather than errors).
    /// * The send failed at the socket level (logged at error severity).
    ///
    /// This method never panics for environmental failures and never
    /// blocks beyond the duration of one datagram write.
    pub fn collect(&self, observation: &Observation) -> bool {
        if !self.dialect.supports(observation.kind()) {
            warn!(
                "Metric type {} not supported by the {} dialect",
                observation.kind(),
                self.dialect
            );
            return false;
        }

        let rate = observation.sample_rate();
        if rate < 1.0 && self.sampler.roll() > rate {
            return false;
        }

        let packet = PacketEncoder::new(observation, self.dialect).encode();
        let sent = match self.lock.try_lock() {
            Ok(_guard) => self.send_guarded(&packet),
            Err(TryLockError::Poisoned(poisoned)) => {
                // A previous sender panicked mid-write. The socket itself
                // is still usable, so claim the guard and carry on.
                let _guard = poisoned.into_inner();
                self.send_guarded(&packet)
            }
            // The lock is held by another sender and this context must
            // not wait for it. Sending without the guard may interleave
            // two packets but keeps the metric and the caller alive.
            Err(TryLockError::WouldBlock) => self.send_unguarded(&packet),
        };

        match sent {
            Ok(written) => written > 0,
            Err(e) => {
                error!("Failed to send metric packet: {}", e);
                false
            }
        }
    }

    fn send_guarded(&self, packet: &str) -> TransportResult<usize> {
        let socket = self.sockets.socket()?;
        Ok(socket.send(packet.as_bytes())?)
    }

    fn send_unguarded(&self, packet: &str) -> TransportResult<usize> {
        let socket = self.sockets.try_socket()?;
        Ok(socket.send(packet.as_bytes())?)
    }
}

impl Default for UdpTransport {
    /// Create a transport sending to `localhost:8125` with the baseline
    /// `statsd` dialect.
    fn default() -> Self {
        UdpTransportBuilder::default().build()
    }
}

impl fmt::Debug for UdpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "UdpTransport {{ dialect: {:?}, endpoint: {:?}, sampler: ... }}",
            self.dialect,
            self.sockets.endpoint(),
        )
    }
}
