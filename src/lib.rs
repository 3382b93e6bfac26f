// Parlance - A multi-dialect Statsd transport for Rust!
//
// Copyright 2015-2021 Nick Pillitteri
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A multi-dialect Statsd transport for Rust!
//!
//! Parlance is the wire end of a metrics pipeline: it turns one in-memory
//! observation at a time into the exact bytes of a Statsd packet and fires
//! it at a collector agent over UDP, best effort, one datagram per metric.
//!
//! ## Features
//!
//! * Support for emitting counters, gauges, timers, histograms, sets,
//!   key-value metrics, events, and service checks.
//! * Three compatible wire dialects: baseline `statsd`, `datadog` (tags,
//!   events, and service checks), and `statsite` (key-value metrics,
//!   newline terminated packets).
//! * Client-side sampling with the rate encoded into the packet.
//! * A total send API that never panics on network failures, safe to call
//!   from anywhere in an application, including contexts that must not
//!   block on a lock.
//!
//! ## Install
//!
//! To make use of `parlance` in your project, add it as a dependency in
//! your `Cargo.toml` file.
//!
//! ```toml
//! [dependencies]
//! parlance = "x.y.z"
//! ```
//!
//! That's all you need!
//!
//! ## Usage
//!
//! ### Simple Use
//!
//! Create a transport pointed at your collector and hand it observations.
//! The boolean returned by `collect` tells you whether a packet actually
//! hit the wire.
//!
//! ```rust,no_run
//! use parlance::{Observation, UdpTransport};
//!
//! let transport = UdpTransport::new("metrics.example.com:8125");
//!
//! transport.collect(&Observation::counter("some.counter", 1));
//! transport.collect(&Observation::timer("some.method_call", 42));
//! transport.collect(&Observation::gauge("some.thing", 7_u64));
//! transport.collect(&Observation::set("users.uniques", 42));
//! ```
//!
//! ### Dialects
//!
//! Not every server speaks the same protocol. The dialect chosen at
//! construction decides which metric kinds the transport accepts and the
//! exact packet layout. Histograms, events, service checks, and tags need
//! the `datadog` dialect, key-value metrics need `statsite`, and anything
//! else works everywhere.
//!
//! ```rust,no_run
//! use parlance::{Dialect, MetadataKey, Observation, UdpTransport};
//!
//! let transport = UdpTransport::builder("agent.local:8125")
//!     .with_dialect(Dialect::Datadog)
//!     .build();
//!
//! transport.collect(&Observation::histogram("request.size", 2.75));
//! transport.collect(
//!     &Observation::event("deploys", "rolled out v2")
//!         .with_metadata(MetadataKey::Hostname, "web01.example.com")
//!         .with_metadata(MetadataKey::AlertType, "info")
//!         .with_tag("env:production"),
//! );
//! transport.collect(
//!     &Observation::service_check("db.primary", 0)
//!         .with_metadata(MetadataKey::Message, "all replicas healthy"),
//! );
//! ```
//!
//! Collecting a metric kind the dialect doesn't support logs a warning and
//! returns `false` without building a packet. Tags attached to an
//! observation sent through a non-Datadog transport are dropped from the
//! wire with a warning, the metric itself still goes out.
//!
//! ### Sampling
//!
//! High-volume call sites can ask for probabilistic sending. The rate is
//! written into the packet so the server can scale counts back up.
//!
//! ```rust,no_run
//! use parlance::{Observation, UdpTransport};
//!
//! let transport = UdpTransport::new("localhost:8125");
//! let observation = Observation::counter("cache.hit", 1).with_sample_rate(0.1);
//!
//! // Roughly one in ten of these actually sends a packet
//! for _ in 0..1000 {
//!     transport.collect(&observation);
//! }
//! ```
//!
//! Sampled-out calls return `false` silently. Unlike an unsupported metric
//! kind, dropping a sampled metric is routine operation and not worth a
//! log line.
//!
//! ### Failure Behavior
//!
//! UDP is fire-and-forget and so is this transport. Socket-level failures
//! (unreachable host, refused connection, failed resolution) are logged
//! through the `log` crate at error severity and reported as a `false`
//! return, never as a panic or an `Err` the instrumented code has to
//! handle. A failed send does not tear down the socket; the next call
//! simply tries again with the same handle.
//!
//! ### Reconfiguring the Endpoint
//!
//! The destination can be changed while the transport is shared, for
//! example after re-reading configuration. The socket is recreated lazily
//! on the next send.
//!
//! ```rust,no_run
//! use parlance::{Observation, UdpTransport};
//!
//! let transport = UdpTransport::new("10.0.0.1:8125");
//! transport.collect(&Observation::counter("some.counter", 1));
//!
//! transport.configure("10.0.0.2:8125");
//! // Sent through a fresh socket connected to the new endpoint
//! transport.collect(&Observation::counter("some.counter", 1));
//! ```

#![forbid(unsafe_code)]

pub const DEFAULT_PORT: u16 = 8125;

pub use self::dialect::Dialect;

pub use self::net::Endpoint;

pub use self::transport::{Sampling, ThreadRngSampler, UdpTransport, UdpTransportBuilder};

pub use self::types::{
    ErrorKind, MetadataKey, MetricKind, Observation, ObservationValue, TransportError, TransportResult,
};

mod dialect;
mod encoder;
mod net;
mod transport;
mod types;
