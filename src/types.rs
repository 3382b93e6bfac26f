// Parlance - A multi-dialect Statsd transport for Rust!
//
// Copyright 2015-2021 Nick Pillitteri
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::error;
use std::fmt;
use std::io;

/// Kind of measurement being recorded, determining the wire token used
/// for an observation.
///
/// Most kinds are part of the baseline Statsd protocol. Histograms, events,
/// and service checks are [Datadog](https://docs.datadoghq.com/developers/dogstatsd/)
/// extensions while key-value metrics are a
/// [Statsite](https://github.com/statsite/statsite) extension. Whether a
/// particular kind can actually be emitted depends on the dialect the
/// transport is configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    /// Value incremented or decremented by the client (`c`)
    Counter,
    /// Instantaneous measurement determined by the client (`g`)
    Gauge,
    /// Milliseconds between a start and end time (`ms`)
    Timer,
    /// Value whose statistical distribution is computed by the server (`h`)
    Histogram,
    /// Count of unique elements in a group (`s`)
    Set,
    /// Free-form key-value pair recorded by the server (`kv`)
    KeyValue,
    /// Entry for the event stream, title and body text (`_e`)
    Event,
    /// Status report for a named service (`_sc`)
    ServiceCheck,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MetricKind::Counter => "c".fmt(f),
            MetricKind::Gauge => "g".fmt(f),
            MetricKind::Timer => "ms".fmt(f),
            MetricKind::Histogram => "h".fmt(f),
            MetricKind::Set => "s".fmt(f),
            MetricKind::KeyValue => "kv".fmt(f),
            MetricKind::Event => "_e".fmt(f),
            MetricKind::ServiceCheck => "_sc".fmt(f),
        }
    }
}

/// Payload of an observation that knows how to display itself.
///
/// Numeric variants cover the standard metric kinds while the text variant
/// carries event bodies and service check statuses.
#[derive(Debug, Clone, PartialEq)]
pub enum ObservationValue {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
    Text(String),
}

impl fmt::Display for ObservationValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ObservationValue::Signed(v) => v.fmt(f),
            ObservationValue::Unsigned(v) => v.fmt(f),
            ObservationValue::Float(v) => v.fmt(f),
            ObservationValue::Text(ref v) => v.fmt(f),
        }
    }
}

impl From<i64> for ObservationValue {
    fn from(v: i64) -> Self {
        ObservationValue::Signed(v)
    }
}

impl From<u64> for ObservationValue {
    fn from(v: u64) -> Self {
        ObservationValue::Unsigned(v)
    }
}

impl From<f64> for ObservationValue {
    fn from(v: f64) -> Self {
        ObservationValue::Float(v)
    }
}

impl From<&str> for ObservationValue {
    fn from(v: &str) -> Self {
        ObservationValue::Text(v.to_string())
    }
}

impl From<String> for ObservationValue {
    fn from(v: String) -> Self {
        ObservationValue::Text(v)
    }
}

/// Named optional field attached to an event or service check.
///
/// Each dialect recognizes a fixed subset of these keys for each metric
/// kind. Keys outside that subset are silently skipped during encoding so
/// callers don't need to tailor observations per dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataKey {
    /// Unix timestamp an event happened at (`d`)
    DateHappened,
    /// Host the event or service check originated from (`h`)
    Hostname,
    /// Key used by the server to group related events (`k`)
    AggregationKey,
    /// Event priority, `normal` or `low` (`p`)
    Priority,
    /// Source type name of an event (`s`)
    SourceTypeName,
    /// Event alert type, `info`, `warning`, `error`, or `success` (`t`)
    AlertType,
    /// Unix timestamp a service check ran at (`d`)
    Timestamp,
    /// Message describing the state of a service check (`m`)
    Message,
}

/// Single measurement to be emitted by a transport.
///
/// An observation describes one metric completely: what kind of measurement
/// it is, its name, its value, how often it is sampled, and any tags or
/// metadata attached to it. Observations are constructed once and read-only
/// afterwards, the transport never modifies them while encoding or sending.
///
/// # Example
///
/// ```
/// use parlance::Observation;
///
/// let observation = Observation::counter("requests.handled", 1)
///     .with_sample_rate(0.5)
///     .with_tag("region:us-east-1");
///
/// assert_eq!("requests.handled", observation.name());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    kind: MetricKind,
    name: String,
    value: ObservationValue,
    sample_rate: f64,
    tags: Vec<String>,
    metadata: Vec<(MetadataKey, String)>,
}

impl Observation {
    /// Create an observation of the given kind, name, and value.
    ///
    /// The per-kind constructors below are usually more convenient.
    pub fn new<S, V>(kind: MetricKind, name: S, value: V) -> Observation
    where
        S: Into<String>,
        V: Into<ObservationValue>,
    {
        Observation {
            kind,
            name: name.into(),
            value: value.into(),
            sample_rate: 1.0,
            tags: Vec::new(),
            metadata: Vec::new(),
        }
    }

    /// Counter incremented or decremented by the given amount
    pub fn counter<S: Into<String>>(name: S, value: i64) -> Observation {
        Self::new(MetricKind::Counter, name, value)
    }

    /// Gauge recording an instantaneous value
    pub fn gauge<S, V>(name: S, value: V) -> Observation
    where
        S: Into<String>,
        V: Into<ObservationValue>,
    {
        Self::new(MetricKind::Gauge, name, value)
    }

    /// Timing in milliseconds
    pub fn timer<S: Into<String>>(name: S, millis: u64) -> Observation {
        Self::new(MetricKind::Timer, name, millis)
    }

    /// Histogram value, a Datadog extension
    pub fn histogram<S, V>(name: S, value: V) -> Observation
    where
        S: Into<String>,
        V: Into<ObservationValue>,
    {
        Self::new(MetricKind::Histogram, name, value)
    }

    /// Unique element of a set
    pub fn set<S: Into<String>>(name: S, value: i64) -> Observation {
        Self::new(MetricKind::Set, name, value)
    }

    /// Key-value pair, a Statsite extension
    pub fn key_value<S, V>(name: S, value: V) -> Observation
    where
        S: Into<String>,
        V: Into<ObservationValue>,
    {
        Self::new(MetricKind::KeyValue, name, value)
    }

    /// Event with a title and body text, a Datadog extension
    pub fn event<S, B>(title: S, body: B) -> Observation
    where
        S: Into<String>,
        B: Into<String>,
    {
        Self::new(MetricKind::Event, title, ObservationValue::Text(body.into()))
    }

    /// Status report for a named service, a Datadog extension.
    ///
    /// The status is the numeric state the server expects, 0 for ok up
    /// through 3 for unknown.
    pub fn service_check<S: Into<String>>(name: S, status: i64) -> Observation {
        Self::new(MetricKind::ServiceCheck, name, status)
    }

    /// Set the rate this observation is sampled at.
    ///
    /// Rates below 1.0 cause the transport to probabilistically drop sends
    /// and encode the rate into the packet so the server can compensate.
    /// Rates above 1.0 are only meaningful to Statsite servers.
    pub fn with_sample_rate(mut self, rate: f64) -> Observation {
        self.sample_rate = rate;
        self
    }

    /// Add a tag to this observation.
    ///
    /// Tags are rendered as a comma-joined list in the order they were
    /// added. Note that tags are a Datadog extension and are dropped, with
    /// a logged warning, when encoding for any other dialect.
    pub fn with_tag<S: Into<String>>(mut self, tag: S) -> Observation {
        self.tags.push(tag.into());
        self
    }

    /// Attach an optional metadata field to this observation.
    ///
    /// Only meaningful for events and service checks. Keys the active
    /// dialect doesn't recognize for this kind of metric are skipped when
    /// the observation is encoded.
    pub fn with_metadata<V: ToString>(mut self, key: MetadataKey, value: V) -> Observation {
        self.metadata.push((key, value.to_string()));
        self
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    /// Name of this observation, the title in the case of an event
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &ObservationValue {
        &self.value
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn metadata(&self) -> &[(MetadataKey, String)] {
        &self.metadata
    }

    /// Value recorded for the given metadata key, if any.
    ///
    /// When a key was attached more than once the first value wins.
    pub fn metadata_value(&self, key: MetadataKey) -> Option<&str> {
        self.metadata
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Potential categories an error from this library falls into.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ErrorKind {
    InvalidInput,
    IoError,
}

/// Error generated by this library potentially wrapping another
/// type of error (exposed via the `Error` trait).
#[derive(Debug)]
pub struct TransportError {
    repr: ErrorRepr,
}

#[derive(Debug)]
enum ErrorRepr {
    WithDescription(ErrorKind, &'static str),
    IoError(io::Error),
}

impl TransportError {
    /// Return the kind of the error.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::IoError(_) => ErrorKind::IoError,
            ErrorRepr::WithDescription(kind, _) => kind,
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.repr {
            ErrorRepr::IoError(ref err) => err.fmt(f),
            ErrorRepr::WithDescription(_, desc) => desc.fmt(f),
        }
    }
}

impl error::Error for TransportError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self.repr {
            ErrorRepr::IoError(ref err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> TransportError {
        TransportError {
            repr: ErrorRepr::IoError(err),
        }
    }
}

impl From<(ErrorKind, &'static str)> for TransportError {
    fn from((kind, desc): (ErrorKind, &'static str)) -> TransportError {
        TransportError {
            repr: ErrorRepr::WithDescription(kind, desc),
        }
    }
}

pub type TransportResult<T> = Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::{ErrorKind, MetadataKey, MetricKind, Observation, ObservationValue, TransportError};
    use std::io;

    #[test]
    fn test_metric_kind_wire_tokens() {
        assert_eq!("c", MetricKind::Counter.to_string());
        assert_eq!("g", MetricKind::Gauge.to_string());
        assert_eq!("ms", MetricKind::Timer.to_string());
        assert_eq!("h", MetricKind::Histogram.to_string());
        assert_eq!("s", MetricKind::Set.to_string());
        assert_eq!("kv", MetricKind::KeyValue.to_string());
        assert_eq!("_e", MetricKind::Event.to_string());
        assert_eq!("_sc", MetricKind::ServiceCheck.to_string());
    }

    #[test]
    fn test_observation_value_display() {
        assert_eq!("-4", ObservationValue::Signed(-4).to_string());
        assert_eq!("4", ObservationValue::Unsigned(4).to_string());
        assert_eq!("4.5", ObservationValue::Float(4.5).to_string());
        assert_eq!("ok", ObservationValue::from("ok").to_string());
    }

    #[test]
    fn test_observation_defaults() {
        let observation = Observation::counter("some.counter", 4);

        assert_eq!(MetricKind::Counter, observation.kind());
        assert_eq!("some.counter", observation.name());
        assert_eq!(1.0, observation.sample_rate());
        assert!(observation.tags().is_empty());
        assert!(observation.metadata().is_empty());
    }

    #[test]
    fn test_observation_builder_methods() {
        let observation = Observation::event("deploy", "rolled out v2")
            .with_sample_rate(0.25)
            .with_tag("env:prod")
            .with_tag("beta")
            .with_metadata(MetadataKey::Hostname, "web01.example.com")
            .with_metadata(MetadataKey::Priority, "low");

        assert_eq!(0.25, observation.sample_rate());
        assert_eq!(&["env:prod".to_string(), "beta".to_string()], observation.tags());
        assert_eq!(Some("web01.example.com"), observation.metadata_value(MetadataKey::Hostname));
        assert_eq!(Some("low"), observation.metadata_value(MetadataKey::Priority));
        assert_eq!(None, observation.metadata_value(MetadataKey::Message));
    }

    #[test]
    fn test_observation_metadata_first_value_wins() {
        let observation = Observation::service_check("db", 0)
            .with_metadata(MetadataKey::Message, "up")
            .with_metadata(MetadataKey::Message, "still up");

        assert_eq!(Some("up"), observation.metadata_value(MetadataKey::Message));
    }

    #[test]
    fn test_error_kind_io_error() {
        let err = TransportError::from(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
        assert_eq!(ErrorKind::IoError, err.kind());
    }

    #[test]
    fn test_error_kind_with_description() {
        let err = TransportError::from((ErrorKind::InvalidInput, "not a dialect"));
        assert_eq!(ErrorKind::InvalidInput, err.kind());
        assert_eq!("not a dialect", err.to_string());
    }
}
