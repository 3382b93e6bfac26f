// Parlance - A multi-dialect Statsd transport for Rust!
//
// Copyright 2015-2021 Nick Pillitteri
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::types::{ErrorKind, MetadataKey, MetricKind, TransportError};
use std::fmt;
use std::str::FromStr;

/// Wire protocol variant spoken by a transport.
///
/// The dialects are mutually incompatible extensions of the same text
/// protocol. Which metric kinds a transport will accept and how packets
/// are terminated both depend on the chosen dialect:
///
/// * `Statsd` is the baseline protocol understood by every server.
/// * `Datadog` adds histograms, events, service checks, and tags.
/// * `Statsite` adds key-value metrics and terminates each packet with a
///   newline.
///
/// # Example
///
/// ```
/// use parlance::{Dialect, MetricKind};
///
/// assert!(Dialect::Datadog.supports(MetricKind::Histogram));
/// assert!(!Dialect::Statsd.supports(MetricKind::Histogram));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dialect {
    #[default]
    Statsd,
    Datadog,
    Statsite,
}

impl Dialect {
    /// Can metrics of the given kind be emitted under this dialect?
    pub fn supports(self, kind: MetricKind) -> bool {
        match kind {
            MetricKind::Histogram | MetricKind::Event | MetricKind::ServiceCheck => self == Dialect::Datadog,
            MetricKind::KeyValue => self == Dialect::Statsite,
            _ => true,
        }
    }

    /// Are tags rendered on the wire under this dialect?
    pub fn supports_tags(self) -> bool {
        self == Dialect::Datadog
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Dialect::Statsd => "statsd".fmt(f),
            Dialect::Datadog => "datadog".fmt(f),
            Dialect::Statsite => "statsite".fmt(f),
        }
    }
}

impl FromStr for Dialect {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "statsd" => Ok(Dialect::Statsd),
            "datadog" => Ok(Dialect::Datadog),
            "statsite" => Ok(Dialect::Statsite),
            _ => Err(TransportError::from((
                ErrorKind::InvalidInput,
                "Unrecognized dialect token",
            ))),
        }
    }
}

// Metadata fields recognized per metric kind and the single character
// codes they are rendered with. Declaration order fixes the wire order.

pub(crate) const EVENT_FIELDS: &[(MetadataKey, char)] = &[
    (MetadataKey::DateHappened, 'd'),
    (MetadataKey::Hostname, 'h'),
    (MetadataKey::AggregationKey, 'k'),
    (MetadataKey::Priority, 'p'),
    (MetadataKey::SourceTypeName, 's'),
    (MetadataKey::AlertType, 't'),
];

pub(crate) const SERVICE_CHECK_FIELDS: &[(MetadataKey, char)] = &[
    (MetadataKey::Timestamp, 'd'),
    (MetadataKey::Hostname, 'h'),
    (MetadataKey::Message, 'm'),
];

#[cfg(test)]
mod tests {
    use super::Dialect;
    use crate::types::{ErrorKind, MetricKind};

    #[test]
    fn test_baseline_kinds_supported_everywhere() {
        let kinds = [
            MetricKind::Counter,
            MetricKind::Gauge,
            MetricKind::Timer,
            MetricKind::Set,
        ];

        for kind in kinds {
            assert!(Dialect::Statsd.supports(kind));
            assert!(Dialect::Datadog.supports(kind));
            assert!(Dialect::Statsite.supports(kind));
        }
    }

    #[test]
    fn test_datadog_extensions_datadog_only() {
        let kinds = [MetricKind::Histogram, MetricKind::Event, MetricKind::ServiceCheck];

        for kind in kinds {
            assert!(Dialect::Datadog.supports(kind));
            assert!(!Dialect::Statsd.supports(kind));
            assert!(!Dialect::Statsite.supports(kind));
        }
    }

    #[test]
    fn test_key_value_statsite_only() {
        assert!(Dialect::Statsite.supports(MetricKind::KeyValue));
        assert!(!Dialect::Statsd.supports(MetricKind::KeyValue));
        assert!(!Dialect::Datadog.supports(MetricKind::KeyValue));
    }

    #[test]
    fn test_tags_datadog_only() {
        assert!(Dialect::Datadog.supports_tags());
        assert!(!Dialect::Statsd.supports_tags());
        assert!(!Dialect::Statsite.supports_tags());
    }

    #[test]
    fn test_default_dialect() {
        assert_eq!(Dialect::Statsd, Dialect::default());
    }

    #[test]
    fn test_from_str_round_trip() {
        for dialect in [Dialect::Statsd, Dialect::Datadog, Dialect::Statsite] {
            assert_eq!(dialect, dialect.to_string().parse().unwrap());
        }
    }

    #[test]
    fn test_from_str_unknown_token() {
        let res = "dogstatsd".parse::<Dialect>();
        assert_eq!(ErrorKind::InvalidInput, res.unwrap_err().kind());
    }
}
