// Parlance - A multi-dialect Statsd transport for Rust!
//
// Copyright 2015-2021 Nick Pillitteri
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::dialect::{Dialect, EVENT_FIELDS, SERVICE_CHECK_FIELDS};
use crate::types::{MetadataKey, MetricKind, Observation, ObservationValue};
use log::warn;
use std::borrow::Cow;
use std::fmt::Write;

/// Renderer for the exact wire form of one observation under one dialect.
///
/// Encoding never fails. Parts of an observation the dialect can't express
/// (tags outside Datadog, metadata keys outside the per-kind tables) are
/// dropped from the output rather than rejected.
#[derive(Debug, Clone)]
pub(crate) struct PacketEncoder<'a> {
    observation: &'a Observation,
    dialect: Dialect,
}

impl<'a> PacketEncoder<'a> {
    const TAG_PREFIX: &'static str = "|#";

    pub(crate) fn new(observation: &'a Observation, dialect: Dialect) -> Self {
        PacketEncoder { observation, dialect }
    }

    pub(crate) fn encode(&self) -> String {
        let mut out = String::with_capacity(self.size_hint());
        self.write_body(&mut out);
        self.write_sample_rate(&mut out);
        self.write_tags(&mut out);
        if self.dialect == Dialect::Statsite {
            out.push('\n');
        }
        out
    }

    fn write_body(&self, out: &mut String) {
        match self.observation.kind() {
            MetricKind::Event => self.write_event(out),
            MetricKind::ServiceCheck => self.write_service_check(out),
            kind => {
                let _ = write!(out, "{}:{}|{}", self.observation.name(), self.observation.value(), kind);
            }
        }
    }

    fn write_event(&self, out: &mut String) {
        let title = escape_newlines(self.observation.name());
        let body = match self.observation.value() {
            ObservationValue::Text(text) => escape_newlines(text),
            value => Cow::Owned(value.to_string()),
        };

        // The length fields are character counts of the escaped strings,
        // each escaped newline counting as two characters.
        let _ = write!(
            out,
            "_e{{{},{}}}:{}|{}",
            title.chars().count(),
            body.chars().count(),
            title,
            body
        );
        self.write_metadata(out, EVENT_FIELDS);
    }

    fn write_service_check(&self, out: &mut String) {
        let _ = write!(out, "_sc|{}|{}", self.observation.name(), self.observation.value());
        self.write_metadata(out, SERVICE_CHECK_FIELDS);
    }

    fn write_metadata(&self, out: &mut String, fields: &[(MetadataKey, char)]) {
        for &(key, code) in fields {
            if let Some(value) = self.observation.metadata_value(key) {
                let _ = write!(out, "|{}:{}", code, value);
            }
        }
    }

    fn write_sample_rate(&self, out: &mut String) {
        let rate = self.observation.sample_rate();
        if rate < 1.0 || (self.dialect == Dialect::Statsite && rate > 1.0) {
            let _ = write!(out, "|@{}", rate);
        }
    }

    fn write_tags(&self, out: &mut String) {
        let tags = self.observation.tags();
        if tags.is_empty() {
            return;
        }
        if !self.dialect.supports_tags() {
            warn!("Tags are not supported by the {} dialect", self.dialect);
            return;
        }
        out.push_str(Self::TAG_PREFIX);
        for (i, tag) in tags.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(tag);
        }
    }

    fn size_hint(&self) -> usize {
        let observation = self.observation;
        // name, ':', up to 10 digits of value, '|', kind token, and room
        // for a possible "|@rate" suffix and statsite newline
        let mut size = observation.name().len() + 1 + 10 + 1 + 2 + 8 + 1;

        if self.dialect.supports_tags() && !observation.tags().is_empty() {
            // prefix, values, commas
            size += Self::TAG_PREFIX.len();
            size += observation.tags().iter().map(|t| t.len() + 1).sum::<usize>();
        }

        // "|c:" and the value for each metadata field
        size += observation.metadata().iter().map(|(_, v)| v.len() + 3).sum::<usize>();

        if let ObservationValue::Text(text) = observation.value() {
            size += text.len();
        }

        size
    }
}

impl Observation {
    /// Render the exact wire form of this observation under the given
    /// dialect, without sending anything.
    ///
    /// This is the same rendering a transport performs right before putting
    /// a packet on the wire, which makes it handy for tests and for callers
    /// that ship packets through some transport of their own.
    ///
    /// # Example
    ///
    /// ```
    /// use parlance::{Dialect, Observation};
    ///
    /// let observation = Observation::counter("some.counter", 4);
    ///
    /// assert_eq!("some.counter:4|c", observation.encode(Dialect::Statsd));
    /// ```
    pub fn encode(&self, dialect: Dialect) -> String {
        PacketEncoder::new(self, dialect).encode()
    }
}

fn escape_newlines(text: &str) -> Cow<'_, str> {
    if text.contains('\n') {
        Cow::Owned(text.replace('\n', "\\n"))
    } else {
        Cow::Borrowed(text)
    }
}
