//! Wire codec for cached values.
//!
//! Values travel through the backend as JSON text. Temporal values use
//! [`Timestamp`], which encodes as a tagged string (the [`INSTANT_TAG`]
//! sentinel followed by an RFC 3339 representation) so instants survive the
//! round trip at millisecond precision wherever they sit in a value: struct
//! fields, vector elements, map values. serde drives the depth-first walk;
//! nothing here does I/O.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Sentinel prefix marking a serialized instant inside ordinary JSON text.
pub const INSTANT_TAG: &str = "__date:";

#[derive(Error, Debug)]
pub enum SerializerError {
    #[error("encode error: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("decode error: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Serialize a value to its wire representation.
pub fn serialize<T: Serialize>(value: &T) -> Result<String, SerializerError> {
    serde_json::to_string(value).map_err(SerializerError::Encode)
}

/// Inverse of [`serialize`]. Malformed text is a decode error; callers on the
/// read path treat it as a cache miss.
pub fn deserialize<T: DeserializeOwned>(text: &str) -> Result<T, SerializerError> {
    serde_json::from_str(text).map_err(SerializerError::Decode)
}

/// An instant in time that round-trips through the cache.
///
/// Wraps a `chrono::DateTime<Utc>` truncated to millisecond precision (the
/// wire format carries milliseconds, so anything finer would not survive the
/// round trip and would break equality). On the wire it is a JSON string of
/// the form `"__date:2024-05-01T12:00:00.000Z"`; a string without the tag in
/// a `Timestamp` position fails to decode. Ordinary `String` fields are never
/// interpreted, whatever their content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn new(instant: DateTime<Utc>) -> Self {
        Timestamp(truncate_to_millis(instant))
    }

    pub fn now() -> Self {
        Self::new(Utc::now())
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(instant: DateTime<Utc>) -> Self {
        Timestamp::new(instant)
    }
}

impl From<Timestamp> for DateTime<Utc> {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

fn truncate_to_millis(instant: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(instant.timestamp_millis()).unwrap_or(instant)
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let tagged = format!(
            "{INSTANT_TAG}{}",
            self.0.to_rfc3339_opts(SecondsFormat::Millis, true)
        );
        serializer.serialize_str(&tagged)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let iso = raw.strip_prefix(INSTANT_TAG).ok_or_else(|| {
            D::Error::custom(format!("expected string tagged with {INSTANT_TAG:?}"))
        })?;
        let parsed = DateTime::parse_from_rfc3339(iso).map_err(D::Error::custom)?;
        Ok(Timestamp::new(parsed.with_timezone(&Utc)))
    }
}
