//! The stored value and its text/plain wire representation.
//!
//! On the wire a timestamp is the compact JSON text `{"timestamp":<i64>}`
//! carried as `text/plain`. Acknowledgements and rejections use
//! `{"response":"<message>"}`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use thiserror::Error;

/// Whole seconds since the Unix epoch. Negative values are pre-epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Value held by a freshly started service.
    pub const INITIAL: Timestamp = Timestamp(1622366082);

    pub const fn from_unix_seconds(seconds: i64) -> Self {
        Self(seconds)
    }

    pub const fn unix_seconds(self) -> i64 {
        self.0
    }

    /// The current wall-clock instant, truncated to seconds.
    pub fn now() -> Self {
        Self(Utc::now().timestamp())
    }

    /// Calendar form, or `None` when the seconds fall outside chrono's range.
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.0, 0)
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value.timestamp())
    }
}

/// Body of a timestamp request or response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampPayload {
    pub timestamp: i64,
}

impl From<Timestamp> for TimestampPayload {
    fn from(value: Timestamp) -> Self {
        Self {
            timestamp: value.unix_seconds(),
        }
    }
}

impl From<TimestampPayload> for Timestamp {
    fn from(value: TimestampPayload) -> Self {
        Timestamp::from_unix_seconds(value.timestamp)
    }
}

/// Short status body, e.g. `{"response":"OK"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub response: String,
}

impl StatusMessage {
    pub fn ok() -> Self {
        Self::new("OK")
    }

    pub fn new(message: impl Into<String>) -> Self {
        Self {
            response: message.into(),
        }
    }

    pub fn to_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{{\"response\":{:?}}}", self.response))
    }
}

/// A payload that does not carry a whole number of seconds.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Not JSON, or no `timestamp` field.
    #[error("Invalid timestamp payload: {0}")]
    Json(#[from] serde_json::Error),

    /// The `timestamp` field is not an integer that fits in `i64`.
    #[error("Timestamp is not a whole number of seconds: {0}")]
    NotWholeSeconds(String),
}

/// Inbound body with the `timestamp` value kept as raw JSON text.
#[derive(Deserialize)]
struct RawPayload<'a> {
    #[serde(borrow)]
    timestamp: &'a RawValue,
}

/// Parse a wire body into a [`Timestamp`].
///
/// Fractions (`1.5`), exponents (`0E0`), trailing text (`12fruit`),
/// non-numbers and a missing `timestamp` field are all rejected.
pub fn decode(body: &[u8]) -> Result<Timestamp, DecodeError> {
    let payload: RawPayload<'_> = serde_json::from_slice(body)?;
    // serde_json reads `-0` as a float; the integer grammar of the raw text
    // accepts it while still refusing fractions and exponents.
    let raw = payload.timestamp.get();
    raw.parse::<i64>()
        .map(Timestamp::from_unix_seconds)
        .map_err(|_| DecodeError::NotWholeSeconds(raw.to_string()))
}

/// Render a [`Timestamp`] as its wire body.
pub fn encode(timestamp: Timestamp) -> String {
    let payload = TimestampPayload::from(timestamp);
    format!("{{\"timestamp\":{}}}", payload.timestamp)
}
