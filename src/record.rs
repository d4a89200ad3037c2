use jiff::Timestamp;
use jiff::civil::DateTime;
use jiff::tz::Offset;

use crate::err::ExtractError;

/// Event data of a decoded record, before any layout is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Pre-split positional values.
    Fields(Vec<String>),
    /// A single `<string>..</string><string>..</string>` blob (legacy schema).
    Blob(String),
}

/// A generic decoded audit record, as handed over by the log source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub event_id: u32,
    /// `YYYY-MM-DD HH:MM:SS[.fraction]` or RFC 3339, UTC.
    pub time_created: String,
    pub payload: Payload,
}

impl RawRecord {
    pub fn with_fields<I, S>(event_id: u32, time_created: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RawRecord {
            event_id,
            time_created: time_created.into(),
            payload: Payload::Fields(fields.into_iter().map(Into::into).collect()),
        }
    }

    pub fn with_blob(
        event_id: u32,
        time_created: impl Into<String>,
        blob: impl Into<String>,
    ) -> Self {
        RawRecord {
            event_id,
            time_created: time_created.into(),
            payload: Payload::Blob(blob.into()),
        }
    }
}

/// Parses a record creation time and truncates it to whole seconds.
///
/// Modern logs carry sub-second digits that legacy logs never had, dropping them keeps
/// durations between the two comparable.
pub fn parse_timestamp(value: &str) -> Result<Timestamp, ExtractError> {
    let value = value.trim();
    let invalid = || ExtractError::InvalidTimestamp {
        value: value.to_owned(),
    };

    let ts = match value.parse::<Timestamp>() {
        Ok(ts) => ts,
        Err(_) => {
            let dt: DateTime = value.parse().map_err(|_| invalid())?;
            Offset::UTC.to_timestamp(dt).map_err(|_| invalid())?
        }
    };

    Timestamp::from_second(ts.as_second()).map_err(|_| invalid())
}
