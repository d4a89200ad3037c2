//! Adapter from the `evtx` parser to [`RawRecord`]s.
//!
//! Records are rendered by `evtx` into JSON and the few values the engine needs are
//! picked out of it:
//!
//! ```json
//! {
//!   "Event": {
//!     "System": {
//!       "EventID": 4624,
//!       "TimeCreated": { "#attributes": { "SystemTime": "2024-01-01T10:00:00.123456Z" } }
//!     },
//!     "EventData": { "SubjectUserSid": "S-1-5-18", "SubjectUserName": "WS01$", ... }
//!   }
//! }
//! ```
//!
//! Legacy records (converted `.evt` logs) carry a single unnamed `Data` element holding
//! `<string>..</string>` runs, which is passed on as [`Payload::Blob`].

use std::fs::File;
use std::path::{Path, PathBuf};

use evtx::{EvtxParser, ParserSettings};
use serde_json::{Map, Value};

use crate::err::{DecodeError, SourceError};
use crate::record::{Payload, RawRecord};

pub struct EvtxSource {
    parser: EvtxParser<File>,
    path: PathBuf,
}

impl EvtxSource {
    pub fn open(path: impl AsRef<Path>, settings: ParserSettings) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();
        let parser = EvtxParser::from_path(&path).map_err(|e| SourceError::FailedToOpen {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        Ok(EvtxSource {
            parser: parser.with_configuration(settings),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lazily decodes every record in the file, in file order.
    pub fn records(&mut self) -> impl Iterator<Item = Result<RawRecord, DecodeError>> + '_ {
        self.parser.records_json_value().map(|record| match record {
            Ok(record) => raw_record_from_json(&record.data),
            Err(e) => Err(DecodeError::new(e.to_string())),
        })
    }
}

/// Converts one `evtx` JSON document into a [`RawRecord`].
pub fn raw_record_from_json(value: &Value) -> Result<RawRecord, DecodeError> {
    let malformed = |message: &str| DecodeError::with_payload(message, value.to_string());

    let event = value.get("Event").unwrap_or(value);
    let system = event
        .get("System")
        .ok_or_else(|| malformed("record has no System element"))?;

    let event_id = system
        .get("EventID")
        .and_then(event_id_from_json)
        .ok_or_else(|| malformed("record has no usable EventID"))?;

    let time_created = system
        .pointer("/TimeCreated/#attributes/SystemTime")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("record has no TimeCreated/SystemTime"))?
        .to_owned();

    let payload = match event.get("EventData") {
        None | Some(Value::Null) => Payload::Fields(Vec::new()),
        Some(Value::Object(map)) => payload_from_map(map),
        Some(Value::String(blob)) => Payload::Blob(blob.clone()),
        Some(other) => Payload::Fields(vec![stringify(other)]),
    };

    Ok(RawRecord {
        event_id,
        time_created,
        payload,
    })
}

fn event_id_from_json(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        // `{"#attributes": {"Qualifiers": 0}, "#text": 528}`
        Value::Object(map) => map.get("#text").and_then(event_id_from_json),
        _ => None,
    }
}

fn payload_from_map(map: &Map<String, Value>) -> Payload {
    let mut entries = map
        .iter()
        .filter(|(name, _)| name.as_str() != "#attributes" && name.as_str() != "Binary");

    let unnamed = match (entries.next(), entries.next()) {
        (Some((name, data)), None) if name == "Data" => Some(data),
        _ => None,
    };

    match unnamed {
        Some(Value::String(blob)) => Payload::Blob(blob.clone()),
        Some(Value::Array(values)) => Payload::Fields(values.iter().map(stringify).collect()),
        Some(Value::Object(data)) => match data.get("#text") {
            Some(Value::String(blob)) => Payload::Blob(blob.clone()),
            Some(Value::Array(values)) => Payload::Fields(values.iter().map(stringify).collect()),
            Some(other) => Payload::Fields(vec![stringify(other)]),
            None => Payload::Fields(Vec::new()),
        },
        Some(other) => Payload::Fields(vec![stringify(other)]),
        None => Payload::Fields(
            map.iter()
                .filter(|(name, _)| name.as_str() != "#attributes")
                .map(|(_, v)| stringify(v))
                .collect(),
        ),
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Object(map) => match map.get("#text") {
            Some(text) => stringify(text),
            None => value.to_string(),
        },
        Value::Array(_) => value.to_string(),
    }
}
