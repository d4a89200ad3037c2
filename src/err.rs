use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::event_kind::FieldLayout;

pub type Result<T, E = SessionError> = std::result::Result<T, E>;

/// Invalid report configuration, detected before the event stream is opened.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("time zone `{name}` is not recognized, use a tz database name such as `Europe/Warsaw`")]
    UnknownTimeZone {
        name: String,
        #[source]
        source: jiff::Error,
    },
}

/// Failure to open the decoded-log source. Always fatal.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to open file {}, caused by: {reason}", path.display())]
    FailedToOpen { path: PathBuf, reason: String },
}

/// A single record could not be decoded into a [`crate::RawRecord`].
///
/// Carries whatever raw payload was available so callers can report it; the
/// record itself is skipped and the stream continues.
#[derive(Debug, Error)]
#[error("failed to decode record: {message}")]
pub struct DecodeError {
    pub message: String,
    pub payload: Option<String>,
}

impl DecodeError {
    pub fn new(message: impl Into<String>) -> Self {
        DecodeError {
            message: message.into(),
            payload: None,
        }
    }

    pub fn with_payload(message: impl Into<String>, payload: impl Into<String>) -> Self {
        DecodeError {
            message: message.into(),
            payload: Some(payload.into()),
        }
    }
}

/// Local, non-fatal failure to pull typed fields out of a classified record.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("{layout:?} needs at least {need} fields, record has {have}")]
    TooFewFields {
        layout: FieldLayout,
        need: usize,
        have: usize,
    },

    #[error("{layout:?} expects pre-split fields, record carries a delimited blob")]
    UnexpectedBlob { layout: FieldLayout },

    #[error("legacy string blob is malformed: {message}")]
    MalformedBlob { message: String },

    #[error("invalid timestamp `{value}`")]
    InvalidTimestamp { value: String },
}

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("There is a directory at {}, refusing to overwrite", path.display())]
    IsADirectory { path: PathBuf },

    #[error("Refusing to overwrite {}", path.display())]
    Cancelled { path: PathBuf },

    #[error("Failed to create output file at {}", path.display())]
    FailedToCreate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Writing output failed")]
    Io(#[from] io::Error),

    #[error("Serializing a row to JSON failed")]
    Json(#[from] serde_json::Error),
}
