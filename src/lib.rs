#![forbid(unsafe_code)]
//! Reconstructs logon sessions from Windows Security audit records.
//!
//! Logon, logoff, reconnect and disconnect events are logged separately and under two
//! generations of event ids. This crate classifies them, extracts the identifying fields,
//! folds them into one [`Session`] per `(domain, user, logon id)` and renders the result
//! as ordered rows.
//!
//! ```no_run
//! use std::ops::ControlFlow;
//! use evtx_sessions::{Correlator, EvtxSource, ParserSettings, ReportSettings, assemble};
//!
//! let mut source = EvtxSource::open("Security.evtx", ParserSettings::default()).unwrap();
//! let mut correlator = Correlator::new();
//! correlator.consume(source.records(), |_| ControlFlow::Continue(()));
//!
//! let rows = assemble(correlator.into_store().into_sessions(), &ReportSettings::new());
//! for row in rows {
//!     println!("{} {} {}", row.user, row.login, row.duration);
//! }
//! ```

pub mod correlator;
pub mod err;
pub mod event_kind;
pub mod extract;
pub mod format;
pub mod output;
pub mod record;
pub mod report;
pub mod session;
pub mod source;
pub mod store;

pub use correlator::{Applied, Correlator, Stats, StreamEnd};
pub use event_kind::{EventKind, EventType, FieldLayout, Schema, classify};
pub use extract::{ExtractedFields, extract};
pub use output::{OutputFormat, RowWriter};
pub use record::{Payload, RawRecord, parse_timestamp};
pub use report::{Interval, IntervalKind, ReportSettings, Row, SortKey, assemble, intervals};
pub use session::{Elapsed, Session, SessionKey, SubEvent, SubEventKind};
pub use source::{EvtxSource, raw_record_from_json};
pub use store::SessionStore;

// Re-exports to allow callers to configure the underlying parser.
pub use evtx::ParserSettings;
