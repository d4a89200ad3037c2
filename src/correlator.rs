use std::ops::ControlFlow;

use log::{debug, trace, warn};

use crate::err::{DecodeError, ExtractError};
use crate::event_kind::{EventKind, EventType};
use crate::extract::{UNKNOWN_CLIENT, extract};
use crate::record::RawRecord;
use crate::session::{SessionKey, SubEvent, SubEventKind};
use crate::store::SessionStore;

/// What happened to a single record.
#[derive(Debug, PartialEq, Eq)]
pub enum Applied {
    Transition(EventKind),
    /// Event id is not one of ours.
    Ignored,
    /// Reconnect/disconnect for a session that was never seen.
    Dropped,
    Skipped(ExtractError),
}

/// Counters over one pass of the stream.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub records: u64,
    pub logons: u64,
    pub logoffs: u64,
    pub sub_events: u64,
    pub ignored: u64,
    pub dropped: u64,
    pub skipped: u64,
    pub decode_errors: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    Exhausted,
    /// The caller stopped the fold. Every record seen so far was fully applied.
    Interrupted,
}

/// Folds a stream of decoded records into a [`SessionStore`].
#[derive(Debug, Default)]
pub struct Correlator {
    store: SessionStore,
    stats: Stats,
}

impl Correlator {
    pub fn new() -> Self {
        Correlator::default()
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn into_store(self) -> SessionStore {
        self.store
    }

    /// Applies one record. Never fails, problems are reported through [`Applied`].
    pub fn apply(&mut self, record: &RawRecord) -> Applied {
        self.stats.records += 1;

        let Some(event_type) = EventType::lookup(record.event_id) else {
            self.stats.ignored += 1;
            return Applied::Ignored;
        };

        let fields = match extract(record, event_type.layout) {
            Ok(fields) => fields,
            Err(e) => {
                debug!("skipping event {}: {}", record.event_id, e);
                self.stats.skipped += 1;
                return Applied::Skipped(e);
            }
        };

        let key = SessionKey::new(&fields.domain, &fields.user, &fields.logon_id);
        trace!("event {} ({}) for {}", record.event_id, event_type.kind, key);

        match event_type.kind {
            EventKind::Logon => {
                self.store
                    .apply_logon(key, fields.time, fields.logon_type, fields.source);
                self.stats.logons += 1;
            }
            EventKind::Logoff => {
                self.store.apply_logoff(key, fields.time);
                self.stats.logoffs += 1;
            }
            EventKind::Reconnect | EventKind::Disconnect => {
                let kind = if event_type.kind == EventKind::Reconnect {
                    SubEventKind::Reconnect
                } else {
                    SubEventKind::Disconnect
                };
                let sub_event = SubEvent {
                    kind,
                    time: fields.time,
                    source: fields.source.unwrap_or_else(|| UNKNOWN_CLIENT.to_string()),
                };

                if !self.store.apply_sub_event(&key, sub_event) {
                    debug!("dropping {} for unknown session {}", event_type.kind, key);
                    self.stats.dropped += 1;
                    return Applied::Dropped;
                }
                self.stats.sub_events += 1;
            }
        }

        Applied::Transition(event_type.kind)
    }

    /// Consumes `records` until exhausted or until `after_each` breaks.
    ///
    /// `after_each` runs after every fully applied record, which makes it the point
    /// where progress can be reported and cancellation requested.
    pub fn consume<I, F>(&mut self, records: I, mut after_each: F) -> StreamEnd
    where
        I: IntoIterator<Item = Result<RawRecord, DecodeError>>,
        F: FnMut(&Stats) -> ControlFlow<()>,
    {
        for record in records {
            match record {
                Ok(record) => {
                    self.apply(&record);
                }
                Err(e) => {
                    self.stats.records += 1;
                    self.stats.decode_errors += 1;
                    warn!("{}", e);
                    if let Some(payload) = &e.payload {
                        debug!("undecodable payload: {}", payload);
                    }
                }
            }

            if after_each(&self.stats).is_break() {
                return StreamEnd::Interrupted;
            }
        }

        StreamEnd::Exhausted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Elapsed;
    use pretty_assertions::assert_eq;

    fn logoff(time: &str) -> RawRecord {
        RawRecord::with_fields(4634, time, ["S-1-5-21-1", "u1", "a", "1", "2"])
    }

    #[test]
    fn test_unknown_event_is_ignored() {
        let mut correlator = Correlator::new();
        let applied = correlator.apply(&RawRecord::with_fields(9999, "2024-01-01 10:00:00", ["x"]));

        assert_eq!(applied, Applied::Ignored);
        assert!(correlator.store().is_empty());
        assert_eq!(correlator.stats().ignored, 1);
    }

    #[test]
    fn test_decode_errors_do_not_stop_the_stream() {
        let mut correlator = Correlator::new();
        let records = vec![
            Err(DecodeError::with_payload("bad record", "<Event>")),
            Ok(logoff("2024-01-01 10:00:00")),
        ];

        let end = correlator.consume(records, |_| ControlFlow::Continue(()));

        assert_eq!(end, StreamEnd::Exhausted);
        assert_eq!(correlator.stats().decode_errors, 1);
        assert_eq!(correlator.stats().logoffs, 1);
        assert_eq!(correlator.store().len(), 1);
    }

    #[test]
    fn test_consume_stops_after_a_complete_transition() {
        let mut correlator = Correlator::new();
        let records = (0..10).map(|i| {
            Ok(RawRecord::with_fields(
                4634,
                "2024-01-01 10:00:00",
                ["S-1-5-21-1".to_string(), "u1".into(), "a".into(), i.to_string()],
            ))
        });

        let end = correlator.consume(records, |stats| {
            if stats.records == 3 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });

        assert_eq!(end, StreamEnd::Interrupted);
        assert_eq!(correlator.store().len(), 3);
    }

    #[test]
    fn test_short_record_is_skipped() {
        let mut correlator = Correlator::new();
        let short = RawRecord::with_fields(4624, "2024-01-01 10:00:00", ["a", "b"]);
        let applied = correlator.apply(&short);

        assert!(matches!(applied, Applied::Skipped(ExtractError::TooFewFields { .. })));
        assert!(correlator.store().is_empty());
    }

    #[test]
    fn test_orphan_logoff_record() {
        let mut correlator = Correlator::new();
        correlator.apply(&logoff("2024-01-01 10:00:00"));

        let session = correlator.store().iter().next().unwrap();
        assert_eq!(session.login, None);
        assert_eq!(session.duration, Elapsed::Unknown);
        assert_eq!(session.user(), "A\\U1");
    }
}
