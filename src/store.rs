//! Session store and merge policy.
//!
//! The merge is deliberately asymmetric:
//! - a logon replaces whatever was stored for its key (last logon wins), except that it
//!   adopts an orphan logoff (no login yet) that is not earlier than itself;
//! - a logoff never moves an already known logoff (first logoff wins);
//! - a sub-event for an unknown key is dropped.

use ahash::RandomState;
use hashbrown::HashMap;
use jiff::Timestamp;
use log::trace;

use crate::extract::UNKNOWN_SOURCE;
use crate::format::compute_duration;
use crate::session::{Session, SessionKey, SubEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogonOutcome {
    Created,
    /// A session with the same key already had a login and was discarded.
    Replaced,
    /// An orphan logoff stored earlier now has its login.
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoffOutcome {
    /// No session for the key, one was created with only a logoff.
    Orphan,
    Closed,
    /// The session already had a logoff, it was kept.
    AlreadyClosed,
}

#[derive(Debug, Default, Clone)]
pub struct SessionStore {
    sessions: HashMap<SessionKey, Session, RandomState>,
}

impl SessionStore {
    pub fn new() -> Self {
        SessionStore {
            sessions: HashMap::with_hasher(RandomState::new()),
        }
    }

    pub fn apply_logon(
        &mut self,
        key: SessionKey,
        time: Timestamp,
        logon_type: Option<String>,
        source: Option<String>,
    ) -> LogonOutcome {
        let source = source.unwrap_or_else(|| UNKNOWN_SOURCE.to_string());

        if let Some(existing) = self.sessions.get_mut(&key) {
            let adopts_logoff =
                existing.login.is_none() && existing.logoff.is_some_and(|logoff| logoff >= time);

            if adopts_logoff {
                existing.login = Some(time);
                existing.logon_type = logon_type;
                existing.source = source;
                existing.duration = compute_duration(existing.login, existing.logoff);
                trace!("{}: logon completes orphan logoff", key);
                return LogonOutcome::Completed;
            }
        }

        let mut session = Session::new(key.clone());
        session.login = Some(time);
        session.logon_type = logon_type;
        session.source = source;

        match self.sessions.insert(key, session) {
            None => LogonOutcome::Created,
            Some(previous) => {
                trace!("{}: logon replaces earlier session state", previous.key);
                LogonOutcome::Replaced
            }
        }
    }

    pub fn apply_logoff(&mut self, key: SessionKey, time: Timestamp) -> LogoffOutcome {
        let Some(session) = self.sessions.get_mut(&key) else {
            let mut session = Session::new(key.clone());
            session.logoff = Some(time);
            self.sessions.insert(key, session);
            return LogoffOutcome::Orphan;
        };

        let outcome = if session.logoff.is_none() {
            session.logoff = Some(time);
            LogoffOutcome::Closed
        } else {
            LogoffOutcome::AlreadyClosed
        };

        session.duration = compute_duration(session.login, session.logoff);
        outcome
    }

    /// Appends a sub-event to its session. Returns `false` if there is no session to attach to.
    pub fn apply_sub_event(&mut self, key: &SessionKey, sub_event: SubEvent) -> bool {
        match self.sessions.get_mut(key) {
            Some(session) => {
                session.sub_events.push(sub_event);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, key: &SessionKey) -> Option<&Session> {
        self.sessions.get(key)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    pub fn into_sessions(self) -> Vec<Session> {
        self.sessions.into_values().collect()
    }
}
