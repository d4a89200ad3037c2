use std::fmt;

use jiff::Timestamp;

use crate::extract::UNKNOWN_SOURCE;

/// Identity of one logon session instance: `(DOMAIN, USER, logon id)`.
///
/// Domain and user are uppercased, the logon id is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionKey {
    pub domain: String,
    pub user: String,
    pub logon_id: String,
}

impl SessionKey {
    pub fn new(domain: &str, user: &str, logon_id: &str) -> Self {
        SessionKey {
            domain: domain.to_uppercase(),
            user: user.to_uppercase(),
            logon_id: logon_id.to_owned(),
        }
    }

    /// `DOMAIN\USER`
    pub fn account(&self) -> String {
        format!("{}\\{}", self.domain, self.user)
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\\{}{}", self.domain, self.user, self.logon_id)
    }
}

/// Elapsed time between two endpoints, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Elapsed {
    Seconds(u64),
    /// An endpoint is missing, or the endpoints are out of order.
    #[default]
    Unknown,
}

impl Elapsed {
    pub fn seconds(self) -> Option<u64> {
        match self {
            Elapsed::Seconds(s) => Some(s),
            Elapsed::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubEventKind {
    Reconnect,
    Disconnect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubEvent {
    pub kind: SubEventKind,
    pub time: Timestamp,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub key: SessionKey,
    pub login: Option<Timestamp>,
    pub logoff: Option<Timestamp>,
    pub duration: Elapsed,
    /// Raw logon type code as logged, `None` when no logon was seen.
    pub logon_type: Option<String>,
    pub source: String,
    /// In processing order.
    pub sub_events: Vec<SubEvent>,
}

impl Session {
    pub fn new(key: SessionKey) -> Self {
        Session {
            key,
            login: None,
            logoff: None,
            duration: Elapsed::Unknown,
            logon_type: None,
            source: UNKNOWN_SOURCE.to_string(),
            sub_events: Vec::new(),
        }
    }

    pub fn user(&self) -> String {
        self.key.account()
    }
}
