//! Result assembler: orders finished sessions and expands their disconnect/reconnect
//! history into derived rows.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use jiff::Timestamp;
use jiff::tz::TimeZone;
use log::debug;
use serde::Serialize;

use crate::format::{
    UNKNOWN, compute_duration, format_duration, format_logon_type, format_timestamp, raw_duration,
};
use crate::session::{Elapsed, Session, SubEventKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Login,
    Logoff,
    User,
    Duration,
    Type,
    Src,
}

impl SortKey {
    pub const NAMES: [&'static str; 6] = ["login", "logoff", "user", "duration", "type", "src"];
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "login" => Ok(SortKey::Login),
            "logoff" => Ok(SortKey::Logoff),
            "user" => Ok(SortKey::User),
            "duration" => Ok(SortKey::Duration),
            "type" => Ok(SortKey::Type),
            "src" => Ok(SortKey::Src),
            other => Err(format!("unknown sort key `{}`", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportSettings {
    sort_by: SortKey,
    format_durations: bool,
    format_logon_types: bool,
    sub_events: bool,
    time_zone: Option<TimeZone>,
}

impl Default for ReportSettings {
    fn default() -> Self {
        ReportSettings {
            sort_by: SortKey::Login,
            format_durations: true,
            format_logon_types: true,
            sub_events: true,
            time_zone: None,
        }
    }
}

impl ReportSettings {
    pub fn new() -> Self {
        ReportSettings::default()
    }

    pub fn sort_by(mut self, key: SortKey) -> Self {
        self.sort_by = key;
        self
    }

    /// When off, durations are printed as raw seconds.
    pub fn format_durations(mut self, enabled: bool) -> Self {
        self.format_durations = enabled;
        self
    }

    /// When off, logon types are printed as their numeric code.
    pub fn format_logon_types(mut self, enabled: bool) -> Self {
        self.format_logon_types = enabled;
        self
    }

    /// Emit derived disconnect/reconnect rows after each session.
    pub fn sub_events(mut self, enabled: bool) -> Self {
        self.sub_events = enabled;
        self
    }

    /// Render timestamps in `tz` instead of UTC.
    pub fn time_zone(mut self, tz: Option<TimeZone>) -> Self {
        self.time_zone = tz;
        self
    }
}

/// One output line. Derived rows have an empty `user`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Row {
    pub user: String,
    pub login: String,
    pub logoff: String,
    pub duration: String,
    #[serde(rename = "type")]
    pub logon_type: String,
    pub src: String,
}

impl Row {
    pub fn is_derived(&self) -> bool {
        self.user.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalKind {
    /// From login to the first disconnect.
    LogonToDisconnect,
    ReconnectToDisconnect,
    /// From the last reconnect to logoff.
    ReconnectToLogoff,
}

impl fmt::Display for IntervalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IntervalKind::LogonToDisconnect => "Logon/Dis",
            IntervalKind::ReconnectToDisconnect => "Rec/Dis",
            IntervalKind::ReconnectToLogoff => "Rec/Logoff",
        })
    }
}

/// A connected stretch of a session, bounded by logon/reconnect and disconnect/logoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interval {
    pub kind: IntervalKind,
    pub start: Option<Timestamp>,
    pub end: Option<Timestamp>,
    pub source: String,
}

impl Interval {
    pub fn duration(&self) -> Elapsed {
        compute_duration(self.start, self.end)
    }
}

enum Connected<'a> {
    SinceLogon,
    SinceReconnect(Timestamp, &'a str),
}

/// Pairs a session's sub-events into connected intervals.
///
/// Sub-events are expected to alternate Disconnect, Reconnect, ... A leading reconnect
/// replaces the logon as the start of the first interval. A sub-event that repeats the
/// current state (a second disconnect while disconnected, a second reconnect while
/// connected) is ignored, so the earliest event of such a run is the one that counts.
pub fn intervals(session: &Session) -> Vec<Interval> {
    let mut out = Vec::new();
    let mut state = Some(Connected::SinceLogon);

    for sub_event in &session.sub_events {
        match (sub_event.kind, state.take()) {
            (SubEventKind::Disconnect, Some(connected)) => {
                let (kind, start, source) = match connected {
                    Connected::SinceLogon => {
                        (IntervalKind::LogonToDisconnect, session.login, session.source.as_str())
                    }
                    Connected::SinceReconnect(time, source) => {
                        (IntervalKind::ReconnectToDisconnect, Some(time), source)
                    }
                };
                out.push(Interval {
                    kind,
                    start,
                    end: Some(sub_event.time),
                    source: source.to_owned(),
                });
            }
            // A reconnect with no disconnect before it still opens its own interval.
            (SubEventKind::Reconnect, None | Some(Connected::SinceLogon)) => {
                state = Some(Connected::SinceReconnect(sub_event.time, &sub_event.source));
            }
            (kind, current) => {
                debug!("{}: ignoring repeated {:?} at {}", session.key, kind, sub_event.time);
                state = current;
            }
        }
    }

    if let Some(Connected::SinceReconnect(time, source)) = state {
        out.push(Interval {
            kind: IntervalKind::ReconnectToLogoff,
            start: Some(time),
            end: session.logoff,
            source: source.to_owned(),
        });
    }

    out
}

fn compare(a: &Session, b: &Session, key: SortKey) -> Ordering {
    let by_field = match key {
        SortKey::Login => a.login.cmp(&b.login),
        SortKey::Logoff => a.logoff.cmp(&b.logoff),
        SortKey::User => a.user().cmp(&b.user()),
        // Unknown durations go last.
        SortKey::Duration => match (a.duration.seconds(), b.duration.seconds()) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
        SortKey::Type => {
            let code = |s: &Session| s.logon_type.clone().unwrap_or_else(|| UNKNOWN.to_string());
            code(a).cmp(&code(b))
        }
        SortKey::Src => a.source.cmp(&b.source),
    };

    by_field.then_with(|| a.key.cmp(&b.key))
}

/// Orders `sessions` and renders them into rows.
pub fn assemble(mut sessions: Vec<Session>, settings: &ReportSettings) -> Vec<Row> {
    sessions.sort_by(|a, b| compare(a, b, settings.sort_by));

    let tz = settings.time_zone.as_ref();
    let duration = |elapsed: Elapsed| {
        if settings.format_durations {
            format_duration(elapsed)
        } else {
            raw_duration(elapsed)
        }
    };

    let mut rows = Vec::with_capacity(sessions.len());
    for session in &sessions {
        let logon_type = if settings.format_logon_types {
            format_logon_type(session.logon_type.as_deref()).to_string()
        } else {
            session.logon_type.clone().unwrap_or_else(|| UNKNOWN.to_string())
        };

        rows.push(Row {
            user: session.user(),
            login: format_timestamp(session.login, tz),
            logoff: format_timestamp(session.logoff, tz),
            duration: duration(session.duration),
            logon_type,
            src: session.source.clone(),
        });

        if !settings.sub_events {
            continue;
        }

        for interval in intervals(session) {
            rows.push(Row {
                user: String::new(),
                login: format_timestamp(interval.start, tz),
                logoff: format_timestamp(interval.end, tz),
                duration: duration(interval.duration()),
                logon_type: interval.kind.to_string(),
                src: interval.source,
            });
        }
    }

    rows
}
