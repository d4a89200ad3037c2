use jiff::Timestamp;
use jiff::tz::TimeZone;
use log::warn;

use crate::err::{Result, SessionError};
use crate::session::Elapsed;

/// Rendered in place of a missing timestamp.
pub const UNSET_TIME: &str = "-";
/// Rendered in place of an unknown duration or logon type.
pub const UNKNOWN: &str = "?";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// `logoff - login` in whole seconds.
///
/// Endpoints that are out of order (clock skew, misattributed records) yield
/// [`Elapsed::Unknown`] rather than a negative duration.
pub fn compute_duration(login: Option<Timestamp>, logoff: Option<Timestamp>) -> Elapsed {
    let (Some(login), Some(logoff)) = (login, logoff) else {
        return Elapsed::Unknown;
    };

    let secs = logoff.as_second() - login.as_second();
    match u64::try_from(secs) {
        Ok(secs) => Elapsed::Seconds(secs),
        Err(_) => {
            warn!("logoff {} precedes login {}, duration is unknown", logoff, login);
            Elapsed::Unknown
        }
    }
}

/// `5025` -> `1h23m45s`. Leading zero units are omitted, seconds are always present.
pub fn format_duration(elapsed: Elapsed) -> String {
    let Elapsed::Seconds(mut secs) = elapsed else {
        return UNKNOWN.to_string();
    };

    let mut out = String::new();
    for (unit, suffix) in [(86_400, 'd'), (3_600, 'h'), (60, 'm')] {
        if secs >= unit {
            out.push_str(&(secs / unit).to_string());
            out.push(suffix);
            secs %= unit;
        }
    }
    out.push_str(&secs.to_string());
    out.push('s');
    out
}

/// Raw seconds, as printed when duration formatting is turned off.
pub fn raw_duration(elapsed: Elapsed) -> String {
    match elapsed {
        Elapsed::Seconds(secs) => secs.to_string(),
        Elapsed::Unknown => UNKNOWN.to_string(),
    }
}

pub fn format_logon_type(code: Option<&str>) -> &'static str {
    match code.map(str::trim) {
        Some("0") => "SystemOnly",
        Some("2") => "Interactive",
        Some("3") => "Network",
        Some("4") => "Batch",
        Some("5") => "Service",
        Some("6") => "Proxy",
        Some("7") => "Unlock",
        Some("8") => "NetClearText",
        Some("9") => "NewCred",
        Some("10") => "RemoteInteractive",
        Some("11") => "CachedInteractive",
        Some("12") => "CachedRemoteInteractive",
        Some("13") => "CachedUnlock",
        _ => UNKNOWN,
    }
}

/// `YYYY-MM-DD HH:MM:SS`, in UTC unless a zone is given.
pub fn format_timestamp(ts: Option<Timestamp>, tz: Option<&TimeZone>) -> String {
    match (ts, tz) {
        (None, _) => UNSET_TIME.to_string(),
        (Some(ts), None) => ts.strftime(TIME_FORMAT).to_string(),
        (Some(ts), Some(tz)) => ts.to_zoned(tz.clone()).strftime(TIME_FORMAT).to_string(),
    }
}

/// Looks up a tz database zone such as `Europe/Warsaw`.
pub fn resolve_time_zone(name: &str) -> Result<TimeZone> {
    TimeZone::get(name).map_err(|source| SessionError::UnknownTimeZone {
        name: name.to_owned(),
        source,
    })
}
