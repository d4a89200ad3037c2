//! Event type registry.
//!
//! Maps Security audit event identifiers from both log generations onto an
//! [`EventKind`] and the [`FieldLayout`] that says how the record's data must be read.
//!
//! | Kind       | Legacy (`.evt` era) | Modern (Vista+) |
//! |------------|---------------------|-----------------|
//! | Logon      | 528                 | 4624            |
//! | Logoff     | 538, 551            | 4634, 4647      |
//! | Reconnect  | 682                 | 4778            |
//! | Disconnect | 683                 | 4779            |

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Logon,
    Logoff,
    Reconnect,
    Disconnect,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Logon => "logon",
            EventKind::Logoff => "logoff",
            EventKind::Reconnect => "reconnect",
            EventKind::Disconnect => "disconnect",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Schema {
    /// Data arrives as a single `<string>..</string>` blob that must be split.
    Legacy,
    /// Data arrives as a flat positional array.
    Modern,
}

/// Named positions of the fields needed from one event layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldPositions {
    pub user: usize,
    pub domain: usize,
    pub logon_id: usize,
    pub logon_type: Option<usize>,
    /// Host part of the source address (client address for session changes).
    pub source_host: Option<usize>,
    /// Only logon records carry a separate source port.
    pub source_port: Option<usize>,
}

impl FieldPositions {
    /// Fields that must be present for the record to be usable at all.
    pub fn required(&self) -> usize {
        [Some(self.user), Some(self.domain), Some(self.logon_id), self.logon_type]
            .into_iter()
            .flatten()
            .max()
            .map_or(0, |max| max + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldLayout {
    LegacyLogon,
    ModernLogon,
    LegacyLogoff,
    ModernLogoff,
    LegacySessionChange,
    ModernSessionChange,
}

impl FieldLayout {
    pub fn schema(self) -> Schema {
        match self {
            FieldLayout::LegacyLogon
            | FieldLayout::LegacyLogoff
            | FieldLayout::LegacySessionChange => Schema::Legacy,
            FieldLayout::ModernLogon
            | FieldLayout::ModernLogoff
            | FieldLayout::ModernSessionChange => Schema::Modern,
        }
    }

    pub fn positions(self) -> FieldPositions {
        match self {
            // User, Domain, LogonId, LogonType, ..., SourceNetworkAddress(13), SourcePort(14)
            FieldLayout::LegacyLogon => FieldPositions {
                user: 0,
                domain: 1,
                logon_id: 2,
                logon_type: Some(3),
                source_host: Some(13),
                source_port: Some(14),
            },
            // TargetUserName(5), TargetDomainName(6), TargetLogonId(7), LogonType(8),
            // IpAddress(18), IpPort(19)
            FieldLayout::ModernLogon => FieldPositions {
                user: 5,
                domain: 6,
                logon_id: 7,
                logon_type: Some(8),
                source_host: Some(18),
                source_port: Some(19),
            },
            FieldLayout::LegacyLogoff => FieldPositions {
                user: 0,
                domain: 1,
                logon_id: 2,
                logon_type: None,
                source_host: None,
                source_port: None,
            },
            // TargetUserSid(0), TargetUserName(1), TargetDomainName(2), TargetLogonId(3)
            FieldLayout::ModernLogoff => FieldPositions {
                user: 1,
                domain: 2,
                logon_id: 3,
                logon_type: None,
                source_host: None,
                source_port: None,
            },
            // AccountName, AccountDomain, LogonID, SessionName, ClientName, ClientAddress
            FieldLayout::LegacySessionChange | FieldLayout::ModernSessionChange => {
                FieldPositions {
                    user: 0,
                    domain: 1,
                    logon_id: 2,
                    logon_type: None,
                    source_host: Some(5),
                    source_port: None,
                }
            }
        }
    }
}

/// Registry entry for a recognized event identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventType {
    pub kind: EventKind,
    pub layout: FieldLayout,
}

impl EventType {
    const fn new(kind: EventKind, layout: FieldLayout) -> Self {
        EventType { kind, layout }
    }

    /// Looks up an event identifier. Anything outside the table is `None`.
    pub fn lookup(event_id: u32) -> Option<EventType> {
        use EventKind::*;
        use FieldLayout::*;

        let entry = match event_id {
            528 => EventType::new(Logon, LegacyLogon),
            538 | 551 => EventType::new(Logoff, LegacyLogoff),
            682 => EventType::new(Reconnect, LegacySessionChange),
            683 => EventType::new(Disconnect, LegacySessionChange),
            4624 => EventType::new(Logon, ModernLogon),
            4634 | 4647 => EventType::new(Logoff, ModernLogoff),
            4778 => EventType::new(Reconnect, ModernSessionChange),
            4779 => EventType::new(Disconnect, ModernSessionChange),
            _ => return None,
        };

        Some(entry)
    }
}

pub fn classify(event_id: u32) -> Option<EventKind> {
    EventType::lookup(event_id).map(|t| t.kind)
}
