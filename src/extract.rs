//! Field extractor: turns a [`RawRecord`] plus its [`FieldLayout`] into typed values.

use std::borrow::Cow;

use jiff::Timestamp;
use quick_xml::Reader;
use quick_xml::events::Event;

use crate::err::ExtractError;
use crate::event_kind::{FieldLayout, Schema};
use crate::record::{Payload, RawRecord, parse_timestamp};

/// Source address used when a logon record does not carry one.
pub const UNKNOWN_SOURCE: &str = "-:-";
/// Client address used when a session change record does not carry one.
pub const UNKNOWN_CLIENT: &str = "-";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFields {
    pub time: Timestamp,
    pub domain: String,
    pub user: String,
    pub logon_id: String,
    /// Raw numeric logon type code, logon records only.
    pub logon_type: Option<String>,
    /// `host:port` for logons, client address for reconnect/disconnect.
    pub source: Option<String>,
}

pub fn extract(record: &RawRecord, layout: FieldLayout) -> Result<ExtractedFields, ExtractError> {
    let fields: Cow<'_, [String]> = match (&record.payload, layout.schema()) {
        (Payload::Fields(fields), _) => Cow::Borrowed(fields.as_slice()),
        (Payload::Blob(blob), Schema::Legacy) => Cow::Owned(split_legacy_blob(blob)?),
        (Payload::Blob(_), Schema::Modern) => {
            return Err(ExtractError::UnexpectedBlob { layout });
        }
    };

    let positions = layout.positions();
    let need = positions.required();
    if fields.len() < need {
        return Err(ExtractError::TooFewFields {
            layout,
            need,
            have: fields.len(),
        });
    }

    let time = parse_timestamp(&record.time_created)?;
    let at = |idx: usize| fields[idx].trim().to_owned();
    let get = |idx: Option<usize>| idx.and_then(|i| fields.get(i)).map(|v| v.trim().to_owned());

    let source = match (get(positions.source_host), positions.source_port) {
        (Some(host), Some(port_idx)) => {
            get(Some(port_idx)).map(|port| format!("{}:{}", host, port))
        }
        (Some(host), None) => Some(host),
        (None, _) => None,
    };

    Ok(ExtractedFields {
        time,
        domain: at(positions.domain),
        user: at(positions.user),
        logon_id: at(positions.logon_id),
        logon_type: get(positions.logon_type),
        source,
    })
}

/// Splits a legacy `<string>` blob into positional values.
///
/// Empty elements (`<string/>`) yield an empty value so positions are preserved.
pub fn split_legacy_blob(blob: &str) -> Result<Vec<String>, ExtractError> {
    let malformed = |e: quick_xml::Error| ExtractError::MalformedBlob {
        message: e.to_string(),
    };

    let mut reader = Reader::from_str(blob.trim());
    let mut values = Vec::new();
    let mut current: Option<String> = None;

    loop {
        match reader.read_event().map_err(malformed)? {
            Event::Start(_) => current = Some(String::new()),
            Event::Text(text) => {
                if let Some(value) = current.as_mut() {
                    let text = text.unescape().map_err(malformed)?;
                    value.push_str(&text);
                }
            }
            Event::CData(data) => {
                if let Some(value) = current.as_mut() {
                    value.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::End(_) => {
                if let Some(value) = current.take() {
                    values.push(value);
                }
            }
            Event::Empty(_) => values.push(String::new()),
            Event::Eof => break,
            _ => {}
        }
    }

    if current.is_some() {
        return Err(ExtractError::MalformedBlob {
            message: "unterminated element".to_string(),
        });
    }

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn legacy_logon_blob(with_source: bool) -> String {
        let mut parts = vec![
            "jsmith", "CORP", "(0x0,0x3E7)", "10", "User32", "Negotiate", "WS01", "-", "WS01$",
            "CORP", "(0x0,0x3E7)", "1234", "-",
        ];
        if with_source {
            parts.extend(["10.0.0.5", "3389"]);
        }
        parts
            .iter()
            .map(|p| format!("<string>{}</string>", p))
            .collect()
    }

    fn modern_logon_fields() -> Vec<String> {
        [
            "S-1-5-18", "WS01$", "CORP", "0x3e7", "S-1-5-21-1", "jsmith", "corp", "0x1a2b", "10",
            "User32", "Negotiate", "WS01", "{00000000-0000-0000-0000-000000000000}", "-", "-", "0",
            "0x1f4", "C:\\Windows\\System32\\winlogon.exe", "192.168.1.20", "51234",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    #[test]
    fn test_it_splits_legacy_blob() {
        let values =
            split_legacy_blob("<string>a</string><string/><string>c &amp; d</string>").unwrap();
        assert_eq!(values, vec!["a", "", "c & d"]);
    }

    #[test]
    fn test_it_rejects_unterminated_blob() {
        assert!(matches!(
            split_legacy_blob("<string>a</string><string>b"),
            Err(ExtractError::MalformedBlob { .. })
        ));
    }

    #[test]
    fn test_extract_legacy_logon() {
        let record = RawRecord::with_blob(528, "2008-03-01 12:00:00", legacy_logon_blob(true));
        let fields = extract(&record, FieldLayout::LegacyLogon).unwrap();

        assert_eq!(fields.user, "jsmith");
        assert_eq!(fields.domain, "CORP");
        assert_eq!(fields.logon_id, "(0x0,0x3E7)");
        assert_eq!(fields.logon_type.as_deref(), Some("10"));
        assert_eq!(fields.source.as_deref(), Some("10.0.0.5:3389"));
    }

    #[test]
    fn test_extract_legacy_logon_without_source() {
        let record = RawRecord::with_blob(528, "2008-03-01 12:00:00", legacy_logon_blob(false));
        let fields = extract(&record, FieldLayout::LegacyLogon).unwrap();

        assert_eq!(fields.source, None);
        assert_eq!(fields.logon_type.as_deref(), Some("10"));
    }

    #[test]
    fn test_extract_modern_logon() {
        let record = RawRecord::with_fields(4624, "2024-01-01T10:00:00.5Z", modern_logon_fields());
        let fields = extract(&record, FieldLayout::ModernLogon).unwrap();

        assert_eq!(fields.user, "jsmith");
        assert_eq!(fields.domain, "corp");
        assert_eq!(fields.logon_id, "0x1a2b");
        assert_eq!(fields.logon_type.as_deref(), Some("10"));
        assert_eq!(fields.source.as_deref(), Some("192.168.1.20:51234"));
        assert_eq!(fields.time.to_string(), "2024-01-01T10:00:00Z");
    }

    #[test]
    fn test_extract_reports_short_records() {
        let record = RawRecord::with_fields(4634, "2024-01-01 10:00:00", ["S-1-5-21-1", "jsmith"]);
        assert_eq!(
            extract(&record, FieldLayout::ModernLogoff),
            Err(ExtractError::TooFewFields {
                layout: FieldLayout::ModernLogoff,
                need: 4,
                have: 2,
            })
        );
    }

    #[test]
    fn test_extract_modern_layout_refuses_blob() {
        let record = RawRecord::with_blob(4634, "2024-01-01 10:00:00", "<string>a</string>");
        assert_eq!(
            extract(&record, FieldLayout::ModernLogoff),
            Err(ExtractError::UnexpectedBlob {
                layout: FieldLayout::ModernLogoff
            })
        );
    }

    #[test]
    fn test_extract_session_change_client_address() {
        let record = RawRecord::with_fields(
            4779,
            "2024-01-01 10:10:00",
            ["jsmith", "CORP", "0x1a2b", "RDP-Tcp#3", "LAPTOP", "10.1.1.1"],
        );
        let fields = extract(&record, FieldLayout::ModernSessionChange).unwrap();

        assert_eq!(fields.source.as_deref(), Some("10.1.1.1"));
        assert_eq!(fields.logon_type, None);
    }
}
