#![recursion_limit = "256"]

use fixtures::*;

use evtx_sessions::{
    Correlator, Elapsed, OutputFormat, RawRecord, ReportSettings, Row, RowWriter, SessionKey,
    SortKey, assemble, raw_record_from_json,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::ops::ControlFlow;

fn correlate(records: Vec<RawRecord>) -> Correlator {
    ensure_env_logger_initialized();
    let mut correlator = Correlator::new();
    correlator.consume(records.into_iter().map(Ok), |_| ControlFlow::Continue(()));
    correlator
}

fn rows(records: Vec<RawRecord>, settings: &ReportSettings) -> Vec<Row> {
    assemble(correlate(records).into_store().into_sessions(), settings)
}

fn csv(rows: &[Row]) -> String {
    let mut writer = RowWriter::new(Vec::new(), OutputFormat::Csv);
    writer.write_all(rows).unwrap();
    String::from_utf8(writer.into_inner()).unwrap()
}

#[test]
fn test_simple_session_duration() {
    let rows = rows(
        vec![
            modern_logon("A", "U1", "1", "2", "2024-01-01 10:00:00", "-", "-"),
            modern_logoff("A", "U1", "1", "2024-01-01 11:30:00"),
        ],
        &ReportSettings::new(),
    );

    assert_eq!(
        csv(&rows),
        "User,Login,Logoff,Duration,Type,Src\n\
         A\\U1,2024-01-01 10:00:00,2024-01-01 11:30:00,1h30m0s,Interactive,-:-\n"
    );
}

#[test]
fn test_disconnect_reconnect_scenario() {
    let rows = rows(
        vec![
            modern_logon("A", "U1", "1", "10", "2024-01-01 10:00:00", "10.0.0.1", "50000"),
            modern_session_change(false, "A", "U1", "1", "2024-01-01 10:10:00", "10.0.0.1"),
            modern_session_change(true, "A", "U1", "1", "2024-01-01 10:20:00", "10.0.0.2"),
            modern_logoff("A", "U1", "1", "2024-01-01 10:30:00"),
        ],
        &ReportSettings::new(),
    );

    assert_eq!(
        csv(&rows),
        "User,Login,Logoff,Duration,Type,Src\n\
         A\\U1,2024-01-01 10:00:00,2024-01-01 10:30:00,30m0s,RemoteInteractive,10.0.0.1:50000\n\
         ,2024-01-01 10:00:00,2024-01-01 10:10:00,10m0s,Logon/Dis,10.0.0.1:50000\n\
         ,2024-01-01 10:20:00,2024-01-01 10:30:00,10m0s,Rec/Logoff,10.0.0.2\n"
    );
}

#[test]
fn test_unrecognized_event_creates_nothing() {
    let correlator = correlate(vec![RawRecord::with_fields(
        9999,
        "2024-01-01 10:00:00",
        ["A", "U1", "1"],
    )]);

    assert!(correlator.store().is_empty());
    assert_eq!(correlator.stats().ignored, 1);
    assert_eq!(correlator.stats().skipped, 0);
}

#[test]
fn test_logon_logoff_order_does_not_matter() {
    let logon = modern_logon(
        "corp",
        "jsmith",
        "0x1",
        "3",
        "2024-01-01T10:00:00.250Z",
        "10.0.0.9",
        "445",
    );
    let logoff = modern_logoff("CORP", "JSMITH", "0x1", "2024-01-01T10:05:00.999Z");

    let forward = correlate(vec![logon.clone(), logoff.clone()]);
    let backward = correlate(vec![logoff, logon]);

    let key = SessionKey::new("corp", "jsmith", "0x1");
    let a = forward.store().get(&key).unwrap();
    let b = backward.store().get(&key).unwrap();

    assert_eq!(a, b);
    assert_eq!(a.duration, Elapsed::Seconds(300));
}

#[test]
fn test_duplicate_logoff_keeps_the_first() {
    let correlator = correlate(vec![
        modern_logon("A", "U1", "1", "2", "2024-01-01 10:00:00", "-", "-"),
        modern_user_logoff("A", "U1", "1", "2024-01-01 10:10:00"),
        modern_logoff("A", "U1", "1", "2024-01-01 10:10:02"),
    ]);

    let session = correlator.store().get(&SessionKey::new("A", "U1", "1")).unwrap();
    assert_eq!(session.duration, Elapsed::Seconds(600));
    assert_eq!(correlator.stats().logoffs, 2);
}

#[test]
fn test_unattributable_sub_events_are_dropped() {
    let correlator = correlate(vec![
        modern_session_change(true, "A", "U1", "7", "2024-01-01 10:00:00", "10.0.0.1"),
        modern_session_change(false, "A", "U1", "7", "2024-01-01 10:05:00", "10.0.0.1"),
    ]);

    assert!(correlator.store().is_empty());
    assert_eq!(correlator.stats().dropped, 2);
}

#[test]
fn test_legacy_schema_session() {
    let change = |reconnect: bool, time: &str, address: &str| {
        legacy_session_change(reconnect, "CORP", "jsmith", "(0x0,0x1A2B)", time, address)
    };

    let rows = rows(
        vec![
            legacy_logon("CORP", "jsmith", "(0x0,0x1A2B)", "10", "2008-03-01 12:00:00"),
            change(false, "2008-03-01 12:30:00", "10.0.0.7"),
            change(true, "2008-03-01 13:00:00", "10.0.0.8"),
            change(false, "2008-03-01 13:15:00", "10.0.0.8"),
            legacy_logoff("corp", "JSMITH", "(0x0,0x1A2B)", "2008-03-02 14:00:01"),
        ],
        &ReportSettings::new(),
    );

    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].user, "CORP\\JSMITH");
    assert_eq!(rows[0].duration, "1d2h1s");
    assert_eq!(rows[0].src, "10.0.0.7:1042");
    assert_eq!(rows[1].logon_type, "Logon/Dis");
    assert_eq!(rows[1].duration, "30m0s");
    assert_eq!(rows[2].logon_type, "Rec/Dis");
    assert_eq!(rows[2].duration, "15m0s");
}

#[test]
fn test_orphan_logoff_row() {
    let rows = rows(
        vec![modern_logoff("A", "U9", "5", "2024-01-01 08:00:00")],
        &ReportSettings::new().format_logon_types(false),
    );

    assert_eq!(
        rows,
        vec![Row {
            user: "A\\U9".to_string(),
            login: "-".to_string(),
            logoff: "2024-01-01 08:00:00".to_string(),
            duration: "?".to_string(),
            logon_type: "?".to_string(),
            src: "-:-".to_string(),
        }]
    );
}

#[test]
fn test_time_zone_is_applied_on_output_only() {
    let tz = jiff::tz::TimeZone::get("America/New_York").unwrap();
    let rows = rows(
        vec![
            modern_logon("A", "U1", "1", "2", "2024-01-01 10:00:00", "-", "-"),
            modern_logoff("A", "U1", "1", "2024-01-01 11:00:00"),
        ],
        &ReportSettings::new().time_zone(Some(tz)),
    );

    assert_eq!(rows[0].login, "2024-01-01 05:00:00");
    assert_eq!(rows[0].logoff, "2024-01-01 06:00:00");
    assert_eq!(rows[0].duration, "1h0s");
}

#[test]
fn test_sort_by_user() {
    let rows = rows(
        vec![
            modern_logon("B", "ZED", "1", "2", "2024-01-01 09:00:00", "-", "-"),
            modern_logon("A", "AMY", "2", "2", "2024-01-01 11:00:00", "-", "-"),
        ],
        &ReportSettings::new().sort_by(SortKey::User),
    );

    let users: Vec<_> = rows.iter().map(|r| r.user.as_str()).collect();
    assert_eq!(users, vec!["A\\AMY", "B\\ZED"]);
}

#[test]
fn test_records_decoded_from_evtx_json() {
    let logon = json!({
        "Event": {
            "System": {
                "EventID": 4624,
                "TimeCreated": { "#attributes": { "SystemTime": "2024-01-01T10:00:00.123456Z" } }
            },
            "EventData": {
                "SubjectUserSid": "S-1-5-18",
                "SubjectUserName": "WS01$",
                "SubjectDomainName": "WORKGROUP",
                "SubjectLogonId": "0x3e7",
                "TargetUserSid": "S-1-5-21-1000",
                "TargetUserName": "jsmith",
                "TargetDomainName": "CORP",
                "TargetLogonId": "0x5a1f2",
                "LogonType": 10,
                "LogonProcessName": "User32 ",
                "AuthenticationPackageName": "Negotiate",
                "WorkstationName": "WS01",
                "LogonGuid": "00000000-0000-0000-0000-000000000000",
                "TransmittedServices": "-",
                "LmPackageName": "-",
                "KeyLength": 0,
                "ProcessId": "0x2f4",
                "ProcessName": "C:\\Windows\\System32\\svchost.exe",
                "IpAddress": "192.168.56.1",
                "IpPort": "0"
            }
        }
    });
    let logoff = json!({
        "Event": {
            "System": {
                "EventID": 4634,
                "TimeCreated": { "#attributes": { "SystemTime": "2024-01-01T10:45:00.9Z" } }
            },
            "EventData": {
                "TargetUserSid": "S-1-5-21-1000",
                "TargetUserName": "jsmith",
                "TargetDomainName": "CORP",
                "TargetLogonId": "0x5a1f2",
                "LogonType": 10
            }
        }
    });

    let records = vec![
        raw_record_from_json(&logon).unwrap(),
        raw_record_from_json(&logoff).unwrap(),
    ];
    let rows = rows(records, &ReportSettings::new());

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].user, "CORP\\JSMITH");
    assert_eq!(rows[0].duration, "45m0s");
    assert_eq!(rows[0].logon_type, "RemoteInteractive");
    assert_eq!(rows[0].src, "192.168.56.1:0");
}
