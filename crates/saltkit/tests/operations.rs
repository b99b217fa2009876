//! End-to-end operations through the mock transport.

use saltkit::{
    Classification, Client, Credentials, Error, EscalationDecision, MemoryReporter,
    MockTransport, Notice, RunOptions, SENTINEL, ScriptedEscalation, Target,
};
use serde_json::{Value, json};
use std::time::Duration;

fn connect(mock: &MockTransport, reporter: &MemoryReporter) -> Client {
    Client::connect(
        Box::new(mock.clone()),
        "https://salt.example.com:8000",
        &Credentials::new("jenkins", "secret"),
    )
    .expect("login")
    .with_reporter(Box::new(reporter.clone()))
}

fn setup(response: Value) -> (MockTransport, MemoryReporter, Client) {
    let mock = MockTransport::with_login("token");
    let reporter = MemoryReporter::new();
    let client = connect(&mock, &reporter);
    mock.push_response(response);
    (mock, reporter, client)
}

#[test]
fn test_changed_resource_is_reported_green() {
    colored::control::set_override(true);
    let (_, reporter, client) = setup(json!({"return": [{
        "node1": {"resource1": {"result": true, "changes": {"a": 1}}}
    }]}));

    let options = RunOptions::default().print_only_changes(true);
    let summary = client
        .enforce_state(&Target::glob("node1"), &["app"], &options)
        .unwrap();

    assert!(summary.is_success());
    let reports = reporter.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].node, "node1");
    assert_eq!(reports[0].entries[0].classification, Classification::Success);

    let output = reporter.output();
    assert!(output.contains("Resource: resource1"));
    // ANSI green
    assert!(output.contains("\u{1b}[32m"));
}

#[test]
fn test_failed_resource_raises_state_failure() {
    let (_, reporter, client) = setup(json!({"return": [{
        "node1": {
            "resource1": {"result": false, "changes": {}},
            "resource2": {"result": true, "changes": {"b": 2}}
        }
    }]}));

    let err = client
        .enforce_state(&Target::glob("node1"), &["app"], &RunOptions::default())
        .unwrap_err();

    let message = err.to_string();
    assert!(message.contains("node1"));
    assert!(message.contains("resource1"));
    assert!(matches!(err, Error::StateFailure { .. }));

    // the walk stopped at the failure; nothing after it was reported
    assert!(reporter.reports().is_empty());
    assert!(matches!(reporter.notices().as_slice(), [Notice::Failure { .. }]));
}

#[test]
fn test_empty_return_raises_empty_response() {
    let (_, _, client) = setup(json!({"return": []}));

    let err = client
        .highstate(&Target::glob("*"), &RunOptions::quiet())
        .unwrap_err();
    assert!(matches!(err, Error::EmptyResponse { round: 0 }));
}

#[test]
fn test_command_without_sentinel_names_node() {
    let (mock, reporter, client) = setup(json!({"return": [{
        "node1": "some output without sentinel"
    }]}));

    let err = client
        .run_command(&Target::glob("*"), "apt-get update", true, &RunOptions::default())
        .unwrap_err();

    match err {
        Error::CommandExecutionFailure { node, output, .. } => {
            assert_eq!(node, "node1");
            assert_eq!(output, "some output without sentinel");
        }
        other => panic!("Expected CommandExecutionFailure, got {other:?}"),
    }
    // the sentinel check runs before anything is reported
    assert!(reporter.reports().is_empty());

    let body = mock.last_request().and_then(|r| r.body).unwrap();
    assert!(body["arg"][0].as_str().unwrap().ends_with(SENTINEL));
}

#[test]
fn test_missing_return_is_protocol_error_regardless_of_fail_on_error() {
    for fail_on_error in [true, false] {
        let (_, _, client) = setup(json!({"status": "ok"}));
        let options = RunOptions::default().fail_on_error(fail_on_error);
        let err = client.highstate(&Target::glob("*"), &options).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }
}

#[test]
fn test_no_fail_reports_every_failure() {
    let (_, reporter, client) = setup(json!({"return": [{
        "node1": {"r1": {"result": false, "changes": {}}},
        "node2": {"r2": {"result": "false", "changes": {}}, "r3": {"result": null, "changes": {}}}
    }]}));

    let options = RunOptions::default().fail_on_error(false);
    let summary = client.highstate(&Target::glob("*"), &options).unwrap();

    assert!(!summary.is_success());
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.info, 1);
    assert_eq!(summary.failures[0].node, "node1");
    assert_eq!(summary.failures[1].resource, "r2");
    assert_eq!(reporter.reports().len(), 2);
}

#[test]
fn test_escalation_abort_and_timeout() {
    for (decision, timed_out) in [
        (EscalationDecision::Abort, false),
        (EscalationDecision::TimedOut, true),
    ] {
        let (_, _, client) = setup(json!({"return": [{
            "node1": {"r1": {"result": false, "changes": {}}}
        }]}));
        let client = client
            .with_escalation(Box::new(ScriptedEscalation::new([decision])))
            .escalate_on_failure(true, Duration::from_millis(10));

        let err = client
            .highstate(&Target::glob("*"), &RunOptions::default())
            .unwrap_err();
        if timed_out {
            assert!(matches!(err, Error::EscalationTimedOut { .. }));
        } else {
            assert!(matches!(err, Error::EscalationAborted { .. }));
        }
    }
}

#[test]
fn test_bookkeeping_keys_never_printed() {
    let (_, reporter, client) = setup(json!({"return": [{
        "node1": {"r1": {
            "result": true,
            "changes": {"x": 1},
            "__run_num__": 3,
            "__id__": "r1",
            "pchanges": {}
        }}
    }]}));

    client
        .enforce_state(&Target::glob("*"), &["app"], &RunOptions::default())
        .unwrap();

    let output = reporter.output();
    assert!(!output.contains("__run_num__"));
    assert!(!output.contains("__id__"));
    assert!(!output.contains("pchanges"));
}

#[test]
fn test_transport_failure_is_never_downgraded() {
    let mock = MockTransport::with_login("token");
    let reporter = MemoryReporter::new();
    let client = connect(&mock, &reporter);
    mock.push_error(Error::transport("HTTP 502", Some(502)));

    let options = RunOptions::default().fail_on_error(false);
    let err = client.highstate(&Target::glob("*"), &options).unwrap_err();
    assert!(!err.is_downgradable());
}

#[test]
fn test_login_failure() {
    let mock = MockTransport::new();
    mock.push_response(json!({"return": [{}]}));

    let result = Client::connect(
        Box::new(mock),
        "https://salt.example.com:8000",
        &Credentials::new("jenkins", "wrong"),
    );
    assert!(matches!(result, Err(Error::Auth(_))));
}
