//! Session tests against the scripted transport.
//!
//! These cover the full login → fetch → aggregate → submit → logout sequence,
//! the credential retry and the release of the connection on every exit path.

use recap_client::mock::{LoginReply, MockCall, MockHandle, MockTransport};
use recap_client::{
    ClientError, Credentials, FetchMode, PollConfig, PollFetcher, RecordKind, Session,
    SessionPlan,
};
use recap_proto::{BatchFetchResult, FetchResult, ItemA, ItemB, ItemC, ItemEnvelope};

fn credentials() -> Credentials {
    Credentials {
        name: "novelins".to_string(),
        key: 123,
    }
}

fn item_a(x: &str, y: &[i32], z: Option<i32>) -> ItemA {
    ItemA {
        field_x: x.to_string(),
        field_y: y.to_vec(),
        field_z: z,
    }
}

fn single_stream(mock: MockTransport) -> MockTransport {
    mock.with_fetches([
        FetchResult::pending(),
        FetchResult::ready(item_a("A", &[1, 2], Some(5))),
        FetchResult::ready(item_a("B", &[1, 2], Some(5))),
        FetchResult::ended(),
    ])
}

fn session(mock: MockTransport, plan: SessionPlan) -> (Session<MockTransport>, MockHandle) {
    let handle = mock.handle();
    (Session::new(mock, credentials(), plan), handle)
}

#[tokio::test(start_paused = true)]
async fn test_single_mode_happy_path() {
    let (session, handle) = session(single_stream(MockTransport::new()), SessionPlan::default());

    let report = session.run().await.expect("session should succeed");

    assert_eq!(report.mode, FetchMode::Single);
    assert_eq!(report.fetch_stats.records, 2);
    assert_eq!(report.fetch_stats.pending, 1);
    assert_eq!(report.summary.get("fieldX").unwrap(), &["A", "B"]);
    assert_eq!(report.summary.get("fieldY").unwrap(), &["1,2"]);
    assert_eq!(report.summary.get("fieldZ").unwrap(), &["5"]);
    assert!(report.logout_error.is_none());

    let calls = handle.calls();
    assert_eq!(
        calls.first(),
        Some(&MockCall::Login {
            name: "novelins".to_string(),
            key: 123
        })
    );
    assert!(!calls
        .iter()
        .any(|c| matches!(c, MockCall::NegotiateCapabilities { .. })));
    assert_eq!(handle.submitted_summary(), Some(report.summary.clone()));
    assert_eq!(&calls[calls.len() - 2..], &[MockCall::Logout, MockCall::Close]);
}

#[tokio::test]
async fn test_batch_mode_negotiates_before_fetching() {
    let mock = MockTransport::new()
        .with_batch(BatchFetchResult::ready(vec![
            ItemEnvelope::from(ItemB {
                field_x: 4,
                field_y: None,
                field_z: vec!["p".to_string(), "q".to_string()],
            }),
            ItemEnvelope::from(ItemC { field_x: true }),
        ]))
        .with_batch(BatchFetchResult::ended());
    let plan = SessionPlan::new(vec![RecordKind::ItemB, RecordKind::ItemC], 30, 3);
    let (session, handle) = session(mock, plan);

    let report = session.run().await.unwrap();

    assert_eq!(report.mode, FetchMode::Batch { size: 3 });
    assert_eq!(report.summary.get("fieldX").unwrap(), &["4", "true"]);
    assert_eq!(report.summary.get("fieldY"), None);
    assert_eq!(report.summary.get("fieldZ").unwrap(), &["p,q"]);

    let calls = handle.calls();
    assert_eq!(
        calls[1],
        MockCall::NegotiateCapabilities {
            accepted: vec![RecordKind::ItemB, RecordKind::ItemC],
            limit: 30
        }
    );
    assert_eq!(calls[2], MockCall::FetchBatch { count: 3 });
    assert_eq!(handle.count(|c| matches!(c, MockCall::Fetch)), 0);
}

#[tokio::test]
async fn test_invalid_key_is_retried_once_with_expected_key() {
    let mock = MockTransport::new().with_login(LoginReply::InvalidKey { expected_key: 99 });
    let (session, handle) = session(mock, SessionPlan::default());

    session.run().await.unwrap();

    assert_eq!(handle.login_keys(), vec![123, 99]);
}

#[tokio::test]
async fn test_second_login_failure_aborts_without_third_attempt() {
    let mock = MockTransport::new()
        .with_login(LoginReply::InvalidKey { expected_key: 99 })
        .with_login(LoginReply::InvalidKey { expected_key: 100 })
        .with_login(LoginReply::Accept);
    let (session, handle) = session(mock, SessionPlan::default());

    let err = session.run().await.unwrap_err();

    assert!(matches!(
        err,
        ClientError::InvalidCredentialsKey { expected_key: 100 }
    ));
    assert_eq!(handle.login_keys(), vec![123, 99]);
    assert_eq!(handle.count(|c| matches!(c, MockCall::Fetch)), 0);
    assert_eq!(handle.count(|c| matches!(c, MockCall::Logout)), 0);
    assert_eq!(handle.close_count(), 1);
}

#[tokio::test]
async fn test_other_login_failure_is_not_retried() {
    let mock = MockTransport::new().with_login(LoginReply::Deny("locked".to_string()));
    let (session, handle) = session(mock, SessionPlan::default());

    let err = session.run().await.unwrap_err();

    assert!(matches!(err, ClientError::RpcStatus(_)));
    assert_eq!(handle.login_keys(), vec![123]);
    assert_eq!(handle.close_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_summary_still_logs_out_and_closes() {
    let mock = single_stream(MockTransport::new()).with_summary_ack(false);
    let (session, handle) = session(mock, SessionPlan::default());

    let err = session.run().await.unwrap_err();

    assert!(matches!(err, ClientError::SummaryRejected));
    assert_eq!(handle.count(|c| matches!(c, MockCall::Logout)), 1);
    assert_eq!(handle.close_count(), 1);
    assert_eq!(handle.calls().last(), Some(&MockCall::Close));
}

#[tokio::test(start_paused = true)]
async fn test_logout_failure_does_not_retract_submission() {
    let mock = single_stream(MockTransport::new()).with_logout_failure("not logged in");
    let (session, handle) = session(mock, SessionPlan::default());

    let report = session.run().await.unwrap();

    let logout_error = report.logout_error.expect("logout error should be reported");
    assert!(logout_error.contains("not logged in"));
    assert!(handle.submitted_summary().is_some());
    assert_eq!(handle.close_count(), 1);
}

#[tokio::test]
async fn test_malformed_batch_aborts_session_and_releases_connection() {
    let both = ItemEnvelope {
        item_a: Some(item_a("a", &[], None)),
        item_b: Some(ItemB::default()),
        item_c: None,
    };
    let mock = MockTransport::new().with_batch(BatchFetchResult::ready(vec![both]));
    let plan = SessionPlan::new(vec![RecordKind::ItemA, RecordKind::ItemB], 10, 2);
    let (session, handle) = session(mock, plan);

    let err = session.run().await.unwrap_err();

    assert!(matches!(err, ClientError::MalformedEnvelope { .. }));
    assert!(handle.submitted_summary().is_none());
    assert_eq!(handle.count(|c| matches!(c, MockCall::Logout)), 0);
    assert_eq!(handle.close_count(), 1);
}

#[tokio::test]
async fn test_unexpected_status_aborts_session() {
    let mock = MockTransport::new().with_fetch(FetchResult {
        status: 17,
        item: None,
    });
    let (session, handle) = session(mock, SessionPlan::default());

    let err = session.run().await.unwrap_err();

    assert!(matches!(err, ClientError::UnexpectedResponseStatus(17)));
    assert_eq!(handle.close_count(), 1);
}

#[tokio::test]
async fn test_rejected_capabilities_abort_before_fetch() {
    let mock = MockTransport::new().with_capabilities_ack(false);
    let plan = SessionPlan::new(vec![RecordKind::ItemC], 10, 2);
    let (session, handle) = session(mock, plan);

    let err = session.run().await.unwrap_err();

    assert!(matches!(err, ClientError::CapabilitiesRejected));
    assert_eq!(handle.count(|c| matches!(c, MockCall::FetchBatch { .. })), 0);
    assert_eq!(handle.close_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_poll_limit_from_custom_fetcher() {
    let mock = MockTransport::new().with_fetches(std::iter::repeat(FetchResult::pending()).take(5));
    let (session, handle) = session(mock, SessionPlan::default());
    let session = session.with_fetcher(PollFetcher::new(PollConfig {
        max_polls: 2,
        ..PollConfig::default()
    }));

    let err = session.run().await.unwrap_err();

    assert!(matches!(err, ClientError::PollLimitExceeded { polls: 2 }));
    assert_eq!(handle.count(|c| matches!(c, MockCall::Fetch)), 2);
    assert_eq!(handle.close_count(), 1);
}

fn assert_unavailable(err: &ClientError) {
    match err {
        ClientError::RpcStatus(status) => assert_eq!(status.code(), tonic::Code::Unavailable),
        other => panic!("expected an RPC status error, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_failed_fetch_stops_polling_and_releases_connection() {
    let mock =
        MockTransport::new().with_fetch_failure(tonic::Status::unavailable("server went away"));
    let (session, handle) = session(mock, SessionPlan::default());

    let err = session.run().await.unwrap_err();

    assert_unavailable(&err);
    assert_eq!(handle.count(|c| matches!(c, MockCall::Fetch)), 1);
    assert!(handle.submitted_summary().is_none());
    assert_eq!(handle.count(|c| matches!(c, MockCall::Logout)), 0);
    assert_eq!(handle.close_count(), 1);
}

#[tokio::test]
async fn test_failed_batch_fetch_is_propagated() {
    let mock = MockTransport::new().with_batch_failure(tonic::Status::unavailable("reset"));
    let plan = SessionPlan::new(vec![RecordKind::ItemB], 10, 2);
    let (session, handle) = session(mock, plan);

    let err = session.run().await.unwrap_err();

    assert_unavailable(&err);
    assert_eq!(handle.count(|c| matches!(c, MockCall::FetchBatch { .. })), 1);
    assert_eq!(handle.close_count(), 1);
}

#[tokio::test]
async fn test_failed_negotiation_is_propagated() {
    let mock = MockTransport::new().with_capabilities_failure(tonic::Status::unavailable("down"));
    let plan = SessionPlan::new(vec![RecordKind::ItemC], 10, 2);
    let (session, handle) = session(mock, plan);

    let err = session.run().await.unwrap_err();

    assert_unavailable(&err);
    assert_eq!(handle.count(|c| matches!(c, MockCall::FetchBatch { .. })), 0);
    assert_eq!(handle.close_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_submission_aborts_without_logout() {
    let mock = single_stream(MockTransport::new())
        .with_save_failure(tonic::Status::unavailable("reports offline"));
    let (session, handle) = session(mock, SessionPlan::default());

    let err = session.run().await.unwrap_err();

    assert_unavailable(&err);
    assert!(handle.submitted_summary().is_some());
    assert_eq!(handle.count(|c| matches!(c, MockCall::Logout)), 0);
    assert_eq!(handle.close_count(), 1);
    assert_eq!(handle.calls().last(), Some(&MockCall::Close));
}
