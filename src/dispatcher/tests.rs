//! Integration tests for the HTTP dispatcher.

use std::net::SocketAddr;
use std::time::Duration;

use rstest::rstest;

use crate::config::HttpSettings;
use crate::identifier::Identifier;
use crate::test_utils::mock_http::{
    MockResponse, endpoint, loopback_listener, refused_addr, spawn_mock_server,
    spawn_silent_server,
};

use super::*;

fn dispatcher_for(addr: SocketAddr, timeout: Duration) -> Dispatcher {
    Dispatcher::new(&HttpSettings {
        endpoint: endpoint(addr),
        request_timeout: timeout,
    })
}

fn uid(text: &str) -> Identifier {
    Identifier::normalize(text).expect("non-empty identifier")
}

#[test]
fn posts_json_and_reports_server_message() {
    let (addr, rx) = spawn_mock_server(
        loopback_listener(),
        vec![MockResponse::new(200, r#"{"message":"ok"}"#)],
    );
    let dispatcher = dispatcher_for(addr, Duration::from_secs(5));

    let outcome = dispatcher.submit(&uid(" a1b2c3 \n"));

    assert_eq!(
        outcome,
        Outcome::Delivered {
            message: Some("ok".into())
        }
    );
    let captured = rx.recv_timeout(Duration::from_secs(5)).expect("request");
    assert_eq!(captured.method, "POST");
    assert_eq!(captured.path, "/api/rfid");
    assert_eq!(captured.body, r#"{"uid":"A1B2C3"}"#);
    assert_eq!(captured.header("content-type"), Some("application/json"));
    assert_eq!(captured.header("accept"), Some("application/json"));
}

#[rstest]
#[case(200, "not json at all")]
#[case(201, "")]
#[case(204, "")]
#[case(200, r#"["message"]"#)]
#[case(299, r#"{"status":"stored"}"#)]
#[case(200, r#"["hello"]"#)]
fn any_2xx_is_delivered(#[case] status: u16, #[case] body: &str) {
    let (addr, _rx) = spawn_mock_server(loopback_listener(), vec![MockResponse::new(status, body)]);
    let outcome = dispatcher_for(addr, Duration::from_secs(5)).submit(&uid("04a31f"));
    assert_eq!(outcome, Outcome::Delivered { message: None });
}

#[test]
fn duplicate_tag_is_rejected_with_body() {
    let (addr, _rx) = spawn_mock_server(
        loopback_listener(),
        vec![MockResponse::new(422, "duplicate tag")],
    );
    let outcome = dispatcher_for(addr, Duration::from_secs(5)).submit(&uid("a1b2c3"));
    assert_eq!(
        outcome,
        Outcome::Rejected {
            status: 422,
            excerpt: "duplicate tag".into()
        }
    );
}

#[test]
fn empty_error_body_uses_reason_phrase() {
    let (addr, _rx) = spawn_mock_server(loopback_listener(), vec![MockResponse::new(404, "")]);
    let outcome = dispatcher_for(addr, Duration::from_secs(5)).submit(&uid("a1b2c3"));
    assert_eq!(
        outcome,
        Outcome::Rejected {
            status: 404,
            excerpt: "Not Found".into()
        }
    );
}

#[test]
fn long_error_body_is_truncated() {
    let body = "e".repeat(400);
    let (addr, _rx) = spawn_mock_server(loopback_listener(), vec![MockResponse::new(500, body)]);
    let outcome = dispatcher_for(addr, Duration::from_secs(5)).submit(&uid("a1b2c3"));
    let Outcome::Rejected { status, excerpt } = outcome else {
        panic!("expected rejection, got {outcome:?}");
    };
    assert_eq!(status, 500);
    assert!(excerpt.chars().count() <= EXCERPT_CHARS + 1);
    assert!(excerpt.ends_with(TRUNCATION_MARKER));
}

#[test]
fn silent_server_times_out() {
    let addr = spawn_silent_server(loopback_listener(), Duration::from_secs(3));
    let outcome = dispatcher_for(addr, Duration::from_millis(200)).submit(&uid("a1b2c3"));
    assert!(
        matches!(outcome, Outcome::NetworkTimeout { .. }),
        "got {outcome:?}"
    );
}

#[test]
fn refused_connection_is_unreachable() {
    let outcome = dispatcher_for(refused_addr(), Duration::from_secs(2)).submit(&uid("a1b2c3"));
    assert!(
        matches!(outcome, Outcome::NetworkUnreachable { .. }),
        "got {outcome:?}"
    );
}

#[test]
fn malformed_endpoint_is_unknown_failure() {
    let dispatcher = Dispatcher::new(&HttpSettings {
        endpoint: "http://exa mple.invalid/api".into(),
        request_timeout: Duration::from_secs(1),
    });
    let outcome = dispatcher.submit(&uid("a1b2c3"));
    assert!(
        matches!(outcome, Outcome::UnknownFailure { .. }),
        "got {outcome:?}"
    );
}

#[test]
fn repeated_submissions_are_independent() {
    let (addr, rx) = spawn_mock_server(
        loopback_listener(),
        vec![
            MockResponse::new(200, r#"{"message":"stored"}"#),
            MockResponse::new(422, "duplicate tag"),
        ],
    );
    let dispatcher = dispatcher_for(addr, Duration::from_secs(5));
    let id = uid("a1b2c3");

    let first = dispatcher.submit(&id);
    let second = dispatcher.submit(&id);

    assert!(first.is_delivered());
    assert!(matches!(second, Outcome::Rejected { status: 422, .. }));
    for _ in 0..2 {
        let captured = rx.recv_timeout(Duration::from_secs(5)).expect("request");
        assert_eq!(captured.body, r#"{"uid":"A1B2C3"}"#);
    }
}

mod response_classification {
    use super::*;

    #[rstest]
    #[case(200, ResponseClass::Success)]
    #[case(201, ResponseClass::Success)]
    #[case(299, ResponseClass::Success)]
    #[case(199, ResponseClass::Rejected)]
    #[case(301, ResponseClass::Rejected)]
    #[case(400, ResponseClass::Rejected)]
    #[case(429, ResponseClass::Rejected)]
    #[case(503, ResponseClass::Rejected)]
    fn status_classification(#[case] status: u16, #[case] expected: ResponseClass) {
        assert_eq!(classify_status(status), expected);
    }

    #[rstest]
    #[case(r#"{"message":"ok"}"#, Some("ok"))]
    #[case(r#"{"message":42}"#, Some("42"))]
    #[case(r#"{"message":null}"#, None)]
    #[case(r#"{"other":"x"}"#, None)]
    #[case(r#"["hello"]"#, None)]
    #[case(r#"["message"]"#, None)]
    #[case(r#""message""#, None)]
    #[case("<html>", None)]
    #[case("", None)]
    fn reply_messages(#[case] body: &str, #[case] expected: Option<&str>) {
        assert_eq!(reply_message(body).as_deref(), expected);
    }

    #[test]
    fn unparsable_success_body_stays_delivered() {
        assert_eq!(
            outcome_for_response(200, "OK", "{broken"),
            Outcome::Delivered { message: None }
        );
    }
}
