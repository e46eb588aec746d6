//! Scripted serial input relayed through a real dispatcher to a local server.

use std::time::Duration;

use rstest::{fixture, rstest};
use tag_relay::{
    Dispatcher, Outcome, Relay, RelayConfig,
    relay::{LoopState, Step},
    shutdown,
    test_utils::{
        mock_http::{MockResponse, endpoint, loopback_listener, refused_addr, spawn_mock_server},
        scripted::{ScriptedRead, ScriptedSource},
    },
};

fn config_for(endpoint: String) -> RelayConfig {
    RelayConfig::builder()
        .with_endpoint(endpoint)
        .with_pacing_ms(1)
        .with_request_timeout_ms(2_000)
        .build()
        .expect("valid config")
}

#[fixture]
fn idle_source() -> ScriptedSource {
    ScriptedSource::new([ScriptedRead::Idle])
}

#[test]
fn trimmed_uppercase_identifier_reaches_server() {
    let (addr, rx) = spawn_mock_server(
        loopback_listener(),
        vec![MockResponse::new(200, r#"{"message":"stored"}"#)],
    );
    let config = config_for(endpoint(addr));
    let (_trigger, shutdown) = shutdown::channel();
    let source = ScriptedSource::new([ScriptedRead::line(" a1b2c3 \n")]);
    let mut relay = Relay::new(source, Dispatcher::new(&config.http), &config, shutdown);

    let step = relay.step();

    assert_eq!(
        step.outcome(),
        Some(Outcome::Delivered {
            message: Some("stored".into())
        })
    );
    let captured = rx.recv_timeout(Duration::from_secs(5)).expect("request");
    assert_eq!(captured.body, r#"{"uid":"A1B2C3"}"#);
    assert_eq!(relay.state(), LoopState::Idle);
}

#[test]
fn rejection_is_reported_and_loop_continues() {
    let (addr, rx) = spawn_mock_server(
        loopback_listener(),
        vec![
            MockResponse::new(422, "duplicate tag"),
            MockResponse::new(201, ""),
        ],
    );
    let config = config_for(endpoint(addr));
    let (trigger, shutdown) = shutdown::channel();
    let source = ScriptedSource::new([ScriptedRead::line("04a31f"), ScriptedRead::line("04a31f")])
        .stop_when_drained(trigger);
    let mut relay = Relay::new(
        source.clone(),
        Dispatcher::new(&config.http),
        &config,
        shutdown,
    );

    relay.run().expect("stops on shutdown");

    assert_eq!(relay.state(), LoopState::Stopped);
    assert_eq!(source.remaining(), 0);
    for _ in 0..2 {
        let captured = rx.recv_timeout(Duration::from_secs(5)).expect("request");
        assert_eq!(captured.body, r#"{"uid":"04A31F"}"#);
    }
}

#[rstest]
fn idle_read_sends_nothing(idle_source: ScriptedSource) {
    let (addr, rx) = spawn_mock_server(loopback_listener(), vec![MockResponse::new(200, "")]);
    let config = config_for(endpoint(addr));
    let (_trigger, shutdown) = shutdown::channel();
    let mut relay = Relay::new(idle_source, Dispatcher::new(&config.http), &config, shutdown);

    assert!(matches!(relay.step(), Step::Idle));
    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
}

#[test]
fn unreachable_server_does_not_stop_the_loop() {
    let config = config_for(endpoint(refused_addr()));
    let (trigger, shutdown) = shutdown::channel();
    let source = ScriptedSource::new([
        ScriptedRead::line("a1"),
        ScriptedRead::Idle,
        ScriptedRead::line("b2"),
    ])
    .stop_when_drained(trigger);
    let mut relay = Relay::new(
        source.clone(),
        Dispatcher::new(&config.http),
        &config,
        shutdown,
    );

    relay.run().expect("stops on shutdown");

    assert_eq!(source.remaining(), 0);
    assert_eq!(source.reconnect_attempts(), 0);
}
