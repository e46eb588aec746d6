//! Each outcome is logged under its own category tag.
//!
//! `logtest` installs a process-wide logger, so this file holds one test.

use log::Level;
use logtest::Logger;
use tag_relay::{
    Outcome, Relay, RelayConfig,
    shutdown,
    test_utils::scripted::{RecordingSubmitter, ScriptedRead, ScriptedSource},
};

#[test]
fn outcomes_are_logged_with_distinct_tags() {
    let mut logger = Logger::start();
    let config = RelayConfig::builder()
        .with_pacing_ms(1)
        .build()
        .expect("valid config");
    let (trigger, shutdown) = shutdown::channel();
    let source = ScriptedSource::new([
        ScriptedRead::line("aa"),
        ScriptedRead::line("bb"),
        ScriptedRead::line("cc"),
        ScriptedRead::line("dd"),
        ScriptedRead::line("ee"),
        ScriptedRead::Disconnect,
    ])
    .stop_when_drained(trigger);
    let submitter = RecordingSubmitter::with_outcomes([
        Outcome::Delivered {
            message: Some("ok".into()),
        },
        Outcome::Rejected {
            status: 422,
            excerpt: "duplicate tag".into(),
        },
        Outcome::NetworkTimeout {
            detail: "timed out".into(),
        },
        Outcome::NetworkUnreachable {
            detail: "connection refused".into(),
        },
        Outcome::UnknownFailure {
            detail: "boom".into(),
        },
    ]);
    let mut relay = Relay::new(source, submitter, &config, shutdown);

    relay.run().expect("stops on shutdown");

    let mut records = Vec::new();
    while let Some(record) = logger.pop() {
        records.push((record.level(), record.args().to_owned()));
    }
    let find = |tag: &str| {
        records
            .iter()
            .find(|(_, message)| message.starts_with(tag))
            .map(|(level, _)| *level)
    };

    assert_eq!(find("[tag] detected AA"), Some(Level::Info));
    assert_eq!(find("[delivered]"), Some(Level::Info));
    assert_eq!(find("[rejected]"), Some(Level::Warn));
    assert_eq!(find("[network-timeout]"), Some(Level::Warn));
    assert_eq!(find("[network-unreachable]"), Some(Level::Warn));
    assert_eq!(find("[unknown-failure]"), Some(Level::Error));
    assert_eq!(find("[serial-failure]"), Some(Level::Warn));
    assert_eq!(find("[serial] reconnected"), Some(Level::Info));
    assert!(
        records
            .iter()
            .any(|(_, message)| message.contains("server response: ok"))
    );
}
