//! The relay loop.
//!
//! Each iteration reads at most one line, normalizes it, submits it and
//! logs the classified result. Nothing that happens inside an iteration
//! ends the loop; only a shutdown request or an exhausted reconnect
//! deadline does. Every iteration is followed by a pause: the pacing delay
//! normally, or the backoff delay while the serial port is being re-opened.

use std::time::{Duration, Instant};

use encoding_rs::Encoding;
use log::{debug, error, info, trace, warn};
use thiserror::Error;

use crate::{
    backoff::BackoffState,
    config::{HttpSettings, RelayConfig},
    dispatcher::{Outcome, Submit},
    identifier::{Identifier, decode_line},
    reader::{ConnectionError, LineSource, SerialError},
    shutdown::Shutdown,
};

/// Where the loop currently is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    /// Waiting for a line.
    Idle,
    LineReceived,
    Dispatching,
    /// The serial handle was lost and is being re-opened.
    Reconnecting,
    Stopped,
}

/// Result of one loop iteration.
#[derive(Debug)]
pub enum Step {
    /// The read wait elapsed without a line.
    Idle,
    /// A line arrived but held nothing after decoding and trimming.
    Discarded,
    Dispatched {
        identifier: Identifier,
        outcome: Outcome,
    },
    SerialFailure(SerialError),
    Reconnected,
    ReconnectFailed(ConnectionError),
}

impl Step {
    /// The outcome this iteration contributes to the log, if any.
    pub fn outcome(&self) -> Option<Outcome> {
        match self {
            Self::Dispatched { outcome, .. } => Some(outcome.clone()),
            Self::SerialFailure(err) => Some(Outcome::SerialFailure {
                detail: err.to_string(),
            }),
            Self::ReconnectFailed(err) => Some(Outcome::SerialFailure {
                detail: err.to_string(),
            }),
            Self::Idle | Self::Discarded | Self::Reconnected => None,
        }
    }
}

/// Conditions that end [`Relay::run`] with an error.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("gave up reconnecting to serial port {port}")]
    ReconnectExhausted { port: String },
}

/// Bridges a [`LineSource`] to a [`Submit`] implementation.
pub struct Relay<S, D> {
    source: S,
    dispatcher: D,
    encoding: &'static Encoding,
    http: HttpSettings,
    pacing: Duration,
    backoff: BackoffState,
    shutdown: Shutdown,
    state: LoopState,
}

impl<S: LineSource, D: Submit> Relay<S, D> {
    pub fn new(source: S, dispatcher: D, config: &RelayConfig, shutdown: Shutdown) -> Self {
        Self {
            source,
            dispatcher,
            encoding: config.serial.encoding,
            http: config.http.clone(),
            pacing: config.pacing,
            backoff: BackoffState::new(config.reconnect.clone()),
            shutdown,
            state: LoopState::Idle,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Run until shutdown is requested.
    ///
    /// Returns an error only when a configured reconnect deadline passes.
    pub fn run(&mut self) -> Result<(), RelayError> {
        while !self.shutdown.is_requested() {
            let step = self.step();
            self.report(&step);
            let pause = match step {
                Step::SerialFailure(_) | Step::ReconnectFailed(_) => self.reconnect_delay()?,
                _ => self.pacing,
            };
            if self.shutdown.wait(pause) {
                break;
            }
        }
        self.state = LoopState::Stopped;
        info!("relay: shutdown requested, stopping");
        Ok(())
    }

    /// Perform one iteration without pausing afterwards.
    pub fn step(&mut self) -> Step {
        if self.state == LoopState::Reconnecting {
            return self.reconnect();
        }

        self.state = LoopState::Idle;
        let raw = match self.source.read_line() {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                self.backoff.record_healthy(Instant::now());
                return Step::Idle;
            }
            Err(err) => {
                self.state = LoopState::Reconnecting;
                return Step::SerialFailure(err);
            }
        };
        self.backoff.record_healthy(Instant::now());

        self.state = LoopState::LineReceived;
        let Some(identifier) = Identifier::normalize(&decode_line(&raw, self.encoding)) else {
            self.state = LoopState::Idle;
            return Step::Discarded;
        };
        info!("[tag] detected {identifier}");

        self.state = LoopState::Dispatching;
        let outcome = self.dispatcher.submit(&identifier);
        self.state = LoopState::Idle;
        Step::Dispatched {
            identifier,
            outcome,
        }
    }

    fn reconnect(&mut self) -> Step {
        match self.source.reconnect() {
            Ok(()) => {
                self.backoff.record_success(Instant::now());
                self.state = LoopState::Idle;
                Step::Reconnected
            }
            Err(err) => Step::ReconnectFailed(err),
        }
    }

    fn reconnect_delay(&mut self) -> Result<Duration, RelayError> {
        match self.backoff.next_sleep(Instant::now()) {
            Some(delay) => {
                info!(
                    "[serial] reopening {} in {} ms",
                    self.source.name(),
                    delay.as_millis()
                );
                Ok(delay.max(self.pacing))
            }
            None => {
                self.state = LoopState::Stopped;
                let port = self.source.name().to_owned();
                error!("[serial-failure] reconnect deadline passed for {port}");
                Err(RelayError::ReconnectExhausted { port })
            }
        }
    }

    fn report(&self, step: &Step) {
        match step {
            Step::Idle => trace!("[serial] no data"),
            Step::Discarded => debug!("[serial] discarded blank line"),
            Step::Dispatched {
                identifier,
                outcome,
            } => self.report_outcome(identifier, outcome),
            Step::SerialFailure(err) => warn!(
                "[serial-failure] {err} on {}; check the reader connection and port settings",
                self.source.name()
            ),
            Step::Reconnected => info!("[serial] reconnected to {}", self.source.name()),
            Step::ReconnectFailed(err) => warn!("[serial-failure] {err}"),
        }
    }

    fn report_outcome(&self, identifier: &Identifier, outcome: &Outcome) {
        let tag = outcome.tag();
        let endpoint = &self.http.endpoint;
        match outcome {
            Outcome::Delivered { message } => {
                info!("[{tag}] UID {identifier} accepted by {endpoint}");
                if let Some(message) = message {
                    info!("[{tag}] server response: {message}");
                }
            }
            Outcome::Rejected { status, excerpt } => {
                warn!("[{tag}] HTTP {status} from {endpoint}: {excerpt}");
                warn!("[{tag}] UID {identifier} was not processed");
            }
            Outcome::NetworkTimeout { detail } => warn!(
                "[{tag}] no response from {endpoint} within {} ms; the server may be overloaded ({detail})",
                self.http.request_timeout.as_millis()
            ),
            Outcome::NetworkUnreachable { detail } => warn!(
                "[{tag}] cannot reach {endpoint}; check that the server is running ({detail})"
            ),
            Outcome::SerialFailure { detail } => warn!("[{tag}] {detail}"),
            Outcome::UnknownFailure { detail } => {
                error!("[{tag}] submitting UID {identifier} failed: {detail}")
            }
        }
    }
}
