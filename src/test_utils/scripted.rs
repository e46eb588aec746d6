//! Scripted fakes for the reader and dispatcher seams.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::dispatcher::{Outcome, Submit};
use crate::identifier::Identifier;
use crate::reader::{ConnectionError, LineSource, SerialError};
use crate::shutdown::ShutdownTrigger;

/// One scripted result of [`LineSource::read_line`].
#[derive(Clone, Debug)]
pub enum ScriptedRead {
    Line(Vec<u8>),
    Idle,
    Failure(io::ErrorKind),
    Disconnect,
}

impl ScriptedRead {
    pub fn line(text: &str) -> Self {
        Self::Line(text.as_bytes().to_vec())
    }
}

#[derive(Default)]
struct SourceState {
    reads: VecDeque<ScriptedRead>,
    reconnects: VecDeque<bool>,
    reconnect_attempts: usize,
}

/// Line source replaying a script.
///
/// Once drained it reports idle reads and, if configured, triggers shutdown
/// so a running relay stops on its next pause.
#[derive(Clone, Default)]
pub struct ScriptedSource {
    state: Arc<Mutex<SourceState>>,
    stop_when_drained: Option<ShutdownTrigger>,
}

impl ScriptedSource {
    pub fn new(reads: impl IntoIterator<Item = ScriptedRead>) -> Self {
        let source = Self::default();
        source.state.lock().reads = reads.into_iter().collect();
        source
    }

    /// Script the results of successive reconnect attempts; unscripted
    /// attempts succeed.
    pub fn with_reconnects(self, results: impl IntoIterator<Item = bool>) -> Self {
        self.state.lock().reconnects = results.into_iter().collect();
        self
    }

    pub fn stop_when_drained(mut self, trigger: ShutdownTrigger) -> Self {
        self.stop_when_drained = Some(trigger);
        self
    }

    pub fn reconnect_attempts(&self) -> usize {
        self.state.lock().reconnect_attempts
    }

    pub fn remaining(&self) -> usize {
        self.state.lock().reads.len()
    }
}

impl LineSource for ScriptedSource {
    fn read_line(&mut self) -> Result<Option<Vec<u8>>, SerialError> {
        let next = self.state.lock().reads.pop_front();
        match next {
            Some(ScriptedRead::Line(bytes)) => Ok(Some(bytes)),
            Some(ScriptedRead::Idle) => Ok(None),
            Some(ScriptedRead::Failure(kind)) => {
                Err(SerialError::Io(io::Error::new(kind, "scripted failure")))
            }
            Some(ScriptedRead::Disconnect) => Err(SerialError::Disconnected),
            None => {
                if let Some(trigger) = &self.stop_when_drained {
                    trigger.trigger();
                }
                Ok(None)
            }
        }
    }

    fn reconnect(&mut self) -> Result<(), ConnectionError> {
        let mut state = self.state.lock();
        state.reconnect_attempts += 1;
        if state.reconnects.pop_front().unwrap_or(true) {
            Ok(())
        } else {
            Err(ConnectionError {
                port: "scripted".into(),
                source: serialport::Error::new(serialport::ErrorKind::NoDevice, "scripted"),
            })
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Submitter recording every identifier and replaying scripted outcomes.
///
/// Unscripted submissions are delivered without a message.
#[derive(Clone, Default)]
pub struct RecordingSubmitter {
    submitted: Arc<Mutex<Vec<Identifier>>>,
    outcomes: Arc<Mutex<VecDeque<Outcome>>>,
}

impl RecordingSubmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outcomes(outcomes: impl IntoIterator<Item = Outcome>) -> Self {
        let submitter = Self::default();
        *submitter.outcomes.lock() = outcomes.into_iter().collect();
        submitter
    }

    /// Identifiers submitted so far, in order.
    pub fn submitted(&self) -> Vec<String> {
        self.submitted
            .lock()
            .iter()
            .map(|id| id.as_str().to_owned())
            .collect()
    }
}

impl Submit for RecordingSubmitter {
    fn submit(&self, identifier: &Identifier) -> Outcome {
        self.submitted.lock().push(identifier.clone());
        self.outcomes
            .lock()
            .pop_front()
            .unwrap_or(Outcome::Delivered { message: None })
    }
}
