//! HTTP side of the relay.
//!
//! [`Dispatcher`] turns one [`Identifier`] into exactly one `POST` of
//! `{"uid": "<identifier>"}` and classifies what happened:
//!
//! - **2xx**: [`Outcome::Delivered`], with the reply's optional `message`.
//! - **Other statuses**: [`Outcome::Rejected`] with a body excerpt.
//! - **Timeouts** (connect or response): [`Outcome::NetworkTimeout`].
//! - **Refused, unresolvable or dropped connections**:
//!   [`Outcome::NetworkUnreachable`].
//! - **Anything else**: [`Outcome::UnknownFailure`].
//!
//! Submissions are never retried; the relay moves on to the next scan.

mod outcome;

#[cfg(test)]
mod tests;

use std::{error::Error as _, io};

use log::debug;
use serde::{Deserialize, Serialize};
use ureq::{Agent, AgentBuilder};

use crate::{config::HttpSettings, identifier::Identifier};

pub use outcome::{EXCERPT_CHARS, Outcome, TRUNCATION_MARKER, body_excerpt};

const JSON: &str = "application/json";

/// Anything that can take an identifier and report an [`Outcome`].
pub trait Submit {
    fn submit(&self, identifier: &Identifier) -> Outcome;
}

/// Whether a status counts as accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    Success,
    Rejected,
}

#[derive(Serialize)]
struct Submission<'a> {
    uid: &'a Identifier,
}

#[derive(Deserialize)]
struct Reply {
    #[serde(default)]
    message: Option<serde_json::Value>,
}

/// Blocking HTTP client posting identifiers to one endpoint.
pub struct Dispatcher {
    agent: Agent,
    endpoint: String,
}

impl Dispatcher {
    pub fn new(settings: &HttpSettings) -> Self {
        let agent = AgentBuilder::new()
            .timeout_connect(settings.request_timeout)
            .timeout(settings.request_timeout)
            .build();
        Self {
            agent,
            endpoint: settings.endpoint.clone(),
        }
    }

    fn post(&self, body: &str) -> Result<ureq::Response, Box<ureq::Error>> {
        self.agent
            .post(&self.endpoint)
            .set("Accept", JSON)
            .set("Content-Type", JSON)
            .send_string(body)
            .map_err(Box::new)
    }
}

impl Submit for Dispatcher {
    fn submit(&self, identifier: &Identifier) -> Outcome {
        let body = match serde_json::to_string(&Submission { uid: identifier }) {
            Ok(body) => body,
            Err(err) => {
                return Outcome::UnknownFailure {
                    detail: err.to_string(),
                };
            }
        };

        match self.post(&body) {
            Ok(response) => classify_response(response),
            Err(err) => match *err {
                ureq::Error::Status(_, response) => classify_response(response),
                ureq::Error::Transport(transport) => classify_transport(&transport),
            },
        }
    }
}

/// Classifies an HTTP status code.
pub(crate) fn classify_status(status: u16) -> ResponseClass {
    match status {
        200..=299 => ResponseClass::Success,
        _ => ResponseClass::Rejected,
    }
}

fn classify_response(response: ureq::Response) -> Outcome {
    let status = response.status();
    let reason = response.status_text().to_owned();
    let body = response.into_string().unwrap_or_else(|err| {
        debug!("failed to read response body: {err}");
        String::new()
    });
    outcome_for_response(status, &reason, &body)
}

/// Build the outcome for a response that arrived.
pub(crate) fn outcome_for_response(status: u16, reason: &str, body: &str) -> Outcome {
    match classify_status(status) {
        ResponseClass::Success => Outcome::Delivered {
            message: reply_message(body),
        },
        ResponseClass::Rejected => Outcome::Rejected {
            status,
            excerpt: body_excerpt(body, reason),
        },
    }
}

/// The `message` field of a JSON reply, if there is one.
pub(crate) fn reply_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    if !value.is_object() {
        return None;
    }
    let reply: Reply = serde_json::from_value(value).ok()?;
    match reply.message? {
        serde_json::Value::Null => None,
        serde_json::Value::String(message) => Some(message),
        other => Some(other.to_string()),
    }
}

fn classify_transport(err: &ureq::Transport) -> Outcome {
    let detail = err.to_string();
    if is_timeout(err) {
        return Outcome::NetworkTimeout { detail };
    }
    match err.kind() {
        ureq::ErrorKind::ConnectionFailed
        | ureq::ErrorKind::Dns
        | ureq::ErrorKind::Io
        | ureq::ErrorKind::ProxyConnect => Outcome::NetworkUnreachable { detail },
        _ => Outcome::UnknownFailure { detail },
    }
}

fn is_timeout(err: &ureq::Transport) -> bool {
    let mut cause = err.source();
    while let Some(current) = cause {
        if let Some(io_err) = current.downcast_ref::<io::Error>()
            && matches!(
                io_err.kind(),
                io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
            )
        {
            return true;
        }
        cause = current.source();
    }
    false
}
