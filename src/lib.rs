//! Relay RFID tag identifiers read from a serial port to an HTTP endpoint.
//!
//! The [`relay::Relay`] loop pulls newline-terminated frames from a
//! [`reader::LineSource`], normalizes them into [`identifier::Identifier`]s
//! and hands each one to a [`dispatcher::Submit`] implementation. Every
//! submission produces exactly one [`dispatcher::Outcome`]; none of them stop
//! the loop.

pub mod backoff;
pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod identifier;
pub mod reader;
pub mod relay;
pub mod shutdown;

#[cfg(any(test, feature = "test-util"))]
pub mod test_utils;

pub use config::{ConfigError, RelayConfig, RelayConfigBuilder};
pub use dispatcher::{Dispatcher, Outcome, Submit};
pub use identifier::Identifier;
pub use reader::{ConnectionError, LineSource, SerialError, SerialReader};
pub use relay::{Relay, RelayError};
pub use shutdown::Shutdown;
