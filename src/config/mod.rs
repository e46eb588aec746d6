//! Relay configuration.
//!
//! [`RelayConfigBuilder`] collects values from defaults, an optional INI
//! file and command-line overrides, then validates them into an immutable
//! [`RelayConfig`] that is handed to the reader, dispatcher and relay loop.

mod builder;
mod ini_file;


use std::{io, path::PathBuf, time::Duration};

use encoding_rs::Encoding;
use thiserror::Error;

use crate::backoff::BackoffPolicy;

pub use builder::{BackoffOverrides, RelayConfigBuilder};

/// Default serial port name for the host platform.
pub const DEFAULT_PORT: &str = if cfg!(windows) {
    "COM6"
} else {
    "/dev/ttyUSB0"
};
/// Default baud rate; must match the reader firmware.
pub const DEFAULT_BAUD_RATE: u32 = 9600;
/// Default submission endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8000/api/rfid";
/// Default text encoding label for serial lines.
pub const DEFAULT_ENCODING: &str = "utf-8";
/// Default wait for a line terminator before reporting an idle read.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);
/// Default client-side timeout for one submission.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);
/// Default delay between loop iterations.
pub const DEFAULT_PACING: Duration = Duration::from_millis(100);
/// Default maximum length of an unterminated line before it is discarded.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 1024;

/// Errors raised while assembling a [`RelayConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value was missing, zero or otherwise unusable.
    #[error("invalid relay configuration: {0}")]
    InvalidConfig(String),
    /// The configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The configuration file is not valid INI.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ini::ParseError,
    },
}

/// Serial side of the relay.
#[derive(Clone, Debug, PartialEq)]
pub struct SerialSettings {
    /// Platform-specific port name, e.g. `/dev/ttyACM0` or `COM6`.
    pub port: String,
    pub baud_rate: u32,
    /// Upper bound on a single wait for a line terminator.
    pub read_timeout: Duration,
    /// Encoding used to decode raw lines.
    pub encoding: &'static Encoding,
    pub max_line_length: usize,
}

/// HTTP side of the relay.
#[derive(Clone, Debug, PartialEq)]
pub struct HttpSettings {
    pub endpoint: String,
    pub request_timeout: Duration,
}

/// Validated configuration for one relay process.
#[derive(Clone, Debug, PartialEq)]
pub struct RelayConfig {
    pub serial: SerialSettings,
    pub http: HttpSettings,
    /// Delay applied after every loop iteration.
    pub pacing: Duration,
    /// Policy used to re-open the serial port after a failure.
    pub reconnect: BackoffPolicy,
}

impl RelayConfig {
    /// Start a builder seeded with the defaults.
    pub fn builder() -> RelayConfigBuilder {
        RelayConfigBuilder::new()
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            serial: SerialSettings {
                port: DEFAULT_PORT.to_owned(),
                baud_rate: DEFAULT_BAUD_RATE,
                read_timeout: DEFAULT_READ_TIMEOUT,
                encoding: encoding_rs::UTF_8,
                max_line_length: DEFAULT_MAX_LINE_LENGTH,
            },
            http: HttpSettings {
                endpoint: DEFAULT_ENDPOINT.to_owned(),
                request_timeout: DEFAULT_REQUEST_TIMEOUT,
            },
            pacing: DEFAULT_PACING,
            reconnect: BackoffPolicy::default(),
        }
    }
}
