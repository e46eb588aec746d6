//! Command-line interface.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{ConfigError, RelayConfig, RelayConfigBuilder};

/// Relay RFID tag identifiers from a serial reader to an HTTP endpoint.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "tag-relay", version, about)]
pub struct Cli {
    /// INI file with [serial], [http] and [relay] sections.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Serial device, e.g. /dev/ttyUSB0 or COM6.
    #[arg(short = 'p', long = "port")]
    pub port: Option<String>,

    /// Serial baud rate.
    #[arg(short = 'b', long = "baud")]
    pub baud_rate: Option<u32>,

    /// URL that receives `{"uid": "..."}` POST requests.
    #[arg(short = 'e', long = "endpoint")]
    pub endpoint: Option<String>,

    /// Default log filter; RUST_LOG takes precedence.
    #[arg(long = "log-level", default_value = "info")]
    pub log_level: String,

    /// Print the serial ports found on this machine and exit.
    #[arg(long = "list-ports")]
    pub list_ports: bool,
}

impl Cli {
    /// Overrides given on the command line.
    pub fn overrides(&self) -> RelayConfigBuilder {
        let mut builder = RelayConfigBuilder::new();
        if let Some(port) = &self.port {
            builder = builder.with_port(port.clone());
        }
        if let Some(baud) = self.baud_rate {
            builder = builder.with_baud_rate(baud);
        }
        if let Some(endpoint) = &self.endpoint {
            builder = builder.with_endpoint(endpoint.clone());
        }
        builder
    }

    /// Layer defaults, the optional INI file and the flags, in that order.
    pub fn resolve_config(&self) -> Result<RelayConfig, ConfigError> {
        let base = match &self.config {
            Some(path) => RelayConfigBuilder::from_ini_file(path)?,
            None => RelayConfigBuilder::new(),
        };
        base.merge(self.overrides()).build()
    }
}
