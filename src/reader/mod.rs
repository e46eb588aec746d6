//! Serial side of the relay.
//!
//! [`SerialReader`] owns the open port and yields raw lines through the
//! [`LineSource`] trait. A read failure releases the handle; the relay loop
//! then calls [`LineSource::reconnect`] under its backoff policy.

mod line_reader;

use std::io;

use log::debug;
use serialport::SerialPort;
use thiserror::Error;

use crate::config::SerialSettings;

pub use line_reader::{LineReader, TimedRead};

/// The serial port could not be opened.
#[derive(Debug, Error)]
#[error("could not open serial port {port}: {source}")]
pub struct ConnectionError {
    pub port: String,
    #[source]
    pub source: serialport::Error,
}

impl ConnectionError {
    /// Remediation hints for the operator, most likely cause first.
    pub fn hints(&self) -> Vec<String> {
        let mut hints = vec![
            format!("the reader is connected to {}", self.port),
            "the USB-serial drivers for the reader are installed".to_owned(),
            format!("{} is not in use by another application", self.port),
        ];
        match self.source.kind() {
            serialport::ErrorKind::Io(io::ErrorKind::PermissionDenied) => {
                hints.insert(0, format!("the current user may open {}", self.port));
            }
            serialport::ErrorKind::InvalidInput => {
                hints.insert(0, "the port name and baud rate are valid".to_owned());
            }
            _ => {}
        }
        hints
    }
}

/// A recoverable failure while reading from an open port.
#[derive(Debug, Error)]
pub enum SerialError {
    #[error("serial read failed: {0}")]
    Io(#[from] io::Error),
    /// The device signalled readiness but produced no data, or the handle
    /// has already been released.
    #[error("serial device disconnected")]
    Disconnected,
}

/// Source of raw, newline-delimited lines.
pub trait LineSource {
    /// Wait for one line. `Ok(None)` means the wait elapsed with no data.
    fn read_line(&mut self) -> Result<Option<Vec<u8>>, SerialError>;

    /// Release any current handle and open a fresh one.
    fn reconnect(&mut self) -> Result<(), ConnectionError>;

    /// Human-readable name of the underlying device.
    fn name(&self) -> &str;
}

/// Line source backed by a physical serial port.
pub struct SerialReader {
    settings: SerialSettings,
    lines: Option<LineReader<Box<dyn SerialPort>>>,
}

impl SerialReader {
    /// Open the configured port.
    pub fn open(settings: &SerialSettings) -> Result<Self, ConnectionError> {
        let port = open_port(settings)?;
        Ok(Self {
            lines: Some(Self::frame(settings, port)),
            settings: settings.clone(),
        })
    }

    fn frame(
        settings: &SerialSettings,
        port: Box<dyn SerialPort>,
    ) -> LineReader<Box<dyn SerialPort>> {
        LineReader::new(port, settings.read_timeout, settings.max_line_length)
    }

    fn release(&mut self) {
        if self.lines.take().is_some() {
            debug!("serial: released {}", self.settings.port);
        }
    }
}

impl LineSource for SerialReader {
    fn read_line(&mut self) -> Result<Option<Vec<u8>>, SerialError> {
        let Some(lines) = self.lines.as_mut() else {
            return Err(SerialError::Disconnected);
        };
        let result = lines.read_line();
        if result.is_err() {
            self.release();
        }
        result
    }

    fn reconnect(&mut self) -> Result<(), ConnectionError> {
        self.release();
        let port = open_port(&self.settings)?;
        self.lines = Some(Self::frame(&self.settings, port));
        Ok(())
    }

    fn name(&self) -> &str {
        &self.settings.port
    }
}

impl Drop for SerialReader {
    fn drop(&mut self) {
        self.release();
    }
}

fn open_port(settings: &SerialSettings) -> Result<Box<dyn SerialPort>, ConnectionError> {
    serialport::new(&settings.port, settings.baud_rate)
        .timeout(settings.read_timeout)
        .open()
        .map_err(|source| ConnectionError {
            port: settings.port.clone(),
            source,
        })
}

/// Names of the serial ports the operating system reports.
pub fn available_ports() -> Result<Vec<String>, serialport::Error> {
    Ok(serialport::available_ports()?
        .into_iter()
        .map(|info| info.port_name)
        .collect())
}
