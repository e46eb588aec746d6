//! Newline framing over a blocking byte stream with a read timeout.

use std::{
    io::{self, Read},
    time::{Duration, Instant},
};

use log::warn;
use serialport::SerialPort;

use super::SerialError;

const READ_CHUNK: usize = 256;

/// A blocking byte source whose per-read wait can be changed between reads.
pub trait TimedRead: Read {
    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()>;
}

impl TimedRead for Box<dyn SerialPort> {
    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.as_mut().set_timeout(timeout).map_err(io::Error::from)
    }
}

/// Splits a byte stream into `\n`-terminated lines.
///
/// Bytes that arrive without a terminator stay buffered until a later read
/// completes the line. Each read is bounded by what is left of the
/// `read_timeout` budget, and the inner reader reports an elapsed wait as
/// [`io::ErrorKind::TimedOut`], as serial ports do.
pub struct LineReader<R> {
    inner: R,
    pending: Vec<u8>,
    read_timeout: Duration,
    max_line_length: usize,
    discarding: bool,
}

impl<R: TimedRead> LineReader<R> {
    pub fn new(inner: R, read_timeout: Duration, max_line_length: usize) -> Self {
        Self {
            inner,
            pending: Vec::with_capacity(READ_CHUNK),
            read_timeout,
            max_line_length,
            discarding: false,
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Wait up to the read timeout for one complete line.
    ///
    /// The terminator is stripped; a trailing `\r` is left for the caller's
    /// trimming. `Ok(None)` means no complete line arrived in time.
    pub fn read_line(&mut self) -> Result<Option<Vec<u8>>, SerialError> {
        if let Some(line) = self.take_line() {
            return Ok(Some(line));
        }

        let started = Instant::now();
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let Some(remaining) = self
                .read_timeout
                .checked_sub(started.elapsed())
                .filter(|left| !left.is_zero())
            else {
                return Ok(None);
            };
            self.inner.set_read_timeout(remaining)?;
            let n = match self.inner.read(&mut chunk) {
                Ok(0) => return Err(SerialError::Disconnected),
                Ok(n) => n,
                Err(err) if is_timeout(&err) => return Ok(None),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(SerialError::Io(err)),
            };
            self.pending.extend_from_slice(&chunk[..n]);
            if let Some(line) = self.take_line() {
                return Ok(Some(line));
            }
            self.enforce_limit();
        }
    }

    fn take_line(&mut self) -> Option<Vec<u8>> {
        loop {
            let end = self.pending.iter().position(|&b| b == b'\n')?;
            let mut line: Vec<u8> = self.pending.drain(..=end).collect();
            if self.discarding {
                self.discarding = false;
                continue;
            }
            line.pop();
            return Some(line);
        }
    }

    fn enforce_limit(&mut self) {
        if self.pending.len() > self.max_line_length {
            warn!(
                "serial: discarding {} bytes without a line terminator (limit {})",
                self.pending.len(),
                self.max_line_length
            );
            self.pending.clear();
            self.discarding = true;
        }
    }
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}
