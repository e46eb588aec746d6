//! Builder for [`RelayConfig`].
//!
//! Every setter records an override; [`RelayConfigBuilder::build`] fills the
//! gaps with defaults and validates the result. Later layers win, so callers
//! apply the INI file first and command-line flags afterwards.

use std::time::Duration;

use encoding_rs::Encoding;

use crate::backoff::BackoffPolicy;

use super::{ConfigError, HttpSettings, RelayConfig, SerialSettings};

macro_rules! ensure_positive {
    ($value:expr, $field:expr) => {{
        if $value == 0 {
            Err(ConfigError::InvalidConfig(format!(
                "{} must be greater than zero",
                $field
            )))
        } else {
            Ok($value)
        }
    }};
}

macro_rules! option_setter {
    ($(#[$meta:meta])* $fn_name:ident, $field:ident, $ty:ty) => {
        $(#[$meta])*
        pub fn $fn_name(mut self, value: $ty) -> Self {
            self.$field = Some(value);
            self
        }
    };
}

/// Overrides for the reconnect backoff timings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BackoffOverrides {
    base_ms: Option<u64>,
    cap_ms: Option<u64>,
    reset_after_ms: Option<u64>,
    deadline_ms: Option<u64>,
}

impl BackoffOverrides {
    /// Create overrides with no custom values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the base delay in milliseconds.
    pub fn with_base_ms(mut self, base_ms: u64) -> Self {
        self.base_ms = Some(base_ms);
        self
    }

    /// Override the delay ceiling in milliseconds.
    pub fn with_cap_ms(mut self, cap_ms: u64) -> Self {
        self.cap_ms = Some(cap_ms);
        self
    }

    /// Override how long the port must stay healthy before the window resets.
    pub fn with_reset_after_ms(mut self, reset_after_ms: u64) -> Self {
        self.reset_after_ms = Some(reset_after_ms);
        self
    }

    /// Give up reconnecting after this many milliseconds. Zero retries forever.
    pub fn with_deadline_ms(mut self, deadline_ms: u64) -> Self {
        self.deadline_ms = Some(deadline_ms);
        self
    }

    fn merge(self, later: Self) -> Self {
        Self {
            base_ms: later.base_ms.or(self.base_ms),
            cap_ms: later.cap_ms.or(self.cap_ms),
            reset_after_ms: later.reset_after_ms.or(self.reset_after_ms),
            deadline_ms: later.deadline_ms.or(self.deadline_ms),
        }
    }

    fn resolve(&self) -> Result<BackoffPolicy, ConfigError> {
        let defaults = BackoffPolicy::default();
        let base = match self.base_ms {
            Some(ms) => Duration::from_millis(ensure_positive!(ms, "reconnect_base_ms")?),
            None => defaults.base,
        };
        let cap = match self.cap_ms {
            Some(ms) => Duration::from_millis(ensure_positive!(ms, "reconnect_cap_ms")?),
            None => defaults.cap.max(base),
        };
        if cap < base {
            return Err(ConfigError::InvalidConfig(
                "reconnect_cap_ms must not be below reconnect_base_ms".into(),
            ));
        }
        let reset_after = match self.reset_after_ms {
            Some(ms) => Duration::from_millis(ensure_positive!(ms, "reconnect_reset_ms")?),
            None => defaults.reset_after,
        };
        let deadline = match self.deadline_ms {
            Some(0) | None => None,
            Some(ms) => Some(Duration::from_millis(ms)),
        };
        Ok(BackoffPolicy {
            base,
            cap,
            reset_after,
            deadline,
        })
    }
}

/// Layered builder producing a validated [`RelayConfig`].
#[derive(Clone, Debug, Default)]
pub struct RelayConfigBuilder {
    port: Option<String>,
    baud_rate: Option<u32>,
    endpoint: Option<String>,
    encoding: Option<String>,
    read_timeout_ms: Option<u64>,
    request_timeout_ms: Option<u64>,
    pacing_ms: Option<u64>,
    max_line_length: Option<usize>,
    reconnect: BackoffOverrides,
}

impl RelayConfigBuilder {
    /// Create a builder with no overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the serial port name.
    pub fn with_port(mut self, port: impl Into<String>) -> Self {
        self.port = Some(port.into());
        self
    }

    /// Set the submission endpoint URL.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the encoding label used to decode serial lines.
    pub fn with_encoding(mut self, label: impl Into<String>) -> Self {
        self.encoding = Some(label.into());
        self
    }

    option_setter!(
        #[doc = "Set the serial baud rate."]
        with_baud_rate,
        baud_rate,
        u32
    );
    option_setter!(
        #[doc = "Set the serial read timeout in milliseconds."]
        with_read_timeout_ms,
        read_timeout_ms,
        u64
    );
    option_setter!(
        #[doc = "Set the HTTP request timeout in milliseconds."]
        with_request_timeout_ms,
        request_timeout_ms,
        u64
    );
    option_setter!(
        #[doc = "Set the delay between loop iterations in milliseconds."]
        with_pacing_ms,
        pacing_ms,
        u64
    );
    option_setter!(
        #[doc = "Set the longest unterminated line kept in memory."]
        with_max_line_length,
        max_line_length,
        usize
    );

    /// Override reconnect backoff timings.
    pub fn with_reconnect(mut self, overrides: BackoffOverrides) -> Self {
        self.reconnect = overrides;
        self
    }

    /// Apply every value set in `later` on top of this builder.
    pub fn merge(self, later: Self) -> Self {
        Self {
            port: later.port.or(self.port),
            baud_rate: later.baud_rate.or(self.baud_rate),
            endpoint: later.endpoint.or(self.endpoint),
            encoding: later.encoding.or(self.encoding),
            read_timeout_ms: later.read_timeout_ms.or(self.read_timeout_ms),
            request_timeout_ms: later.request_timeout_ms.or(self.request_timeout_ms),
            pacing_ms: later.pacing_ms.or(self.pacing_ms),
            max_line_length: later.max_line_length.or(self.max_line_length),
            reconnect: self.reconnect.merge(later.reconnect),
        }
    }

    /// Validate the collected values and produce the final configuration.
    pub fn build(&self) -> Result<RelayConfig, ConfigError> {
        let defaults = RelayConfig::default();

        let port = match &self.port {
            Some(port) if port.trim().is_empty() => {
                return Err(ConfigError::InvalidConfig("port must not be empty".into()));
            }
            Some(port) => port.trim().to_owned(),
            None => defaults.serial.port,
        };
        let baud_rate = match self.baud_rate {
            Some(baud) => ensure_positive!(baud, "baud_rate")?,
            None => defaults.serial.baud_rate,
        };
        let encoding = match &self.encoding {
            Some(label) => resolve_encoding(label)?,
            None => defaults.serial.encoding,
        };
        let read_timeout = millis_or(self.read_timeout_ms, "read_timeout_ms")?
            .unwrap_or(defaults.serial.read_timeout);
        let max_line_length = match self.max_line_length {
            Some(len) => ensure_positive!(len, "max_line_length")?,
            None => defaults.serial.max_line_length,
        };

        let endpoint = match &self.endpoint {
            Some(endpoint) => validate_endpoint(endpoint)?,
            None => defaults.http.endpoint,
        };
        let request_timeout = millis_or(self.request_timeout_ms, "request_timeout_ms")?
            .unwrap_or(defaults.http.request_timeout);
        let pacing = millis_or(self.pacing_ms, "pacing_ms")?.unwrap_or(defaults.pacing);

        Ok(RelayConfig {
            serial: SerialSettings {
                port,
                baud_rate,
                read_timeout,
                encoding,
                max_line_length,
            },
            http: HttpSettings {
                endpoint,
                request_timeout,
            },
            pacing,
            reconnect: self.reconnect.resolve()?,
        })
    }
}

fn millis_or(value: Option<u64>, field: &str) -> Result<Option<Duration>, ConfigError> {
    value
        .map(|ms| ensure_positive!(ms, field).map(Duration::from_millis))
        .transpose()
}

fn resolve_encoding(label: &str) -> Result<&'static Encoding, ConfigError> {
    let normalized = label.trim().to_ascii_lowercase();
    Encoding::for_label(normalized.as_bytes())
        .ok_or_else(|| ConfigError::InvalidConfig(format!("unknown encoding {label}")))
}

fn validate_endpoint(endpoint: &str) -> Result<String, ConfigError> {
    let endpoint = endpoint.trim();
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        Ok(endpoint.to_owned())
    } else {
        Err(ConfigError::InvalidConfig(format!(
            "endpoint must be an http:// or https:// URL, got {endpoint:?}"
        )))
    }
}
