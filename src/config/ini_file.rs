//! INI file layer for [`RelayConfigBuilder`].
//!
//! ```ini
//! [serial]
//! port = /dev/ttyACM0
//! baud_rate = 9600
//!
//! [http]
//! endpoint = http://127.0.0.1:8000/api/rfid
//!
//! [relay]
//! pacing_ms = 100
//! ```

use std::{path::Path, str::FromStr};

use ini::Ini;
use log::warn;

use super::{BackoffOverrides, ConfigError, RelayConfigBuilder};

impl RelayConfigBuilder {
    /// Load overrides from an INI file.
    pub fn from_ini_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let ini = Ini::load_from_file(path).map_err(|err| match err {
            ini::Error::Io(source) => ConfigError::Io {
                path: path.to_path_buf(),
                source,
            },
            ini::Error::Parse(source) => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
        })?;
        Self::from_ini(&ini)
    }

    /// Load overrides from INI text.
    pub fn from_ini_str(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|source| ConfigError::Parse {
            path: "<inline>".into(),
            source,
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut builder = Self::new();
        let mut reconnect = BackoffOverrides::new();

        for (section, props) in ini.iter() {
            let section = section.unwrap_or("");
            for (key, value) in props.iter() {
                let value = value.trim();
                match (section, key) {
                    ("serial", "port") => builder = builder.with_port(value),
                    ("serial", "baud_rate") => {
                        builder = builder.with_baud_rate(parse(section, key, value)?)
                    }
                    ("serial", "encoding") => builder = builder.with_encoding(value),
                    ("serial", "read_timeout_ms") => {
                        builder = builder.with_read_timeout_ms(parse(section, key, value)?)
                    }
                    ("serial", "max_line_length") => {
                        builder = builder.with_max_line_length(parse(section, key, value)?)
                    }
                    ("http", "endpoint") => builder = builder.with_endpoint(value),
                    ("http", "request_timeout_ms") => {
                        builder = builder.with_request_timeout_ms(parse(section, key, value)?)
                    }
                    ("relay", "pacing_ms") => {
                        builder = builder.with_pacing_ms(parse(section, key, value)?)
                    }
                    ("relay", "reconnect_base_ms") => {
                        reconnect = reconnect.with_base_ms(parse(section, key, value)?)
                    }
                    ("relay", "reconnect_cap_ms") => {
                        reconnect = reconnect.with_cap_ms(parse(section, key, value)?)
                    }
                    ("relay", "reconnect_reset_ms") => {
                        reconnect = reconnect.with_reset_after_ms(parse(section, key, value)?)
                    }
                    ("relay", "reconnect_deadline_ms") => {
                        reconnect = reconnect.with_deadline_ms(parse(section, key, value)?)
                    }
                    _ => warn!("ignoring unknown config key [{section}] {key}"),
                }
            }
        }

        Ok(builder.with_reconnect(reconnect))
    }
}

fn parse<T: FromStr>(section: &str, key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| {
        ConfigError::InvalidConfig(format!(
            "[{section}] {key} must be an unsigned integer, got {value:?}"
        ))
    })
}
