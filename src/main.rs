//! `tag-relay` binary.
//!
//! Exit codes: 0 after an operator interrupt, 1 when configuration or
//! start-up fails, 2 when a configured reconnect deadline passes.

use std::process::ExitCode;

use clap::Parser;
use env_logger::{Builder, Env};
use log::{error, info};

use tag_relay::{
    Dispatcher, Relay, RelayError, SerialReader,
    cli::Cli,
    reader::available_ports,
    shutdown::install_interrupt_handler,
};

fn list_ports() -> ExitCode {
    match available_ports() {
        Ok(ports) if ports.is_empty() => {
            println!("no serial ports found");
            ExitCode::SUCCESS
        }
        Ok(ports) => {
            for port in ports {
                println!("{port}");
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("failed to enumerate serial ports: {err}");
            ExitCode::from(1)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    Builder::from_env(Env::default().default_filter_or(cli.log_level.as_str())).init();

    if cli.list_ports {
        return list_ports();
    }

    let config = match cli.resolve_config() {
        Ok(config) => config,
        Err(err) => {
            error!("{err}");
            return ExitCode::from(1);
        }
    };

    info!("tag-relay {}", env!("CARGO_PKG_VERSION"));
    let shutdown = match install_interrupt_handler() {
        Ok(shutdown) => shutdown,
        Err(err) => {
            error!("failed to install interrupt handler: {err}");
            return ExitCode::from(1);
        }
    };

    let reader = match SerialReader::open(&config.serial) {
        Ok(reader) => reader,
        Err(err) => {
            error!("[serial-failure] {err}");
            for hint in err.hints() {
                error!("  - {hint}");
            }
            return ExitCode::from(1);
        }
    };
    info!(
        "[serial] listening on {} at {} baud",
        config.serial.port, config.serial.baud_rate
    );
    info!("[http] posting identifiers to {}", config.http.endpoint);
    info!("ready; press Ctrl+C to stop");

    let dispatcher = Dispatcher::new(&config.http);
    let mut relay = Relay::new(reader, dispatcher, &config, shutdown);
    match relay.run() {
        Ok(()) => {
            info!("stopped by operator");
            info!("goodbye");
            ExitCode::SUCCESS
        }
        Err(err @ RelayError::ReconnectExhausted { .. }) => {
            error!("{err}");
            ExitCode::from(2)
        }
    }
}
