//! Operator-initiated shutdown.
//!
//! The trigger side owns the only sender of a channel that never carries a
//! message; triggering drops the sender, after which every receiver observes
//! a disconnected channel. Waiting on the receiver doubles as an
//! interruptible sleep.

use std::{sync::Arc, time::Duration};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, bounded};
use parking_lot::Mutex;

/// Requests shutdown. Dropping every trigger also counts as a request.
#[derive(Clone)]
pub struct ShutdownTrigger {
    tx: Arc<Mutex<Option<Sender<()>>>>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.lock().take();
    }
}

/// Observes shutdown requests.
#[derive(Clone)]
pub struct Shutdown {
    rx: Receiver<()>,
}

impl Shutdown {
    pub fn is_requested(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Sleep for `timeout`, returning early with `true` if shutdown is requested.
    pub fn wait(&self, timeout: Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) | Ok(()) => false,
        }
    }
}

/// Create a connected trigger/observer pair.
pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = bounded(0);
    (
        ShutdownTrigger {
            tx: Arc::new(Mutex::new(Some(tx))),
        },
        Shutdown { rx },
    )
}

/// Route Ctrl+C (SIGINT/SIGTERM on Unix) to a [`Shutdown`] observer.
pub fn install_interrupt_handler() -> Result<Shutdown, ctrlc::Error> {
    let (trigger, shutdown) = channel();
    ctrlc::set_handler(move || trigger.trigger())?;
    Ok(shutdown)
}
