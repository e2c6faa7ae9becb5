//! Watches for the interrupt that ends the node's life.
//!
//! The first `SIGINT` or `SIGTERM` produces the single termination token.
//! From then on the source stops listening and any further interrupt
//! terminates the process immediately with status 130, skipping the shutdown
//! sequence.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook::flag;
use signal_hook::iterator::Signals;
use tracing::{info, warn};

use crate::SIGNALS_TARGET;

use super::channels::{TerminationCause, TerminationSender};
use super::errors::SignalError;
use super::{FORCED_EXIT_STATUS, INTERRUPT_THREAD};

const INTERRUPT_SIGNALS: [i32; 2] = [SIGINT, SIGTERM];

/// Source of the interrupt that requests termination.
pub trait InterruptSource: Send {
    /// Registers with the operating system. Called on the launching thread
    /// before the watcher is spawned.
    fn install(&mut self) -> Result<(), SignalError> {
        Ok(())
    }

    /// Blocks until one interrupt occurs.
    fn wait(&mut self) -> Result<TerminationCause, SignalError>;
}

/// Interrupt source backed by `SIGINT` and `SIGTERM`.
#[derive(Default)]
pub struct SystemInterrupt {
    signals: Option<Signals>,
    escape: Arc<AtomicBool>,
}

impl SystemInterrupt {
    /// Builds an uninstalled interrupt source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a further interrupt now terminates the process immediately.
    #[must_use]
    pub fn escape_armed(&self) -> bool {
        self.escape.load(Ordering::SeqCst)
    }
}

impl InterruptSource for SystemInterrupt {
    fn install(&mut self) -> Result<(), SignalError> {
        for signal in INTERRUPT_SIGNALS {
            flag::register_conditional_shutdown(
                signal,
                FORCED_EXIT_STATUS,
                Arc::clone(&self.escape),
            )
            .map_err(|source| SignalError::Install { source })?;
        }
        let signals =
            Signals::new(INTERRUPT_SIGNALS).map_err(|source| SignalError::Install { source })?;
        self.signals = Some(signals);
        Ok(())
    }

    fn wait(&mut self) -> Result<TerminationCause, SignalError> {
        let signals = self.signals.as_mut().ok_or(SignalError::NotInstalled)?;
        let signal = signals.forever().next().ok_or(SignalError::Closed)?;
        self.escape.store(true, Ordering::SeqCst);
        signals.handle().close();
        Ok(TerminationCause::from_signal(signal))
    }
}

/// Spawns the interrupt watcher thread.
pub(crate) fn spawn<S>(mut source: S, sender: TerminationSender) -> io::Result<JoinHandle<()>>
where
    S: InterruptSource + 'static,
{
    thread::Builder::new()
        .name(INTERRUPT_THREAD.to_owned())
        .spawn(move || watch(&mut source, sender))
}

fn watch<S: InterruptSource>(source: &mut S, sender: TerminationSender) {
    match source.wait() {
        Ok(cause) => {
            info!(
                target: SIGNALS_TARGET,
                signal = %cause,
                "interrupt received; a second interrupt forces exit"
            );
            if !sender.fire(cause) {
                warn!(
                    target: SIGNALS_TARGET,
                    "termination requested after the node stopped listening"
                );
            }
        }
        Err(error) => {
            warn!(
                target: SIGNALS_TARGET,
                error = %error,
                "interrupt watcher stopped without a termination request"
            );
        }
    }
}
