//! Single-slot channels connecting the watchers, the orchestrator and the
//! managed service.

use std::cell::Cell;
use std::fmt;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError};
use std::time::Duration;

use signal_hook::consts::signal::{SIGINT, SIGTERM, SIGUSR1};

/// Reason the node is terminating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminationCause {
    signal: i32,
}

impl TerminationCause {
    /// Wraps the raw signal number that requested termination.
    #[must_use]
    pub const fn from_signal(signal: i32) -> Self {
        Self { signal }
    }

    /// Raw signal number.
    #[must_use]
    pub const fn signal(self) -> i32 {
        self.signal
    }
}

impl fmt::Display for TerminationCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.signal {
            SIGINT => f.write_str("SIGINT"),
            SIGTERM => f.write_str("SIGTERM"),
            SIGUSR1 => f.write_str("SIGUSR1"),
            other => write!(f, "signal {other}"),
        }
    }
}

/// Creates the termination token channel.
///
/// Both halves are consumed by use, so at most one token is produced and it
/// is read at most once.
#[must_use]
pub fn termination_channel() -> (TerminationSender, TerminationReceiver) {
    let (sender, receiver) = mpsc::sync_channel(1);
    (
        TerminationSender { inner: sender },
        TerminationReceiver { inner: receiver },
    )
}

/// Producing half of the termination token channel.
#[derive(Debug)]
pub struct TerminationSender {
    inner: SyncSender<TerminationCause>,
}

impl TerminationSender {
    /// Delivers the termination token. Returns `false` when nobody is
    /// listening any more.
    pub fn fire(self, cause: TerminationCause) -> bool {
        self.inner.try_send(cause).is_ok()
    }
}

/// Consuming half of the termination token channel.
#[derive(Debug)]
pub struct TerminationReceiver {
    inner: Receiver<TerminationCause>,
}

impl TerminationReceiver {
    /// Blocks until the token arrives.
    ///
    /// Returns `None` when the sender was dropped without firing.
    #[must_use]
    pub fn wait(self) -> Option<TerminationCause> {
        self.inner.recv().ok()
    }
}

/// Creates the stop notification channel handed to the managed service.
#[must_use]
pub fn stop_channel() -> (StopSender, StopReceiver) {
    let (sender, receiver) = mpsc::sync_channel(1);
    (
        StopSender { inner: sender },
        StopReceiver {
            inner: receiver,
            stopped: Cell::new(false),
        },
    )
}

/// Sends the one-shot stop notification.
#[derive(Debug)]
pub struct StopSender {
    inner: SyncSender<()>,
}

impl StopSender {
    /// Notifies the service that it should stop.
    pub fn notify(self) {
        // A receiver that already went away has nothing left to stop.
        let _ = self.inner.try_send(());
    }
}

/// Observes the stop notification. Dropping the sender counts as a stop.
#[derive(Debug)]
pub struct StopReceiver {
    inner: Receiver<()>,
    stopped: Cell<bool>,
}

impl StopReceiver {
    /// Blocks until the stop notification arrives.
    pub fn wait(&self) {
        if !self.stopped.get() {
            let _ = self.inner.recv();
            self.stopped.set(true);
        }
    }

    /// Waits up to `timeout`; returns `true` once stopped.
    #[must_use]
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.stopped.get() {
            return true;
        }
        match self.inner.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                self.stopped.set(true);
                true
            }
            Err(RecvTimeoutError::Timeout) => false,
        }
    }

    /// Non-blocking poll; returns `true` once stopped.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        if self.stopped.get() {
            return true;
        }
        match self.inner.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => {
                self.stopped.set(true);
                true
            }
            Err(TryRecvError::Empty) => false,
        }
    }
}
