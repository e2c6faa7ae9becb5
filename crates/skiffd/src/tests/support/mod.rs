//! Test doubles shared by the lifecycle suites.
//!
//! Every double writes into one [`Journal`] so a test can assert the order
//! in which the coordinator, the service and the GUI observed events.

mod service;
mod signals;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::diagnostics::DiagnosticsError;
use crate::lifecycle::LifecycleReporter;
use crate::process::TerminationCause;

pub use service::{RecordingGui, RecordingService};
pub use signals::{DebugScript, InterruptTrigger, ScriptedDebugSignals, TestInterrupt};

const WAIT_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Events captured by the doubles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    ServiceStarted(u16),
    PeerConnected(String),
    GuiLaunched(u16),
    TerminationRequested(i32),
    DiagnosticsCaptured(PathBuf),
    DiagnosticsFailed,
    StopNotified,
    ShuttingDown,
    Goodbye,
    ServiceInit,
    StopObserved,
    ServiceShutdown,
    Dial(String),
    GuiRan,
}

/// Ordered, shared event log.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    events: Arc<Mutex<Vec<LifecycleEvent>>>,
}

impl Journal {
    pub fn record(&self, event: LifecycleEvent) {
        self.events
            .lock()
            .expect("journal mutex poisoned")
            .push(event);
    }

    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().expect("journal mutex poisoned").clone()
    }

    pub fn count(&self, predicate: impl Fn(&LifecycleEvent) -> bool) -> usize {
        self.events().iter().filter(|event| predicate(event)).count()
    }

    /// Index of the first event equal to `event`.
    pub fn position(&self, event: &LifecycleEvent) -> Option<usize> {
        self.events().iter().position(|recorded| recorded == event)
    }

    /// Polls until `predicate` holds for the journal or the timeout expires.
    pub fn wait_until(&self, predicate: impl Fn(&[LifecycleEvent]) -> bool) -> bool {
        let deadline = Instant::now() + WAIT_TIMEOUT;
        loop {
            if predicate(&self.events()) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

/// Reporter that records lifecycle callbacks into a [`Journal`].
#[derive(Debug, Clone, Default)]
pub struct RecordingLifecycleReporter {
    journal: Journal,
}

impl RecordingLifecycleReporter {
    pub fn with_journal(journal: Journal) -> Self {
        Self { journal }
    }

    /// Captures a copy of the recorded events.
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.journal.events()
    }
}

impl LifecycleReporter for RecordingLifecycleReporter {
    fn service_started(&self, port: u16, _data_dir: &Path) {
        self.journal.record(LifecycleEvent::ServiceStarted(port));
    }

    fn peer_connected(&self, address: &str) {
        self.journal
            .record(LifecycleEvent::PeerConnected(address.to_owned()));
    }

    fn gui_launched(&self, port: u16) {
        self.journal.record(LifecycleEvent::GuiLaunched(port));
    }

    fn termination_requested(&self, cause: TerminationCause) {
        self.journal
            .record(LifecycleEvent::TerminationRequested(cause.signal()));
    }

    fn diagnostics_captured(&self, path: &Path) {
        self.journal
            .record(LifecycleEvent::DiagnosticsCaptured(path.to_path_buf()));
    }

    fn diagnostics_failed(&self, _error: &DiagnosticsError) {
        self.journal.record(LifecycleEvent::DiagnosticsFailed);
    }

    fn stop_notified(&self) {
        self.journal.record(LifecycleEvent::StopNotified);
    }

    fn shutting_down(&self) {
        self.journal.record(LifecycleEvent::ShuttingDown);
    }

    fn goodbye(&self) {
        self.journal.record(LifecycleEvent::Goodbye);
    }
}
