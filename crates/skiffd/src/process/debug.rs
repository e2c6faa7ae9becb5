//! Watches for debug signals and captures program status on each one.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use signal_hook::consts::signal::SIGUSR1;
use signal_hook::iterator::Signals;
use tracing::debug;

use crate::SIGNALS_TARGET;
use crate::diagnostics::DiagnosticsCapturer;
use crate::lifecycle::LifecycleReporter;

use super::DEBUG_THREAD;
use super::errors::SignalError;

/// Repeatable source of debug triggers.
pub trait DebugSignalSource: Send {
    /// Registers with the operating system. Called on the launching thread
    /// before the watcher is spawned.
    fn install(&mut self) -> Result<(), SignalError> {
        Ok(())
    }

    /// Blocks until the next trigger and returns its signal number, or
    /// `None` once the source has closed.
    fn next_trigger(&mut self) -> Option<i32>;
}

/// Debug signal source backed by `SIGUSR1`.
///
/// Deliveries that arrive while a capture is running coalesce into one
/// pending trigger.
#[derive(Default)]
pub struct SystemDebugSignal {
    signals: Option<Signals>,
}

impl SystemDebugSignal {
    /// Builds an uninstalled debug signal source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl DebugSignalSource for SystemDebugSignal {
    fn install(&mut self) -> Result<(), SignalError> {
        let signals = Signals::new([SIGUSR1]).map_err(|source| SignalError::Install { source })?;
        self.signals = Some(signals);
        Ok(())
    }

    fn next_trigger(&mut self) -> Option<i32> {
        self.signals.as_mut()?.forever().next()
    }
}

/// Spawns the debug watcher thread.
pub(crate) fn spawn<S>(
    mut source: S,
    capturer: DiagnosticsCapturer,
    reporter: Arc<dyn LifecycleReporter>,
) -> io::Result<JoinHandle<()>>
where
    S: DebugSignalSource + 'static,
{
    thread::Builder::new()
        .name(DEBUG_THREAD.to_owned())
        .spawn(move || watch(&mut source, &capturer, reporter.as_ref()))
}

fn watch<S: DebugSignalSource>(
    source: &mut S,
    capturer: &DiagnosticsCapturer,
    reporter: &dyn LifecycleReporter,
) {
    while let Some(signal) = source.next_trigger() {
        debug!(target: SIGNALS_TARGET, signal, "debug signal received");
        match capturer.capture() {
            Ok(path) => reporter.diagnostics_captured(&path),
            Err(error) => reporter.diagnostics_failed(&error),
        }
    }
    debug!(target: SIGNALS_TARGET, "debug signal source closed");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::mpsc;

    use serial_test::serial;
    use signal_hook::low_level::raise;
    use tempfile::TempDir;

    use super::*;
    use crate::tests::support::{LifecycleEvent, RecordingLifecycleReporter};

    struct Scripted(mpsc::Receiver<i32>);

    impl DebugSignalSource for Scripted {
        fn next_trigger(&mut self) -> Option<i32> {
            self.0.recv().ok()
        }
    }

    #[test]
    fn each_trigger_captures_until_source_closes() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("status.threads");
        let capturer = DiagnosticsCapturer::new(&path).with_console(false);
        let reporter = Arc::new(RecordingLifecycleReporter::default());
        let (script, triggers) = mpsc::channel();
        for _ in 0..2 {
            script.send(SIGUSR1).expect("send trigger");
        }
        drop(script);

        let shared: Arc<dyn LifecycleReporter> = reporter.clone();
        spawn(Scripted(triggers), capturer, shared)
            .expect("spawn watcher")
            .join()
            .expect("watcher panicked");

        let captured = reporter
            .events()
            .into_iter()
            .filter(|event| matches!(event, LifecycleEvent::DiagnosticsCaptured(_)))
            .count();
        assert_eq!(captured, 2);
        let report = fs::read_to_string(&path).expect("read report");
        assert!(report.contains("capture #2"));
    }

    #[test]
    fn capture_failures_do_not_stop_the_loop() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("missing").join("status.threads");
        let capturer = DiagnosticsCapturer::new(&path).with_console(false);
        let reporter = Arc::new(RecordingLifecycleReporter::default());
        let (script, triggers) = mpsc::channel();
        script.send(SIGUSR1).expect("send trigger");
        script.send(SIGUSR1).expect("send trigger");
        drop(script);

        let shared: Arc<dyn LifecycleReporter> = reporter.clone();
        spawn(Scripted(triggers), capturer, shared)
            .expect("spawn watcher")
            .join()
            .expect("watcher panicked");

        let failures = reporter
            .events()
            .into_iter()
            .filter(|event| matches!(event, LifecycleEvent::DiagnosticsFailed))
            .count();
        assert_eq!(failures, 2);
    }

    #[test]
    fn uninstalled_source_yields_nothing() {
        assert_eq!(SystemDebugSignal::new().next_trigger(), None);
    }

    #[test]
    #[serial]
    fn system_source_reports_sigusr1() {
        let mut source = SystemDebugSignal::new();
        source.install().expect("install handler");
        raise(SIGUSR1).expect("raise SIGUSR1");
        assert_eq!(source.next_trigger(), Some(SIGUSR1));
    }
}
