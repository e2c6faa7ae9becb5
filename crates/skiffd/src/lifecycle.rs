//! Structured reporting for node lifecycle events.

use std::path::Path;
use std::sync::Arc;

use crate::diagnostics::DiagnosticsError;
use crate::process::TerminationCause;
use crate::{DAEMON_TARGET, DIAGNOSTICS_TARGET, GUI_TARGET, SIGNALS_TARGET};

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait LifecycleReporter: Send + Sync {
    /// Invoked after the managed service initialised successfully.
    fn service_started(&self, port: u16, data_dir: &Path);

    /// Invoked after the startup peer dial succeeded.
    fn peer_connected(&self, address: &str);

    /// Invoked once the GUI thread has been spawned.
    fn gui_launched(&self, port: u16);

    /// Invoked when the orchestrator receives the termination token.
    fn termination_requested(&self, cause: TerminationCause);

    /// Invoked after a diagnostics report was written.
    fn diagnostics_captured(&self, path: &Path);

    /// Invoked when a diagnostics capture failed.
    fn diagnostics_failed(&self, error: &DiagnosticsError);

    /// Invoked after the stop notification was sent to the service.
    fn stop_notified(&self);

    /// Invoked before the managed service is torn down.
    fn shutting_down(&self);

    /// Invoked after the managed service finished tearing down.
    fn goodbye(&self);
}

impl<T> LifecycleReporter for Arc<T>
where
    T: LifecycleReporter + ?Sized,
{
    fn service_started(&self, port: u16, data_dir: &Path) {
        (**self).service_started(port, data_dir);
    }

    fn peer_connected(&self, address: &str) {
        (**self).peer_connected(address);
    }

    fn gui_launched(&self, port: u16) {
        (**self).gui_launched(port);
    }

    fn termination_requested(&self, cause: TerminationCause) {
        (**self).termination_requested(cause);
    }

    fn diagnostics_captured(&self, path: &Path) {
        (**self).diagnostics_captured(path);
    }

    fn diagnostics_failed(&self, error: &DiagnosticsError) {
        (**self).diagnostics_failed(error);
    }

    fn stop_notified(&self) {
        (**self).stop_notified();
    }

    fn shutting_down(&self) {
        (**self).shutting_down();
    }

    fn goodbye(&self) {
        (**self).goodbye();
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredLifecycleReporter;

impl StructuredLifecycleReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl LifecycleReporter for StructuredLifecycleReporter {
    fn service_started(&self, port: u16, data_dir: &Path) {
        tracing::info!(
            target: DAEMON_TARGET,
            event = "service_started",
            port,
            data_dir = %data_dir.display(),
            "node service started"
        );
    }

    fn peer_connected(&self, address: &str) {
        tracing::info!(
            target: DAEMON_TARGET,
            event = "peer_connected",
            address,
            "connected to peer"
        );
    }

    fn gui_launched(&self, port: u16) {
        tracing::info!(
            target: GUI_TARGET,
            event = "gui_launched",
            port,
            "web interface launched"
        );
    }

    fn termination_requested(&self, cause: TerminationCause) {
        tracing::info!(
            target: SIGNALS_TARGET,
            event = "termination_requested",
            signal = %cause,
            "termination requested"
        );
    }

    fn diagnostics_captured(&self, path: &Path) {
        tracing::info!(
            target: DIAGNOSTICS_TARGET,
            event = "diagnostics_captured",
            file = %path.display(),
            "program status written"
        );
    }

    fn diagnostics_failed(&self, error: &DiagnosticsError) {
        tracing::warn!(
            target: DIAGNOSTICS_TARGET,
            event = "diagnostics_failed",
            error = %error,
            "failed to write program status"
        );
    }

    fn stop_notified(&self) {
        tracing::debug!(
            target: DAEMON_TARGET,
            event = "stop_notified",
            "stop notification sent"
        );
    }

    fn shutting_down(&self) {
        tracing::info!(target: DAEMON_TARGET, "Shutting down");
    }

    fn goodbye(&self) {
        tracing::info!(target: DAEMON_TARGET, "Goodbye");
    }
}
