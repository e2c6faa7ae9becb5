//! Process-lifecycle coordinator for the Skiff node daemon.
//!
//! The daemon hosts a long-running network node and, optionally, a small web
//! GUI. This crate owns the parts that surround the node rather than the node
//! itself: startup sequencing, operating-system signal handling, on-demand
//! diagnostics, CPU profiling, and an orderly teardown.
//!
//! Startup runs synchronously on the main thread. Profiling is configured
//! first so a misconfigured profile aborts before anything else starts, then
//! the global logger is installed, two signal watchers are spawned, and the
//! managed service is initialised. The main thread then blocks until the
//! interrupt watcher delivers a single termination token, notifies the service
//! to stop, and runs the shutdown sequence. The CPU profile (when enabled) is
//! flushed as the launch scope unwinds, on both the success and the error
//! paths.
//!
//! Collaborators are consumed through narrow traits ([`ManagedService`],
//! [`ConnectionPool`], [`Gui`], [`InterruptSource`], [`DebugSignalSource`],
//! [`LifecycleReporter`]) so the sequence can be exercised with doubles.

mod diagnostics;
mod gui;
mod http;
mod lifecycle;
mod process;
mod profiling;
mod service;
mod telemetry;

pub use diagnostics::{DIAGNOSTICS_FILE, DiagnosticsCapturer, DiagnosticsError};
pub use gui::{Gui, GuiError, WebGui};
pub use lifecycle::{LifecycleReporter, StructuredLifecycleReporter};
pub use process::{
    DebugSignalSource, InterruptSource, LaunchError, LaunchPlan, ProcessControl, ServiceDeps,
    SignalError, StopReceiver, StopSender, SystemDebugSignal, SystemInterrupt, TerminationCause,
    TerminationReceiver, TerminationSender, run_node, run_node_with, stop_channel,
    termination_channel,
};
pub use profiling::{
    CpuProfile, HttpProfiler, PPROF_HTTP_ADDR, ProfilingError, ProfilingSession, configure,
};
pub use service::{
    ConnectError, ConnectionPool, ManagedService, PeerConnection, PeerNode, PeerPool,
    ServiceError,
};
pub use telemetry::{TelemetryError, TelemetryHandle, initialise};

pub(crate) const MAIN_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::main");
pub(crate) const DAEMON_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::daemon");
pub(crate) const GUI_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::gui");
pub(crate) const DIAGNOSTICS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::diagnostics");
pub(crate) const PROFILING_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::profiling");
pub(crate) const SIGNALS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::signals");

#[cfg(test)]
mod tests;
