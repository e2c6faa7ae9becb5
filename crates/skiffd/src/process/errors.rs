//! Defines the unified error surface for node launch and supervision.

use std::io;

use thiserror::Error;

use crate::profiling::ProfilingError;
use crate::service::{ConnectError, ServiceError};
use crate::telemetry::TelemetryError;

/// Errors raised by signal sources.
#[derive(Debug, Error)]
pub enum SignalError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The source was polled before it was installed.
    #[error("signal source used before installation")]
    NotInstalled,
    /// The signal stream ended without delivering a signal.
    #[error("signal stream closed")]
    Closed,
}

/// Errors surfaced while launching or supervising the node.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Profiling could not be configured.
    #[error("failed to configure profiling: {source}")]
    Profiling {
        /// Underlying profiling error.
        #[source]
        source: ProfilingError,
    },
    /// The global logger could not be installed.
    #[error("failed to initialise logging: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// Interrupt handling could not be installed.
    #[error("failed to watch for interrupts: {source}")]
    Interrupts {
        /// Underlying signal error.
        #[source]
        source: SignalError,
    },
    /// Debug signal handling could not be installed.
    #[error("failed to watch for debug signals: {source}")]
    DebugSignals {
        /// Underlying signal error.
        #[source]
        source: SignalError,
    },
    /// A supervision thread could not be spawned.
    #[error("failed to spawn {thread} thread: {source}")]
    Spawn {
        /// Name of the thread.
        thread: &'static str,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The managed service failed to initialise.
    #[error("failed to start node service: {source}")]
    Service {
        /// Underlying service error.
        #[source]
        source: ServiceError,
    },
    /// The startup peer dial failed.
    #[error("failed to connect to {address}: {source}")]
    Connect {
        /// Address that was dialled.
        address: String,
        /// Underlying connection error.
        #[source]
        source: ConnectError,
    },
}

impl From<ProfilingError> for LaunchError {
    fn from(source: ProfilingError) -> Self {
        Self::Profiling { source }
    }
}

impl From<TelemetryError> for LaunchError {
    fn from(source: TelemetryError) -> Self {
        Self::Telemetry { source }
    }
}

impl From<ServiceError> for LaunchError {
    fn from(source: ServiceError) -> Self {
        Self::Service { source }
    }
}
