//! CPU profiling and the loopback diagnostic endpoint.
//!
//! Two independent features are configured once at startup:
//!
//! * a whole-process CPU profile, recorded into a file that is opened before
//!   anything else starts and written in pprof protobuf format when the
//!   [`CpuProfile`] guard is dropped or finished;
//! * an HTTP endpoint on `127.0.0.1:6060` serving on-demand profiles, a
//!   flamegraph, the thread table and the command line.
//!
//! A CPU profile that cannot be started is fatal. The endpoint is best
//! effort: bind failures are logged and the process carries on.

mod cpu;
mod http;

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::PathBuf;

use thiserror::Error;
use tracing::{info, warn};

use skiff_config::ProfilingSettings;

use crate::PROFILING_TARGET;

pub use cpu::CpuProfile;
pub use http::HttpProfiler;

/// Fixed loopback address of the diagnostic endpoint.
pub const PPROF_HTTP_ADDR: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 6060));

/// Errors raised by the profiling controller.
#[derive(Debug, Error)]
pub enum ProfilingError {
    /// The CPU profile file could not be created.
    #[error("failed to create cpu profile '{path}': {source}")]
    CreateCpuFile {
        /// Requested profile path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The sampler could not be started.
    #[error("failed to start cpu profiler: {source}")]
    Start {
        /// Underlying profiler error.
        #[source]
        source: pprof::Error,
    },
    /// Collecting or rendering the samples failed.
    #[error("failed to build cpu profile report: {source}")]
    Report {
        /// Underlying profiler error.
        #[source]
        source: pprof::Error,
    },
    /// Encoding the protobuf profile failed.
    #[error("failed to encode cpu profile: {message}")]
    Encode {
        /// Encoder message.
        message: String,
    },
    /// Writing the CPU profile file failed.
    #[error("failed to write cpu profile '{path}': {source}")]
    WriteCpuFile {
        /// Profile path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The endpoint address is not a loopback address.
    #[error("refusing to serve profiling data on non-loopback address {address}")]
    NonLoopback {
        /// Rejected address.
        address: SocketAddr,
    },
    /// Binding the endpoint failed.
    #[error("failed to bind profiling endpoint {address}: {source}")]
    Bind {
        /// Requested address.
        address: SocketAddr,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The endpoint thread could not be spawned.
    #[error("failed to spawn profiling endpoint thread: {source}")]
    Spawn {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

impl ProfilingError {
    /// Whether the failure was caused by another profiler already running.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Self::Start {
                source: pprof::Error::Running
            }
        )
    }
}

/// Profiling resources owned by the launch scope.
#[derive(Debug, Default)]
pub struct ProfilingSession {
    cpu: Option<CpuProfile>,
    endpoint: Option<Result<SocketAddr, ProfilingError>>,
}

impl ProfilingSession {
    /// Active CPU profile, when enabled.
    #[must_use]
    pub fn cpu_profile(&self) -> Option<&CpuProfile> {
        self.cpu.as_ref()
    }

    /// Address the diagnostic endpoint is serving on, when it started.
    #[must_use]
    pub fn endpoint(&self) -> Option<SocketAddr> {
        self.endpoint
            .as_ref()
            .and_then(|outcome| outcome.as_ref().ok().copied())
    }

    /// Logs what was enabled. Called once logging is installed, since the
    /// session is configured before the logger.
    pub fn log_summary(&self) {
        if let Some(cpu) = &self.cpu {
            info!(
                target: PROFILING_TARGET,
                file = %cpu.path().display(),
                "cpu profiling enabled"
            );
        }
        match &self.endpoint {
            Some(Ok(address)) => info!(
                target: PROFILING_TARGET,
                %address,
                "profiling endpoint listening"
            ),
            Some(Err(error)) => warn!(
                target: PROFILING_TARGET,
                error = %error,
                "profiling endpoint unavailable"
            ),
            None => {}
        }
    }

    /// Stops the CPU profile and writes it out, logging the outcome.
    pub fn finish(self) {
        let Some(cpu) = self.cpu else {
            return;
        };
        match cpu.finish() {
            Ok(path) => info!(
                target: PROFILING_TARGET,
                file = %path.display(),
                "cpu profile written"
            ),
            Err(error) => warn!(
                target: PROFILING_TARGET,
                error = %error,
                "failed to write cpu profile"
            ),
        }
    }
}

/// Applies the profiling settings.
///
/// # Errors
///
/// Returns [`ProfilingError::CreateCpuFile`] or [`ProfilingError::Start`]
/// when CPU profiling is enabled but cannot begin. Endpoint failures are
/// recorded on the session instead.
pub fn configure(settings: &ProfilingSettings) -> Result<ProfilingSession, ProfilingError> {
    let cpu = if settings.cpu_enabled {
        Some(CpuProfile::start(&settings.cpu_file)?)
    } else {
        None
    };
    let endpoint = settings
        .http_enabled
        .then(|| HttpProfiler::bind(PPROF_HTTP_ADDR).and_then(HttpProfiler::spawn));
    Ok(ProfilingSession { cpu, endpoint })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serial_test::serial;
    use tempfile::TempDir;

    use super::*;

    fn settings(cpu_file: PathBuf, cpu_enabled: bool) -> ProfilingSettings {
        ProfilingSettings {
            cpu_enabled,
            cpu_file,
            http_enabled: false,
        }
    }

    #[test]
    fn disabled_settings_start_nothing() {
        let session = configure(&settings(PathBuf::from("unused.prof"), false))
            .expect("configure profiling");
        assert!(session.cpu_profile().is_none());
        assert!(session.endpoint().is_none());
        assert!(!PathBuf::from("unused.prof").exists());
    }

    #[test]
    fn unwritable_cpu_file_is_fatal() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("absent").join("cpu.prof");
        let error = configure(&settings(path, true)).expect_err("configure must fail");
        assert!(matches!(error, ProfilingError::CreateCpuFile { .. }));
    }

    #[test]
    #[serial]
    fn finished_session_writes_profile() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("cpu.prof");
        let session = configure(&settings(path.clone(), true)).expect("configure profiling");
        assert_eq!(
            session.cpu_profile().map(CpuProfile::path),
            Some(path.as_path())
        );
        session.finish();
        let written = fs::metadata(&path).expect("profile metadata");
        assert!(written.len() > 0);
    }

    #[test]
    #[serial]
    fn second_profiler_is_busy() {
        let dir = TempDir::new().expect("temp dir");
        let first = configure(&settings(dir.path().join("a.prof"), true))
            .expect("first profile");
        let error = configure(&settings(dir.path().join("b.prof"), true))
            .expect_err("second profile must fail");
        assert!(error.is_busy());
        first.finish();
    }
}
