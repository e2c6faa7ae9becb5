use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use pprof::protos::Message;
use pprof::{ProfilerGuard, ProfilerGuardBuilder, Report};
use tracing::warn;

use crate::PROFILING_TARGET;

use super::ProfilingError;

/// Sampling frequency of the whole-process profile, in hertz.
const SESSION_FREQUENCY: i32 = 100;
/// Sampling frequency of on-demand profiles, in hertz.
const SAMPLE_FREQUENCY: i32 = 997;
const BLOCKLIST: &[&str] = &["libc", "libgcc", "pthread", "vdso"];

/// Output rendering for an on-demand sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SampleFormat {
    /// pprof protobuf.
    Pprof,
    /// SVG flamegraph.
    Flamegraph,
}

impl SampleFormat {
    pub(crate) const fn content_type(self) -> &'static str {
        match self {
            Self::Pprof => "application/octet-stream",
            Self::Flamegraph => "image/svg+xml",
        }
    }
}

/// Whole-process CPU profile bound to an open output file.
///
/// Dropping the guard stops the sampler and writes the profile. Use
/// [`CpuProfile::finish`] to observe write errors.
pub struct CpuProfile {
    path: PathBuf,
    active: Option<(ProfilerGuard<'static>, File)>,
}

impl fmt::Debug for CpuProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CpuProfile")
            .field("path", &self.path)
            .field("active", &self.active.is_some())
            .finish()
    }
}

impl CpuProfile {
    /// Creates (or truncates) `path` and starts sampling.
    ///
    /// # Errors
    ///
    /// Returns [`ProfilingError::CreateCpuFile`] when the file cannot be
    /// opened and [`ProfilingError::Start`] when the sampler cannot start.
    pub fn start(path: &Path) -> Result<Self, ProfilingError> {
        let file = File::create(path).map_err(|source| ProfilingError::CreateCpuFile {
            path: path.to_path_buf(),
            source,
        })?;
        let guard = start_sampler(SESSION_FREQUENCY)?;
        Ok(Self {
            path: path.to_path_buf(),
            active: Some((guard, file)),
        })
    }

    /// Destination of the profile.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stops sampling and writes the profile.
    ///
    /// # Errors
    ///
    /// Returns the report, encoding or write failure.
    pub fn finish(mut self) -> Result<PathBuf, ProfilingError> {
        self.flush()?;
        Ok(self.path.clone())
    }

    fn flush(&mut self) -> Result<(), ProfilingError> {
        let Some((guard, mut file)) = self.active.take() else {
            return Ok(());
        };
        let report = build_report(&guard)?;
        drop(guard);
        let bytes = encode_pprof(&report)?;
        file.write_all(&bytes)
            .and_then(|()| file.sync_all())
            .map_err(|source| ProfilingError::WriteCpuFile {
                path: self.path.clone(),
                source,
            })
    }
}

impl Drop for CpuProfile {
    fn drop(&mut self) {
        if let Err(error) = self.flush() {
            warn!(
                target: PROFILING_TARGET,
                file = %self.path.display(),
                error = %error,
                "failed to write cpu profile"
            );
        }
    }
}

/// Samples the process for `duration` and renders the result.
pub(crate) fn sample(duration: Duration, format: SampleFormat) -> Result<Vec<u8>, ProfilingError> {
    let guard = start_sampler(SAMPLE_FREQUENCY)?;
    thread::sleep(duration);
    let report = build_report(&guard)?;
    drop(guard);
    match format {
        SampleFormat::Pprof => encode_pprof(&report),
        SampleFormat::Flamegraph => {
            let mut svg = Vec::new();
            report
                .flamegraph(&mut svg)
                .map_err(|source| ProfilingError::Report { source })?;
            Ok(svg)
        }
    }
}

fn start_sampler(frequency: i32) -> Result<ProfilerGuard<'static>, ProfilingError> {
    ProfilerGuardBuilder::default()
        .frequency(frequency)
        .blocklist(BLOCKLIST)
        .build()
        .map_err(|source| ProfilingError::Start { source })
}

fn build_report(guard: &ProfilerGuard<'static>) -> Result<Report, ProfilingError> {
    guard
        .report()
        .build()
        .map_err(|source| ProfilingError::Report { source })
}

fn encode_pprof(report: &Report) -> Result<Vec<u8>, ProfilingError> {
    let profile = report
        .pprof()
        .map_err(|source| ProfilingError::Report { source })?;
    profile
        .write_to_bytes()
        .map_err(|error| ProfilingError::Encode {
            message: error.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serial_test::serial;
    use tempfile::TempDir;

    use super::*;

    #[test]
    #[serial]
    fn dropping_profile_writes_file() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("cpu.prof");
        let profile = CpuProfile::start(&path).expect("start profile");
        assert_eq!(fs::metadata(&path).expect("metadata").len(), 0);
        drop(profile);
        assert!(fs::metadata(&path).expect("metadata").len() > 0);
    }

    #[test]
    #[serial]
    fn finish_is_exclusive_with_drop() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("cpu.prof");
        let written = CpuProfile::start(&path)
            .expect("start profile")
            .finish()
            .expect("finish profile");
        assert_eq!(written, path);
        let first_len = fs::metadata(&path).expect("metadata").len();
        assert!(first_len > 0);
        let restarted = CpuProfile::start(&dir.path().join("again.prof"));
        assert!(restarted.is_ok(), "sampler must be released after finish");
    }
}
