//! Configuration for the Skiff node daemon.
//!
//! Values come from command-line flags with `SKIFF_*` environment variables
//! as fallbacks, then built-in defaults. The parsed [`Config`] is immutable
//! for the lifetime of the process; the daemon reads it once at startup and
//! hands narrow views ([`LogSettings`], [`ProfilingSettings`]) to the
//! subsystems that need them.

mod defaults;
mod logging;

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{ArgAction, Parser};
use thiserror::Error;

pub use defaults::{
    DATA_DIRECTORY_NAME, DEFAULT_CPU_PROFILE_FILE, DEFAULT_GUI_PORT, DEFAULT_PORT,
    RECOGNISED_LOG_MODULES, default_data_directory, default_log_modules,
};
pub use logging::{LogSettings, Severity, SeverityParseError};

/// Daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(
    name = "skiffd",
    version,
    about = "Skiff node daemon with an optional web GUI"
)]
pub struct Config {
    /// Port the node listens on for peers.
    #[arg(long, env = "SKIFF_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Directory holding node state.
    #[arg(long, env = "SKIFF_DATA_DIR", default_value_os_t = default_data_directory())]
    pub data_dir: PathBuf,
    /// Runs without the web GUI.
    #[arg(long, env = "SKIFF_DISABLE_GUI")]
    pub disable_gui: bool,
    /// Loopback port served by the web GUI.
    #[arg(long, env = "SKIFF_GUI_PORT", default_value_t = DEFAULT_GUI_PORT)]
    pub gui_port: u16,
    /// Peer address dialled once at startup; failure aborts the launch.
    #[arg(long, env = "SKIFF_CONNECT_TO", value_name = "ADDRESS")]
    pub connect_to: Option<String>,
    /// Minimum severity for the configured log modules.
    #[arg(long, env = "SKIFF_LOG_LEVEL", default_value_t = Severity::Info)]
    pub log_level: Severity,
    /// Log modules enabled at `--log-level`; repeat or comma-separate.
    #[arg(
        long = "log-module",
        env = "SKIFF_LOG_MODULES",
        value_name = "MODULE",
        value_delimiter = ',',
        default_values_t = default_log_modules()
    )]
    pub log_modules: Vec<String>,
    /// Colours log levels with ANSI escapes.
    #[arg(long, env = "SKIFF_COLOR_LOG", default_value_t = true, action = ArgAction::Set)]
    pub color_log: bool,
    /// Records a CPU profile for the whole process lifetime.
    #[arg(long, env = "SKIFF_PROFILE_CPU")]
    pub profile_cpu: bool,
    /// Destination of the CPU profile.
    #[arg(
        long,
        env = "SKIFF_PROFILE_CPU_FILE",
        default_value_os_t = PathBuf::from(DEFAULT_CPU_PROFILE_FILE)
    )]
    pub profile_cpu_file: PathBuf,
    /// Serves profiling routes on the loopback diagnostic endpoint.
    #[arg(long, env = "SKIFF_HTTP_PROF")]
    pub http_prof: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            data_dir: default_data_directory(),
            disable_gui: false,
            gui_port: DEFAULT_GUI_PORT,
            connect_to: None,
            log_level: Severity::default(),
            log_modules: default_log_modules(),
            color_log: true,
            profile_cpu: false,
            profile_cpu_file: PathBuf::from(DEFAULT_CPU_PROFILE_FILE),
            http_prof: false,
        }
    }
}

/// Profiling toggles consumed by the daemon's profiling controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfilingSettings {
    /// Whether to record a CPU profile for the process lifetime.
    pub cpu_enabled: bool,
    /// File receiving the CPU profile.
    pub cpu_file: PathBuf,
    /// Whether to serve the loopback diagnostic endpoint.
    pub http_enabled: bool,
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Command-line or environment input could not be parsed.
    #[error(transparent)]
    Parse(#[from] clap::Error),
    /// The node port must be non-zero.
    #[error("port must be between 1 and 65535")]
    ZeroPort,
    /// A log module entry was empty.
    #[error("log module names must not be empty")]
    EmptyLogModule,
    /// The GUI would collide with the peer listener.
    #[error("gui port {port} collides with the node port")]
    GuiPortConflict {
        /// Port configured for both listeners.
        port: u16,
    },
}

impl Config {
    /// Parses and validates configuration from the provided arguments.
    ///
    /// The first item is treated as the binary name, as with
    /// [`std::env::args_os`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed input (including
    /// `--help`/`--version` requests, which clap reports as errors) and the
    /// validation variants for values that parse but cannot run.
    pub fn load_from_iter<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let config = Self::try_parse_from(args)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks invariants clap cannot express.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::ZeroPort);
        }
        if self.log_modules.iter().any(|module| module.trim().is_empty()) {
            return Err(ConfigError::EmptyLogModule);
        }
        if !self.disable_gui && self.gui_port == self.port {
            return Err(ConfigError::GuiPortConflict { port: self.port });
        }
        Ok(())
    }

    /// Logger view of the configuration.
    #[must_use]
    pub fn log_settings(&self) -> LogSettings {
        LogSettings {
            level: self.log_level,
            modules: self.log_modules.clone(),
            color: self.color_log,
        }
    }

    /// Profiling view of the configuration.
    #[must_use]
    pub fn profiling(&self) -> ProfilingSettings {
        ProfilingSettings {
            cpu_enabled: self.profile_cpu,
            cpu_file: self.profile_cpu_file.clone(),
            http_enabled: self.http_prof,
        }
    }
}
