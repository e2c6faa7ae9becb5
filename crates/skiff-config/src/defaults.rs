use std::path::PathBuf;

/// Default peer listener port.
pub const DEFAULT_PORT: u16 = 6000;

/// Default loopback port for the web GUI.
pub const DEFAULT_GUI_PORT: u16 = 6420;

/// Default file receiving the CPU profile.
pub const DEFAULT_CPU_PROFILE_FILE: &str = "skiffd.prof";

/// Directory name created under the home directory for node state.
pub const DATA_DIRECTORY_NAME: &str = ".skiff";

/// Log modules the daemon emits on. Modules outside this set are accepted
/// but never produce output.
pub const RECOGNISED_LOG_MODULES: &[&str] = &[
    "skiffd::main",
    "skiffd::daemon",
    "skiffd::gui",
    "skiffd::diagnostics",
    "skiffd::profiling",
    "skiffd::signals",
];

/// Owned copy of [`RECOGNISED_LOG_MODULES`], used as the CLI default.
#[must_use]
pub fn default_log_modules() -> Vec<String> {
    RECOGNISED_LOG_MODULES
        .iter()
        .map(|module| (*module).to_owned())
        .collect()
}

/// Computes the default data directory, `~/.skiff`.
///
/// Falls back to a relative `.skiff` when no home directory is known.
#[must_use]
pub fn default_data_directory() -> PathBuf {
    dirs::home_dir().map_or_else(
        || PathBuf::from(DATA_DIRECTORY_NAME),
        |home| home.join(DATA_DIRECTORY_NAME),
    )
}
