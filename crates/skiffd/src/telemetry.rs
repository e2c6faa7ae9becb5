//! Process-wide logger initialisation.
//!
//! The daemon logs through `tracing` with an explicit target per subsystem
//! (for example `skiffd::daemon`). Initialisation installs a single global
//! subscriber that prints `[<target>:<LEVEL>] <message>` lines to standard
//! output and enables each configured module at the configured severity.
//! Targets that are not listed stay silent.

use std::fmt;
use std::io;

use once_cell::sync::OnceCell;
use tracing::{Event, Level, Subscriber, subscriber::SetGlobalDefaultError, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::{Directive, LevelFilter};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

use skiff_config::LogSettings;

use crate::MAIN_TARGET;

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

const RESET: &str = "\x1b[0m";

/// Handle returned when telemetry has been initialised.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Failed to install the tracing subscriber.
    #[error("failed to install logging subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Installs the global logger on first use.
///
/// Later calls never reconfigure the logger: they log a warning and return a
/// fresh [`TelemetryHandle`].
///
/// # Errors
///
/// Returns [`TelemetryError::Subscriber`] when another global subscriber was
/// installed outside this function.
pub fn initialise(settings: &LogSettings) -> Result<TelemetryHandle, TelemetryError> {
    let mut installed = None;
    TELEMETRY_GUARD.get_or_try_init(|| {
        installed = Some(install_subscriber(settings)?);
        Ok::<(), TelemetryError>(())
    })?;

    match installed {
        Some(rejected) => {
            for module in rejected {
                warn!(
                    target: MAIN_TARGET,
                    module = %module,
                    "ignoring log module that is not a valid filter target"
                );
            }
        }
        None => {
            warn!(
                target: MAIN_TARGET,
                "logging already initialised; ignoring reconfiguration"
            );
        }
    }
    Ok(TelemetryHandle)
}

fn install_subscriber(settings: &LogSettings) -> Result<Vec<String>, TelemetryError> {
    let (filter, rejected) = build_filter(settings);
    let subscriber = build_subscriber(filter, settings.color, io::stdout);
    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)?;
    Ok(rejected)
}

fn build_subscriber<W>(
    filter: EnvFilter,
    color: bool,
    writer: W,
) -> impl Subscriber + Send + Sync
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(color)
        .event_format(ModuleFormat)
        .finish()
}

/// Builds a filter that is `off` globally and opens each module at the
/// configured level. Returns the module names that could not form a
/// directive.
pub(crate) fn build_filter(settings: &LogSettings) -> (EnvFilter, Vec<String>) {
    let mut filter = EnvFilter::default().add_directive(LevelFilter::OFF.into());
    let mut rejected = Vec::new();
    for module in &settings.modules {
        let spec = format!("{}={}", module.trim(), settings.level.as_directive());
        match spec.parse::<Directive>() {
            Ok(directive) => filter = filter.add_directive(directive),
            Err(_) => rejected.push(module.clone()),
        }
    }
    (filter, rejected)
}

/// `[<target>:<LEVEL>] <message> key=value...`
#[derive(Debug, Default, Clone, Copy)]
struct ModuleFormat;

impl<S, N> FormatEvent<S, N> for ModuleFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();
        let level = *metadata.level();
        if writer.has_ansi_escapes() {
            write!(
                writer,
                "[{}:{}{level}{RESET}] ",
                metadata.target(),
                level_colour(level)
            )?;
        } else {
            write!(writer, "[{}:{level}] ", metadata.target())?;
        }
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

const fn level_colour(level: Level) -> &'static str {
    match level {
        Level::TRACE => "\x1b[35m",
        Level::DEBUG => "\x1b[34m",
        Level::INFO => "\x1b[32m",
        Level::WARN => "\x1b[33m",
        Level::ERROR => "\x1b[31m",
    }
}
