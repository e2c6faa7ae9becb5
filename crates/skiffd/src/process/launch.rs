//! Supervises node launch sequencing and runtime orchestration.

use std::sync::Arc;
use std::thread;

use tracing::{info, warn};

use skiff_config::Config;

use crate::diagnostics::DiagnosticsCapturer;
use crate::gui::{Gui, WebGui};
use crate::lifecycle::{LifecycleReporter, StructuredLifecycleReporter};
use crate::service::{ConnectionPool, ManagedService, PeerNode};
use crate::{MAIN_TARGET, profiling, telemetry};

use super::channels::{stop_channel, termination_channel};
use super::debug::{self, DebugSignalSource, SystemDebugSignal};
use super::errors::{LaunchError, SignalError};
use super::interrupt::{self, InterruptSource, SystemInterrupt};
use super::{DEBUG_THREAD, GUI_THREAD, INTERRUPT_THREAD, teardown};

/// Process-level collaborators: signal sources and the diagnostics sink.
pub struct ProcessControl<I, D> {
    /// Source of the terminating interrupt.
    pub interrupts: I,
    /// Source of debug triggers.
    pub debug_signals: D,
    /// Capturer run on each debug trigger.
    pub diagnostics: DiagnosticsCapturer,
}

/// Service dependencies sequenced by the coordinator.
pub struct ServiceDeps<S, G> {
    /// The managed node service.
    pub service: S,
    /// GUI launched unless disabled by configuration.
    pub gui: G,
    /// Lifecycle event sink.
    pub reporter: Arc<dyn LifecycleReporter>,
}

/// Collaborators required to run the node.
pub struct LaunchPlan<I, D, S, G> {
    /// Parsed and validated configuration.
    pub config: Config,
    /// Process-level collaborators.
    pub process: ProcessControl<I, D>,
    /// Service dependencies.
    pub services: ServiceDeps<S, G>,
}

/// Runs the node using the production collaborators.
///
/// # Errors
///
/// Returns [`LaunchError`] when a startup step fails; no shutdown sequence
/// runs in that case.
pub fn run_node(config: Config) -> Result<(), LaunchError> {
    let gui = WebGui::new(config.gui_port, config.port, config.data_dir.clone());
    let plan = LaunchPlan {
        config,
        process: ProcessControl {
            interrupts: SystemInterrupt::new(),
            debug_signals: SystemDebugSignal::new(),
            diagnostics: DiagnosticsCapturer::default(),
        },
        services: ServiceDeps {
            service: PeerNode::new(),
            gui,
            reporter: Arc::new(StructuredLifecycleReporter::new()),
        },
    };
    run_node_with(plan)
}

/// Runs the node with injected collaborators.
///
/// # Errors
///
/// Returns [`LaunchError`] when a startup step fails, or
/// [`LaunchError::Interrupts`] when the interrupt watcher ends without a
/// termination token. No stop notification or shutdown sequence runs in
/// either case. The CPU profile, when enabled, is still written as the
/// function returns.
pub fn run_node_with<I, D, S, G>(plan: LaunchPlan<I, D, S, G>) -> Result<(), LaunchError>
where
    I: InterruptSource + 'static,
    D: DebugSignalSource + 'static,
    S: ManagedService,
    G: Gui + 'static,
{
    let LaunchPlan {
        config,
        process,
        services,
    } = plan;
    let ProcessControl {
        mut interrupts,
        mut debug_signals,
        diagnostics,
    } = process;
    let ServiceDeps {
        mut service,
        gui,
        reporter,
    } = services;

    let profiling = profiling::configure(&config.profiling())?;
    telemetry::initialise(&config.log_settings())?;
    profiling.log_summary();
    info!(
        target: MAIN_TARGET,
        port = config.port,
        data_dir = %config.data_dir.display(),
        gui = !config.disable_gui,
        "starting node"
    );

    interrupts
        .install()
        .map_err(|source| LaunchError::Interrupts { source })?;
    debug_signals
        .install()
        .map_err(|source| LaunchError::DebugSignals { source })?;
    let (termination, terminated) = termination_channel();
    interrupt::spawn(interrupts, termination).map_err(|source| LaunchError::Spawn {
        thread: INTERRUPT_THREAD,
        source,
    })?;
    debug::spawn(debug_signals, diagnostics, Arc::clone(&reporter)).map_err(|source| {
        LaunchError::Spawn {
            thread: DEBUG_THREAD,
            source,
        }
    })?;

    let (stop, stop_receiver) = stop_channel();
    service.init(config.port, &config.data_dir, stop_receiver)?;
    reporter.service_started(config.port, &config.data_dir);

    if let Some(address) = config.connect_to.as_deref() {
        service
            .pool()
            .connect(address)
            .map_err(|source| LaunchError::Connect {
                address: address.to_owned(),
                source,
            })?;
        reporter.peer_connected(address);
    }

    if !config.disable_gui {
        thread::Builder::new()
            .name(GUI_THREAD.to_owned())
            .spawn(move || gui.launch())
            .map_err(|source| LaunchError::Spawn {
                thread: GUI_THREAD,
                source,
            })?;
        reporter.gui_launched(config.gui_port);
    }

    let Some(cause) = terminated.wait() else {
        warn!(
            target: MAIN_TARGET,
            "interrupt watcher ended without a termination request"
        );
        return Err(LaunchError::Interrupts {
            source: SignalError::Closed,
        });
    };
    reporter.termination_requested(cause);
    stop.notify();
    reporter.stop_notified();
    teardown::shutdown(&mut service, &config.data_dir, reporter.as_ref());
    profiling.finish();
    Ok(())
}
