//! Signal watchers, launch sequencing and teardown.

mod channels;
mod debug;
mod errors;
mod interrupt;
pub(crate) mod launch;
pub(crate) mod teardown;

pub use channels::{
    StopReceiver, StopSender, TerminationCause, TerminationReceiver, TerminationSender,
    stop_channel, termination_channel,
};
pub use debug::{DebugSignalSource, SystemDebugSignal};
pub use errors::{LaunchError, SignalError};
pub use interrupt::{InterruptSource, SystemInterrupt};
pub use launch::{LaunchPlan, ProcessControl, ServiceDeps, run_node, run_node_with};

/// Exit status used when a second interrupt arrives during shutdown.
pub(crate) const FORCED_EXIT_STATUS: i32 = 130;

pub(crate) const INTERRUPT_THREAD: &str = "interrupt-watch";
pub(crate) const DEBUG_THREAD: &str = "debug-watch";
pub(crate) const GUI_THREAD: &str = "gui";
