use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex};

use signal_hook::consts::signal::{SIGINT, SIGUSR1};

use crate::process::{DebugSignalSource, InterruptSource, SignalError, TerminationCause};

#[derive(Debug, Default)]
struct TriggerState {
    fired: usize,
    closed: bool,
}

/// Interrupt source released by an [`InterruptTrigger`].
#[derive(Debug, Clone, Default)]
pub struct TestInterrupt {
    state: Arc<(Mutex<TriggerState>, Condvar)>,
}

/// Handle that delivers interrupts to a [`TestInterrupt`].
#[derive(Debug, Clone)]
pub struct InterruptTrigger {
    state: Arc<(Mutex<TriggerState>, Condvar)>,
}

impl TestInterrupt {
    pub fn new() -> (Self, InterruptTrigger) {
        let source = Self::default();
        let trigger = InterruptTrigger {
            state: Arc::clone(&source.state),
        };
        (source, trigger)
    }
}

impl InterruptTrigger {
    /// Delivers one interrupt.
    pub fn fire(&self) {
        let (lock, condvar) = &*self.state;
        lock.lock().expect("trigger mutex poisoned").fired += 1;
        condvar.notify_all();
    }

    /// Makes the source fail instead of delivering an interrupt.
    pub fn close(&self) {
        let (lock, condvar) = &*self.state;
        lock.lock().expect("trigger mutex poisoned").closed = true;
        condvar.notify_all();
    }
}

impl InterruptSource for TestInterrupt {
    fn wait(&mut self) -> Result<TerminationCause, SignalError> {
        let (lock, condvar) = &*self.state;
        let state = condvar
            .wait_while(
                lock.lock().expect("trigger mutex poisoned"),
                |state| state.fired == 0 && !state.closed,
            )
            .expect("trigger mutex poisoned");
        if state.fired > 0 {
            Ok(TerminationCause::from_signal(SIGINT))
        } else {
            Err(SignalError::Closed)
        }
    }
}

/// Debug signal source fed by a [`DebugScript`].
#[derive(Debug)]
pub struct ScriptedDebugSignals {
    triggers: Receiver<i32>,
}

/// Sends debug triggers to a [`ScriptedDebugSignals`].
#[derive(Debug, Clone)]
pub struct DebugScript {
    sender: Sender<i32>,
}

impl ScriptedDebugSignals {
    pub fn new() -> (Self, DebugScript) {
        let (sender, triggers) = mpsc::channel();
        (Self { triggers }, DebugScript { sender })
    }
}

impl DebugScript {
    /// Queues one debug trigger.
    pub fn trigger(&self) {
        self.sender.send(SIGUSR1).expect("debug watcher gone");
    }
}

impl DebugSignalSource for ScriptedDebugSignals {
    fn next_trigger(&mut self) -> Option<i32> {
        self.triggers.recv().ok()
    }
}
