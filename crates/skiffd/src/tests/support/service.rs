use std::io;
use std::path::Path;
use std::thread::{self, JoinHandle};

use crate::gui::Gui;
use crate::process::StopReceiver;
use crate::service::{ConnectError, ConnectionPool, ManagedService, ServiceError};

use super::{Journal, LifecycleEvent};

/// Pool that records dial attempts and optionally refuses them.
#[derive(Debug, Clone)]
pub struct RecordingPool {
    journal: Journal,
    refuse: bool,
}

impl ConnectionPool for RecordingPool {
    type Connection = String;

    fn connect(&self, address: &str) -> Result<String, ConnectError> {
        self.journal.record(LifecycleEvent::Dial(address.to_owned()));
        if self.refuse {
            Err(ConnectError::NoAddress {
                address: address.to_owned(),
            })
        } else {
            Ok(address.to_owned())
        }
    }
}

/// Service whose background worker records when it observes the stop
/// notification.
#[derive(Debug)]
pub struct RecordingService {
    journal: Journal,
    pool: RecordingPool,
    fail_init: bool,
    worker: Option<JoinHandle<()>>,
}

impl RecordingService {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            pool: RecordingPool {
                journal: journal.clone(),
                refuse: false,
            },
            fail_init: false,
            worker: None,
        }
    }

    pub fn refusing_peers(mut self) -> Self {
        self.pool.refuse = true;
        self
    }

    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }
}

impl ManagedService for RecordingService {
    type Pool = RecordingPool;

    fn init(
        &mut self,
        port: u16,
        _data_dir: &Path,
        stop: StopReceiver,
    ) -> Result<(), ServiceError> {
        if self.fail_init {
            return Err(ServiceError::Bind {
                port,
                source: io::Error::new(io::ErrorKind::AddrInUse, "port taken"),
            });
        }
        self.journal.record(LifecycleEvent::ServiceInit);
        let journal = self.journal.clone();
        self.worker = Some(thread::spawn(move || {
            stop.wait();
            journal.record(LifecycleEvent::StopObserved);
        }));
        Ok(())
    }

    fn pool(&self) -> &RecordingPool {
        &self.pool
    }

    fn shutdown(&mut self, _data_dir: &Path) {
        if let Some(worker) = self.worker.take() {
            worker.join().expect("service worker panicked");
        }
        self.journal.record(LifecycleEvent::ServiceShutdown);
    }
}

/// GUI that records that it ran.
#[derive(Debug, Clone)]
pub struct RecordingGui {
    journal: Journal,
}

impl RecordingGui {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
        }
    }
}

impl Gui for RecordingGui {
    fn launch(self) {
        self.journal.record(LifecycleEvent::GuiRan);
    }
}
