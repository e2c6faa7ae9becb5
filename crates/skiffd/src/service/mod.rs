//! Contracts between the coordinator and the node service it manages.

mod peer;

use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::process::StopReceiver;

pub use peer::{PeerConnection, PeerNode, PeerPool};

/// Node service whose lifetime the coordinator sequences.
pub trait ManagedService {
    /// Pool used to dial peers after initialisation.
    type Pool: ConnectionPool;

    /// Starts the service. The service keeps `stop` and winds its background
    /// work down once the notification arrives.
    fn init(&mut self, port: u16, data_dir: &Path, stop: StopReceiver)
    -> Result<(), ServiceError>;

    /// Connection pool of the running service.
    fn pool(&self) -> &Self::Pool;

    /// Blocks until the service's work has drained. Failures are the
    /// service's own concern.
    fn shutdown(&mut self, data_dir: &Path);
}

/// Dials peers on behalf of a running service.
pub trait ConnectionPool {
    /// Handle to an established connection.
    type Connection;

    /// Connects to `address` (`host:port`).
    fn connect(&self, address: &str) -> Result<Self::Connection, ConnectError>;
}

/// Errors raised while starting the node service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The data directory could not be created.
    #[error("failed to create data directory '{path}': {source}")]
    DataDirectory {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Binding the peer listener failed.
    #[error("failed to bind peer listener on port {port}: {source}")]
    Bind {
        /// Requested port.
        port: u16,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Switching the listener to non-blocking mode failed.
    #[error("failed to configure peer listener: {source}")]
    NonBlocking {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The accept thread could not be spawned.
    #[error("failed to spawn peer listener thread: {source}")]
    Spawn {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// `init` was called on a service that is already running.
    #[error("node service already running")]
    AlreadyRunning,
}

/// Errors raised while dialling a peer.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The address could not be resolved.
    #[error("failed to resolve '{address}': {source}")]
    Resolve {
        /// Address as supplied.
        address: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The address resolved to nothing.
    #[error("'{address}' did not resolve to any socket address")]
    NoAddress {
        /// Address as supplied.
        address: String,
    },
    /// Every resolved address refused the connection.
    #[error("failed to connect to {address}: {source}")]
    Dial {
        /// Last address attempted.
        address: SocketAddr,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}
