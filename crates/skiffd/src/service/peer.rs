//! Placeholder node service: a TCP peer listener plus a dialler.
//!
//! The node keeps every accepted or dialled peer stream in a shared pool
//! until shutdown. It speaks no protocol; it exists so the daemon binary has
//! something real to supervise.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::DAEMON_TARGET;
use crate::process::StopReceiver;

use super::{ConnectError, ConnectionPool, ManagedService, ServiceError};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(25);
const ERROR_BACKOFF: Duration = Duration::from_millis(150);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const ACCEPT_THREAD: &str = "peer-accept";

/// Shared set of open peer streams keyed by remote address.
#[derive(Debug, Clone, Default)]
pub struct PeerPool {
    peers: Arc<Mutex<HashMap<SocketAddr, TcpStream>>>,
}

impl PeerPool {
    /// Number of open peers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no peer is connected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Whether a peer with this remote address is connected.
    #[must_use]
    pub fn contains(&self, address: &SocketAddr) -> bool {
        self.lock().contains_key(address)
    }

    fn admit(&self, address: SocketAddr, stream: TcpStream) {
        self.lock().insert(address, stream);
    }

    fn close_all(&self) -> usize {
        let mut peers = self.lock();
        let count = peers.len();
        for (address, stream) in peers.drain() {
            if let Err(error) = stream.shutdown(Shutdown::Both) {
                debug!(
                    target: DAEMON_TARGET,
                    peer = %address,
                    error = %error,
                    "peer already disconnected"
                );
            }
        }
        count
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SocketAddr, TcpStream>> {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle returned for a dialled peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerConnection {
    address: SocketAddr,
}

impl PeerConnection {
    /// Remote address of the peer.
    #[must_use]
    pub const fn address(&self) -> SocketAddr {
        self.address
    }
}

impl ConnectionPool for PeerPool {
    type Connection = PeerConnection;

    fn connect(&self, address: &str) -> Result<PeerConnection, ConnectError> {
        let candidates = address
            .to_socket_addrs()
            .map_err(|source| ConnectError::Resolve {
                address: address.to_owned(),
                source,
            })?;
        let mut last_failure = None;
        for candidate in candidates {
            match TcpStream::connect_timeout(&candidate, CONNECT_TIMEOUT) {
                Ok(stream) => {
                    self.admit(candidate, stream);
                    return Ok(PeerConnection { address: candidate });
                }
                Err(source) => last_failure = Some((candidate, source)),
            }
        }
        match last_failure {
            Some((address, source)) => Err(ConnectError::Dial { address, source }),
            None => Err(ConnectError::NoAddress {
                address: address.to_owned(),
            }),
        }
    }
}

/// Minimal node service listening for peers on the configured port.
#[derive(Debug)]
pub struct PeerNode {
    bind_host: IpAddr,
    pool: PeerPool,
    local_addr: Option<SocketAddr>,
    accept: Option<JoinHandle<()>>,
}

impl Default for PeerNode {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerNode {
    /// Node listening on all IPv4 interfaces.
    #[must_use]
    pub fn new() -> Self {
        Self::with_bind_host(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
    }

    /// Node listening on a specific host.
    #[must_use]
    pub fn with_bind_host(bind_host: IpAddr) -> Self {
        Self {
            bind_host,
            pool: PeerPool::default(),
            local_addr: None,
            accept: None,
        }
    }

    /// Address the peer listener is bound to, once initialised.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

impl ManagedService for PeerNode {
    type Pool = PeerPool;

    fn init(
        &mut self,
        port: u16,
        data_dir: &Path,
        stop: StopReceiver,
    ) -> Result<(), ServiceError> {
        if self.accept.is_some() {
            return Err(ServiceError::AlreadyRunning);
        }
        fs::create_dir_all(data_dir).map_err(|source| ServiceError::DataDirectory {
            path: data_dir.to_path_buf(),
            source,
        })?;
        let listener = TcpListener::bind((self.bind_host, port))
            .map_err(|source| ServiceError::Bind { port, source })?;
        listener
            .set_nonblocking(true)
            .map_err(|source| ServiceError::NonBlocking { source })?;
        self.local_addr = listener.local_addr().ok();

        let pool = self.pool.clone();
        let handle = thread::Builder::new()
            .name(ACCEPT_THREAD.to_owned())
            .spawn(move || run_accept_loop(&listener, &pool, &stop))
            .map_err(|source| ServiceError::Spawn { source })?;
        self.accept = Some(handle);
        Ok(())
    }

    fn pool(&self) -> &PeerPool {
        &self.pool
    }

    fn shutdown(&mut self, data_dir: &Path) {
        if let Some(handle) = self.accept.take()
            && handle.join().is_err()
        {
            warn!(target: DAEMON_TARGET, "peer listener thread panicked");
        }
        let closed = self.pool.close_all();
        info!(
            target: DAEMON_TARGET,
            peers = closed,
            data_dir = %data_dir.display(),
            "node service stopped"
        );
    }
}

fn run_accept_loop(listener: &TcpListener, pool: &PeerPool, stop: &StopReceiver) {
    info!(
        target: DAEMON_TARGET,
        address = ?listener.local_addr().ok(),
        "peer listener active"
    );
    let mut last_error = None::<io::ErrorKind>;
    loop {
        match accept_peer(listener) {
            Ok(Some((stream, address))) => {
                last_error = None;
                debug!(target: DAEMON_TARGET, peer = %address, "peer accepted");
                pool.admit(address, stream);
                if stop.is_stopped() {
                    break;
                }
            }
            Ok(None) => {
                if stop.wait_timeout(ACCEPT_BACKOFF) {
                    break;
                }
            }
            Err(error) => {
                let kind = error.kind();
                if last_error != Some(kind) {
                    warn!(
                        target: DAEMON_TARGET,
                        error = %error,
                        "peer accept error"
                    );
                }
                last_error = Some(kind);
                if stop.wait_timeout(ERROR_BACKOFF) {
                    break;
                }
            }
        }
    }
    debug!(target: DAEMON_TARGET, "peer listener stopped");
}

fn accept_peer(listener: &TcpListener) -> io::Result<Option<(TcpStream, SocketAddr)>> {
    match listener.accept() {
        Ok((stream, address)) => {
            stream.set_nonblocking(false)?;
            Ok(Some((stream, address)))
        }
        Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
        Err(error) => Err(error),
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;
    use std::time::Instant;

    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    use super::*;
    use crate::process::stop_channel;

    const WAIT_TIMEOUT: Duration = Duration::from_secs(2);

    #[fixture]
    fn data_root() -> TempDir {
        TempDir::new().expect("temp dir")
    }

    fn loopback_node() -> PeerNode {
        PeerNode::with_bind_host(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    fn wait_for(condition: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + WAIT_TIMEOUT;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        condition()
    }

    #[rstest]
    fn init_creates_data_directory_and_listens(data_root: TempDir) {
        let data_dir = data_root.path().join("nested").join("node");
        let (stop, receiver) = stop_channel();
        let mut node = loopback_node();
        node.init(0, &data_dir, receiver).expect("init node");

        assert!(data_dir.is_dir());
        let address = node.local_addr().expect("listener address");
        let _client = TcpStream::connect(address).expect("connect to node");
        assert!(wait_for(|| node.pool().len() == 1));

        stop.notify();
        node.shutdown(&data_dir);
        assert!(node.pool().is_empty());
    }

    #[rstest]
    fn second_init_is_rejected(data_root: TempDir) {
        let (_stop, receiver) = stop_channel();
        let (_other_stop, other_receiver) = stop_channel();
        let mut node = loopback_node();
        node.init(0, data_root.path(), receiver).expect("init node");
        let error = node
            .init(0, data_root.path(), other_receiver)
            .expect_err("second init must fail");
        assert!(matches!(error, ServiceError::AlreadyRunning));
    }

    #[rstest]
    fn occupied_port_fails_to_bind(data_root: TempDir) {
        let occupied = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).expect("bind placeholder listener");
        let port = occupied.local_addr().expect("placeholder address").port();
        let (_stop, receiver) = stop_channel();
        let error = loopback_node()
            .init(port, data_root.path(), receiver)
            .expect_err("bind must fail");
        assert!(matches!(error, ServiceError::Bind { .. }));
    }

    #[test]
    fn connect_admits_dialled_peer() {
        let remote = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).expect("bind remote");
        let address = remote.local_addr().expect("remote address");
        let pool = PeerPool::default();
        let connection = pool
            .connect(&address.to_string())
            .expect("connect to remote");
        assert_eq!(connection.address(), address);
        assert!(pool.contains(&address));
    }

    #[test]
    fn connect_to_closed_port_fails() {
        let placeholder = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).expect("bind placeholder listener");
        let address = placeholder.local_addr().expect("placeholder address");
        drop(placeholder);
        let error = PeerPool::default()
            .connect(&address.to_string())
            .expect_err("dial must fail");
        assert!(matches!(error, ConnectError::Dial { .. }));
    }

    #[test]
    fn connect_to_malformed_address_fails_to_resolve() {
        let error = PeerPool::default()
            .connect("not an address")
            .expect_err("resolve must fail");
        assert!(matches!(error, ConnectError::Resolve { .. }));
    }
}
