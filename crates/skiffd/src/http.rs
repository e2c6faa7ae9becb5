//! Blocking entry point for the small HTTP surfaces (GUI and profiling).

use std::io;
use std::net::TcpListener;

use axum::Router;

/// Serves `router` on `listener` until the process exits.
///
/// Runs a current-thread runtime on the calling thread, which is expected to
/// be dedicated to this server.
pub(crate) fn serve(listener: TcpListener, router: Router) -> io::Result<()> {
    listener.set_nonblocking(true)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async move {
        let listener = tokio::net::TcpListener::from_std(listener)?;
        axum::serve(listener, router).await
    })
}
