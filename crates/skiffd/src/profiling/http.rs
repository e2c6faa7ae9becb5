//! Loopback diagnostic endpoint.

use std::env;
use std::net::{SocketAddr, TcpListener};
use std::thread;
use std::time::Duration;

use axum::Router;
use axum::extract::Query;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::Deserialize;
use tracing::warn;

use crate::PROFILING_TARGET;
use crate::diagnostics::render_thread_table;

use super::ProfilingError;
use super::cpu::{self, SampleFormat};

const DEFAULT_SAMPLE_SECONDS: u64 = 30;
const MAX_SAMPLE_SECONDS: u64 = 300;
const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const ENDPOINT_THREAD: &str = "pprof-http";

const INDEX: &str = "\
skiffd diagnostic endpoint

/debug/pprof/profile?seconds=N     CPU profile, pprof protobuf (default 30s, max 300s)
/debug/pprof/flamegraph?seconds=N  CPU profile rendered as an SVG flamegraph
/debug/pprof/threads               thread table
/debug/pprof/cmdline               command line, NUL separated
";

/// Bound, not yet serving, diagnostic endpoint.
#[derive(Debug)]
pub struct HttpProfiler {
    listener: TcpListener,
    address: SocketAddr,
}

impl HttpProfiler {
    /// Binds the endpoint. Only loopback addresses are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`ProfilingError::NonLoopback`] for a routable address and
    /// [`ProfilingError::Bind`] when the socket cannot be bound.
    pub fn bind(address: SocketAddr) -> Result<Self, ProfilingError> {
        if !address.ip().is_loopback() {
            return Err(ProfilingError::NonLoopback { address });
        }
        let listener =
            TcpListener::bind(address).map_err(|source| ProfilingError::Bind { address, source })?;
        let address = listener
            .local_addr()
            .map_err(|source| ProfilingError::Bind { address, source })?;
        Ok(Self { listener, address })
    }

    /// Address the endpoint is bound to.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.address
    }

    /// Serves the routes on a dedicated thread for the rest of the process.
    ///
    /// # Errors
    ///
    /// Returns [`ProfilingError::Spawn`] when the thread cannot start.
    pub fn spawn(self) -> Result<SocketAddr, ProfilingError> {
        let Self { listener, address } = self;
        thread::Builder::new()
            .name(ENDPOINT_THREAD.to_owned())
            .spawn(move || {
                if let Err(error) = crate::http::serve(listener, router()) {
                    warn!(
                        target: PROFILING_TARGET,
                        %address,
                        error = %error,
                        "profiling endpoint stopped"
                    );
                }
            })
            .map_err(|source| ProfilingError::Spawn { source })?;
        Ok(address)
    }
}

/// Routes served by the diagnostic endpoint.
pub(crate) fn router() -> Router {
    Router::new()
        .route("/debug/pprof/", get(index))
        .route("/debug/pprof/profile", get(profile))
        .route("/debug/pprof/flamegraph", get(flamegraph))
        .route("/debug/pprof/threads", get(threads))
        .route("/debug/pprof/cmdline", get(cmdline))
}

#[derive(Debug, Default, Deserialize)]
struct SampleQuery {
    seconds: Option<u64>,
}

impl SampleQuery {
    fn duration(&self) -> Duration {
        Duration::from_secs(
            self.seconds
                .unwrap_or(DEFAULT_SAMPLE_SECONDS)
                .clamp(1, MAX_SAMPLE_SECONDS),
        )
    }
}

async fn index() -> impl IntoResponse {
    ([(CONTENT_TYPE, TEXT_PLAIN)], INDEX)
}

async fn profile(Query(query): Query<SampleQuery>) -> Response {
    sampled(query.duration(), SampleFormat::Pprof).await
}

async fn flamegraph(Query(query): Query<SampleQuery>) -> Response {
    sampled(query.duration(), SampleFormat::Flamegraph).await
}

async fn sampled(duration: Duration, format: SampleFormat) -> Response {
    match tokio::task::spawn_blocking(move || cpu::sample(duration, format)).await {
        Ok(Ok(body)) => ([(CONTENT_TYPE, format.content_type())], body).into_response(),
        Ok(Err(error)) if error.is_busy() => (
            StatusCode::CONFLICT,
            "another cpu profile is already running\n",
        )
            .into_response(),
        Ok(Err(error)) => {
            warn!(
                target: PROFILING_TARGET,
                error = %error,
                "on-demand profile failed"
            );
            (StatusCode::INTERNAL_SERVER_ERROR, format!("{error}\n")).into_response()
        }
        Err(error) => {
            warn!(
                target: PROFILING_TARGET,
                error = %error,
                "profiling task aborted"
            );
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn threads() -> Response {
    match render_thread_table() {
        Ok(table) => ([(CONTENT_TYPE, TEXT_PLAIN)], table).into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

async fn cmdline() -> impl IntoResponse {
    let args: Vec<String> = env::args_os()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();
    ([(CONTENT_TYPE, TEXT_PLAIN)], args.join("\0"))
}
