//! Embedded web GUI.
//!
//! The GUI is a collaborator of the coordinator: it is launched on its own
//! thread after the node service has started and is never joined. The
//! bundled [`WebGui`] serves a one-page summary and a JSON status document
//! on the loopback interface.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, TcpListener};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::response::Html;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::GUI_TARGET;

/// GUI launched by the coordinator.
pub trait Gui: Send {
    /// Runs the GUI. Called on a dedicated thread; may block forever.
    fn launch(self);
}

/// Errors raised by the web GUI.
#[derive(Debug, Error)]
pub enum GuiError {
    /// Binding the GUI listener failed.
    #[error("failed to bind web interface on {address}: {source}")]
    Bind {
        /// Requested address.
        address: SocketAddr,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Serving requests failed.
    #[error("web interface stopped: {source}")]
    Serve {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

#[derive(Debug)]
struct NodeSummary {
    port: u16,
    data_dir: PathBuf,
    started: Instant,
}

/// Status document served at `/api/status`.
#[derive(Debug, Serialize)]
struct StatusDocument {
    version: &'static str,
    status: &'static str,
    port: u16,
    data_dir: String,
    uptime_seconds: u64,
}

/// Loopback web GUI for a running node.
#[derive(Debug)]
pub struct WebGui {
    address: SocketAddr,
    summary: Arc<NodeSummary>,
}

impl WebGui {
    /// GUI on `127.0.0.1:gui_port` describing the node on `port`.
    #[must_use]
    pub fn new(gui_port: u16, port: u16, data_dir: PathBuf) -> Self {
        Self {
            address: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, gui_port)),
            summary: Arc::new(NodeSummary {
                port,
                data_dir,
                started: Instant::now(),
            }),
        }
    }

    /// Address the GUI listens on.
    #[must_use]
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Binds and serves the GUI on the calling thread.
    ///
    /// # Errors
    ///
    /// Returns [`GuiError::Bind`] or [`GuiError::Serve`].
    pub fn run(self) -> Result<(), GuiError> {
        let address = self.address;
        let listener =
            TcpListener::bind(address).map_err(|source| GuiError::Bind { address, source })?;
        info!(target: GUI_TARGET, %address, "web interface listening");
        crate::http::serve(listener, router(self.summary))
            .map_err(|source| GuiError::Serve { source })
    }
}

impl Gui for WebGui {
    fn launch(self) {
        if let Err(error) = self.run() {
            warn!(target: GUI_TARGET, error = %error, "web interface unavailable");
        }
    }
}

fn router(summary: Arc<NodeSummary>) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/api/status", get(status))
        .with_state(summary)
}

fn document(summary: &NodeSummary) -> StatusDocument {
    StatusDocument {
        version: env!("CARGO_PKG_VERSION"),
        status: "running",
        port: summary.port,
        data_dir: summary.data_dir.display().to_string(),
        uptime_seconds: summary.started.elapsed().as_secs(),
    }
}

async fn status(State(summary): State<Arc<NodeSummary>>) -> Json<StatusDocument> {
    Json(document(&summary))
}

async fn home(State(summary): State<Arc<NodeSummary>>) -> Html<String> {
    let doc = document(&summary);
    Html(format!(
        "<!doctype html>\n<html><head><title>skiff</title></head><body>\
         <h1>skiff node</h1>\
         <p>version {}, {} for {}s</p>\
         <p>peer port {}, data in <code>{}</code></p>\
         <p><a href=\"/api/status\">status document</a></p>\
         </body></html>\n",
        doc.version,
        doc.status,
        doc.uptime_seconds,
        doc.port,
        escape_html(&doc.data_dir)
    ))
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for character in text.chars() {
        match character {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
