//! Admin HTTP API of a worker process.
//!
//! This only wraps the process lifecycle; it never reads or changes stage
//! plans.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderValue};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::config::ListenerConfig;
use crate::error::{Result, WorkerError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceInfo {
    pub instance_id: String,
}

struct AdminState {
    instance_id: String,
}

/// Routes served on every admin listener.
pub fn router(instance_id: impl Into<String>) -> Router {
    let state = Arc::new(AdminState {
        instance_id: instance_id.into(),
    });
    Router::new()
        .route("/health", get(health))
        .route("/instance", get(instance))
        .with_state(state)
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str {
    "OK"
}

async fn instance(State(state): State<Arc<AdminState>>) -> Json<InstanceInfo> {
    Json(InstanceInfo {
        instance_id: state.instance_id.clone(),
    })
}

struct RunningListener {
    name: String,
    local_addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

pub struct AdminApiApplication {
    instance_id: String,
    started: bool,
    listeners: Vec<RunningListener>,
}

impl AdminApiApplication {
    pub fn new(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            started: false,
            listeners: Vec::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.started
    }

    /// Bound addresses, in listener order. Useful when a config asks for port 0.
    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.listeners.iter().map(|l| l.local_addr).collect()
    }

    /// Binds and serves every listener.
    ///
    /// Returns `Ok(false)` if already started. Either all listeners come up or
    /// none stays bound.
    pub async fn start(&mut self, listeners: &[ListenerConfig]) -> Result<bool> {
        if self.is_running() {
            tracing::warn!(instance = %self.instance_id, "admin api already started");
            return Ok(false);
        }
        for listener in listeners {
            listener.check_protocol()?;
        }

        let mut bound = Vec::with_capacity(listeners.len());
        for config in listeners {
            let listener = TcpListener::bind(config.bind_address())
                .await
                .map_err(|source| WorkerError::Bind {
                    listener: config.name.clone(),
                    source,
                })?;
            bound.push((config.name.clone(), listener));
        }

        for (name, listener) in bound {
            let local_addr = listener.local_addr()?;
            let app = router(self.instance_id.clone());
            let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
            let server_name = name.clone();
            let handle = tokio::spawn(async move {
                let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                });
                if let Err(e) = server.await {
                    tracing::error!(listener = %server_name, error = %e, "admin listener failed");
                }
            });
            tracing::info!(instance = %self.instance_id, listener = %name, %local_addr, "admin api listening");
            self.listeners.push(RunningListener {
                name,
                local_addr,
                shutdown_tx,
                handle,
            });
        }
        self.started = true;
        Ok(true)
    }

    /// Gracefully stops every listener. A no-op when not started.
    pub async fn stop(&mut self) {
        self.started = false;
        for listener in self.listeners.drain(..) {
            let _ = listener.shutdown_tx.send(());
            if let Err(e) = listener.handle.await {
                tracing::error!(listener = %listener.name, error = %e, "admin listener task failed");
            }
            tracing::info!(instance = %self.instance_id, listener = %listener.name, "admin api stopped");
        }
    }
}
