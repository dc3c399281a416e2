//! Application server started once the instance is active.
//!
//! # Responsibilities
//! - Serve the greeting, the request counter and the instance's role
//! - Stop on the shutdown broadcast

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    middleware,
    routing::get,
    Extension, Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, watch};
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::election::{ElectionState, InstanceAddress, Role};
use crate::http::request::{request_id, RequestId};

/// State injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pod_name: Arc<str>,
    counter: Arc<AtomicU64>,
    election: watch::Receiver<ElectionState>,
    address: Option<InstanceAddress>,
}

impl AppState {
    pub fn new(
        pod_name: impl Into<String>,
        election: watch::Receiver<ElectionState>,
        address: Option<InstanceAddress>,
    ) -> Self {
        Self {
            pod_name: Arc::from(pod_name.into()),
            counter: Arc::new(AtomicU64::new(0)),
            election,
            address,
        }
    }
}

#[derive(Debug, Serialize)]
struct RoleReport {
    role: Role,
    state: &'static str,
    address: Option<InstanceAddress>,
}

/// HTTP server for the application role.
pub struct AppServer {
    router: Router,
}

impl AppServer {
    pub fn new(state: AppState) -> Self {
        Self {
            router: build_router(state),
        }
    }

    /// Serve on `listener` until shutdown.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Application server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("Application server stopped");
        Ok(())
    }
}

#[allow(deprecated)]
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(hello))
        .route("/state", get(current_state))
        .route("/role", get(role))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(request_id))
                .layer(TimeoutLayer::new(Duration::from_secs(10))),
        )
}

async fn hello(State(state): State<AppState>) -> String {
    format!("Hello World from {}", state.pod_name)
}

async fn current_state(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
) -> String {
    let value = state.counter.fetch_add(1, Ordering::SeqCst);
    tracing::debug!(request_id = %request_id, value, "State requested");
    format!("Current state: {}", value)
}

async fn role(State(state): State<AppState>) -> Json<RoleReport> {
    let current = *state.election.borrow();
    Json(RoleReport {
        role: current.role(),
        state: current.as_str(),
        address: state.address.clone(),
    })
}
