//! Health and metrics HTTP server.
//!
//! - `/healthz`: process is alive
//! - `/readyz`: the ServiceExposure watcher has started
//! - `/metrics`: prometheus text exposition

use crate::error::ControllerError;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Outcome label of a reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Every endpoint exposed
    Complete,
    /// Still converging, requeued
    Requeue,
    /// Failed, handed to the error policy
    Error,
}

impl ReconcileOutcome {
    fn as_str(self) -> &'static str {
        match self {
            ReconcileOutcome::Complete => "complete",
            ReconcileOutcome::Requeue => "requeue",
            ReconcileOutcome::Error => "error",
        }
    }
}

/// Controller metrics and readiness, shared between the reconciler and the server.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    reconciliations: IntCounterVec,
    ready: Arc<AtomicBool>,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("ready", &self.is_ready())
            .finish_non_exhaustive()
    }
}

impl Metrics {
    /// Create and register the controller metrics
    pub fn new() -> Result<Self, ControllerError> {
        let registry = Registry::new();
        let reconciliations = IntCounterVec::new(
            Opts::new(
                "exposure_reconciliations_total",
                "ServiceExposure reconciliations by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(reconciliations.clone()))?;

        Ok(Self {
            registry,
            reconciliations,
            ready: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Count one reconciliation
    pub fn record(&self, outcome: ReconcileOutcome) {
        self.reconciliations.with_label_values(&[outcome.as_str()]).inc();
    }

    /// Reconciliations counted for an outcome
    #[must_use]
    pub fn count(&self, outcome: ReconcileOutcome) -> u64 {
        self.reconciliations.with_label_values(&[outcome.as_str()]).get()
    }

    /// Mark the controller ready to serve
    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    /// Whether `/readyz` reports ready
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Metrics in prometheus text format
    pub fn encode(&self) -> Result<String, ControllerError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

/// Router serving the health and metrics endpoints
pub fn router(metrics: Metrics) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(metrics)
}

/// Serve health checks and metrics until the process exits
pub async fn serve(addr: SocketAddr, metrics: Metrics) -> Result<(), ControllerError> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Health and metrics server listening on {}", addr);
    axum::serve(listener, router(metrics)).await?;
    Ok(())
}

async fn readyz(State(metrics): State<Metrics>) -> impl IntoResponse {
    if metrics.is_ready() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "starting")
    }
}

async fn metrics_handler(State(metrics): State<Metrics>) -> Response {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
