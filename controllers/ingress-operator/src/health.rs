//! Health, readiness and metrics endpoints.

use crate::error::OperatorError;
use crate::operator::{EnsureOutcome, Phase};
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use prometheus::{Encoder, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Prometheus metrics exported by the operator.
pub struct Metrics {
    registry: Registry,
    phase: IntGauge,
    cache_synced: IntGaugeVec,
    default_ensure: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let phase = IntGauge::new(
            "ingress_operator_phase",
            "Operator lifecycle phase (0 init, 1 default ensured, 2 caches starting, 3 caches synced, 4 dispatching, 5 stopped, 6 failed)",
        )?;
        let cache_synced = IntGaugeVec::new(
            Opts::new("ingress_operator_cache_synced", "Whether a watch cache completed its initial sync"),
            &["cache"],
        )?;
        let default_ensure = IntCounterVec::new(
            Opts::new(
                "ingress_operator_default_ensure_total",
                "Default ClusterIngress ensure attempts by outcome",
            ),
            &["outcome"],
        )?;

        registry.register(Box::new(phase.clone()))?;
        registry.register(Box::new(cache_synced.clone()))?;
        registry.register(Box::new(default_ensure.clone()))?;

        Ok(Self {
            registry,
            phase,
            cache_synced,
            default_ensure,
        })
    }

    pub fn set_phase(&self, phase: Phase) {
        self.phase.set(phase.code());
    }

    pub fn set_cache_synced(&self, cache: &str, synced: bool) {
        self.cache_synced.with_label_values(&[cache]).set(i64::from(synced));
    }

    pub fn record_ensure(&self, outcome: EnsureOutcome) {
        self.default_ensure.with_label_values(&[outcome.as_str()]).inc();
    }

    /// Renders all metrics in the Prometheus text format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[derive(Clone)]
pub struct HealthState {
    phase: watch::Receiver<Phase>,
    metrics: Arc<Metrics>,
}

impl HealthState {
    pub fn new(phase: watch::Receiver<Phase>, metrics: Arc<Metrics>) -> Self {
        Self { phase, metrics }
    }
}

pub fn router(state: HealthState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

/// Ready only while the dispatcher runs, i.e. after every cache synced.
async fn readyz(State(state): State<HealthState>) -> (StatusCode, String) {
    let phase = *state.phase.borrow();
    if phase == Phase::Dispatching {
        (StatusCode::OK, "ready".to_string())
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, format!("not ready: {phase}"))
    }
}

async fn metrics(State(state): State<HealthState>) -> Result<String, StatusCode> {
    state.metrics.render().map_err(|e| {
        error!(error = %e, "Failed to render metrics");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// Serves the health endpoints until `cancel` fires.
pub async fn serve(addr: SocketAddr, state: HealthState, cancel: CancellationToken) -> Result<(), OperatorError> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Health server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    Ok(())
}
