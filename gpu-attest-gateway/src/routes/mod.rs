use crate::{
    request_id::RequestIdLayer,
    verifier::{AdmissionGate, AttestationTool, VerifierInvoker},
};
use axum::{
    Router,
    extract::State,
    routing::{any, get},
};
use std::{sync::Arc, time::Duration};
use tower::ServiceBuilder;
use tower_http::timeout::{RequestBodyTimeoutLayer, TimeoutLayer};

pub(crate) mod about;
pub(crate) mod attest;
pub(crate) mod health;

pub struct AppState {
    pub verifier: VerifierInvoker,
    pub success_marker: String,
}

impl AppState {
    pub fn new(tool: Arc<dyn AttestationTool>, gate: AdmissionGate, success_marker: String) -> Self {
        Self { verifier: VerifierInvoker::new(tool, gate), success_marker }
    }
}

pub(crate) type SharedState = State<Arc<AppState>>;

/// The deadlines applied to every request.
#[derive(Clone, Copy, Debug)]
pub struct RequestTimeouts {
    /// How long to wait for the request body.
    pub read: Duration,

    /// How long to wait for the response to be produced.
    pub write: Duration,
}

/// Build a router for the entire service.
pub fn build_router(state: Arc<AppState>, timeouts: RequestTimeouts) -> Router {
    Router::new()
        .route("/health", get(health::handler))
        .route("/about", get(about::handler))
        .route("/gpu_attest", any(attest::handler))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(RequestIdLayer)
                .layer(TimeoutLayer::new(timeouts.write))
                .layer(RequestBodyTimeoutLayer::new(timeouts.read)),
        )
}
