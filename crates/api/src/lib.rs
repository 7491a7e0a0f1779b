//! HTTP API server for the deferred-payment print-fulfillment service.
//!
//! Provides the checkout submission endpoint, the fulfiller webhook
//! capability URL, and order-history queries, with structured logging
//! (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use fulfillment::{
    FulfillmentSubmitter, InMemoryAssetService, InMemoryFulfiller, InMemoryPaymentProcessor,
    StateReconciler,
};
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::OrderStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: OrderStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::submit::<S>))
        .route("/orders/{reference}", get(routes::orders::get::<S>))
        .route("/customers/{id}/orders", get(routes::orders::history::<S>))
        .route(
            "/webhooks/fulfillment/{token}",
            post(routes::webhooks::receive::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates application state wired to in-memory collaborator services.
///
/// The fulfiller and payment processor handles are returned alongside the
/// state so callers (tests, local runs) can script their behavior.
pub fn create_default_state<S: OrderStore + Clone + 'static>(
    store: S,
    config: &Config,
) -> (Arc<AppState<S>>, InMemoryFulfiller, InMemoryPaymentProcessor) {
    let fulfiller = InMemoryFulfiller::new();
    let payment = InMemoryPaymentProcessor::new();
    let assets = InMemoryAssetService::new();

    let submitter = FulfillmentSubmitter::new(
        store.clone(),
        fulfiller.clone(),
        assets,
        config.callback_url(),
    );
    let reconciler = StateReconciler::new(store.clone(), fulfiller.clone(), payment.clone(), "usd");

    let state = Arc::new(AppState {
        store,
        submitter,
        reconciler,
        webhook_secret: config.webhook_secret.clone(),
    });

    (state, fulfiller, payment)
}
