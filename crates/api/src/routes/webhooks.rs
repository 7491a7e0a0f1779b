//! Fulfiller webhook ingestion endpoint.
//!
//! The endpoint is a capability URL: the path carries a secret token, and a
//! mismatch answers 404 as if the route did not exist. Once the token
//! matches, the response is always `200 {"received": true}` — parse and
//! reconciliation failures are logged for operational follow-up instead of
//! surfaced, because an error status would put the sender into a retry
//! storm while the customer-facing checkout has long since completed.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fulfillment::FulfillmentEvent;
use order_store::OrderStore;
use serde::Serialize;

use crate::routes::orders::AppState;

#[derive(Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

fn ack() -> Response {
    (StatusCode::OK, Json(WebhookAck { received: true })).into_response()
}

/// POST /webhooks/fulfillment/:token — ingest a fulfiller status callback.
#[tracing::instrument(skip(state, token, body))]
pub async fn receive<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(token): Path<String>,
    body: String,
) -> Response {
    if token != state.webhook_secret {
        metrics::counter!("fulfillment_webhooks_rejected").increment(1);
        return StatusCode::NOT_FOUND.into_response();
    }

    let payload: serde_json::Value = match serde_json::from_str(&body) {
        Ok(payload) => payload,
        Err(error) => {
            tracing::warn!(%error, "webhook body is not valid JSON");
            return ack();
        }
    };

    let event = match FulfillmentEvent::from_payload(payload) {
        Ok(event) => event,
        Err(error) => {
            tracing::warn!(%error, "webhook payload did not match a known wire shape");
            return ack();
        }
    };

    if let Err(error) = state.reconciler.handle_event(event).await {
        // Acknowledged anyway: reconciliation failures are an operational
        // concern, not the sender's.
        tracing::error!(%error, "webhook reconciliation failed");
    }

    ack()
}
