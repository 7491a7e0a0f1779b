//! Webhook payload normalization.
//!
//! The fulfiller posts status callbacks in two wire shapes: a versioned
//! event envelope (`{specversion, type, data: {order: {...}}}`) and a bare
//! order status object (`{id, status: {stage, ...}, shipments, ...}`). Both
//! normalize into one [`FulfillmentEvent`] before reconciliation.

use chrono::{DateTime, Utc};
use domain::TrackingInfo;
use serde::Deserialize;
use thiserror::Error;

/// Error raised when a webhook payload cannot be normalized.
#[derive(Debug, Error)]
pub enum EventParseError {
    /// The payload did not match either known wire shape.
    #[error("Unrecognized webhook payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// The fulfiller's production stage vocabulary, normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FulfillmentStage {
    /// Production has started: the point of no return, and the trigger for
    /// the deferred charge.
    InProgress,

    /// Production and shipping finished.
    Complete,

    /// The fulfiller cancelled the order.
    Cancelled,

    /// A stage with no status mapping; tracking updates still apply.
    Other(String),
}

impl FulfillmentStage {
    fn from_wire(stage: &str) -> Self {
        match stage {
            "InProgress" => FulfillmentStage::InProgress,
            "Complete" => FulfillmentStage::Complete,
            "Cancelled" => FulfillmentStage::Cancelled,
            other => FulfillmentStage::Other(other.to_string()),
        }
    }

    /// Returns the stage name as a string.
    pub fn as_str(&self) -> &str {
        match self {
            FulfillmentStage::InProgress => "InProgress",
            FulfillmentStage::Complete => "Complete",
            FulfillmentStage::Cancelled => "Cancelled",
            FulfillmentStage::Other(stage) => stage,
        }
    }
}

impl std::fmt::Display for FulfillmentStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One shipment entry from a webhook payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShipmentUpdate {
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub tracking_url: Option<String>,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

/// A normalized fulfiller status callback.
#[derive(Debug, Clone)]
pub struct FulfillmentEvent {
    /// The fulfiller's order id; keys the print-order batch.
    pub fulfiller_order_id: String,

    pub stage: FulfillmentStage,

    pub shipments: Vec<ShipmentUpdate>,

    /// Our order reference, echoed back by the fulfiller.
    pub merchant_reference: Option<String>,

    /// The raw payload, kept verbatim for diagnosis.
    pub payload: serde_json::Value,
}

// -- Wire shapes --

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireOrder {
    id: String,
    status: WireStatus,
    #[serde(default)]
    shipments: Vec<WireShipment>,
    merchant_reference: Option<String>,
}

#[derive(Deserialize)]
struct WireStatus {
    stage: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireShipment {
    carrier: Option<WireCarrier>,
    tracking: Option<WireTracking>,
    dispatch_date: Option<DateTime<Utc>>,
    delivered_date: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct WireCarrier {
    name: Option<String>,
}

#[derive(Deserialize)]
struct WireTracking {
    number: Option<String>,
    url: Option<String>,
}

impl FulfillmentEvent {
    /// Normalizes a webhook payload in either wire shape.
    pub fn from_payload(payload: serde_json::Value) -> Result<Self, EventParseError> {
        // Envelope shape carries the order object under data.order; the
        // bare shape *is* the order object.
        let order_value = payload
            .get("data")
            .and_then(|data| data.get("order"))
            .unwrap_or(&payload)
            .clone();

        let wire: WireOrder = serde_json::from_value(order_value)?;

        let shipments = wire
            .shipments
            .into_iter()
            .map(|shipment| ShipmentUpdate {
                carrier: shipment.carrier.and_then(|c| c.name),
                tracking_number: shipment.tracking.as_ref().and_then(|t| t.number.clone()),
                tracking_url: shipment.tracking.as_ref().and_then(|t| t.url.clone()),
                dispatched_at: shipment.dispatch_date,
                delivered_at: shipment.delivered_date,
            })
            .collect();

        Ok(Self {
            fulfiller_order_id: wire.id,
            stage: FulfillmentStage::from_wire(&wire.status.stage),
            shipments,
            merchant_reference: wire.merchant_reference,
            payload,
        })
    }

    /// Folds all shipment entries into one tracking update.
    ///
    /// Later shipments win field-by-field, matching the merge the store
    /// applies; an event with no shipments yields an empty update.
    pub fn tracking_update(&self) -> TrackingInfo {
        let mut tracking = TrackingInfo::default();
        for shipment in &self.shipments {
            tracking.merge_from(&TrackingInfo {
                carrier: shipment.carrier.clone(),
                tracking_number: shipment.tracking_number.clone(),
                tracking_url: shipment.tracking_url.clone(),
                dispatched_at: shipment.dispatched_at,
                delivered_at: shipment.delivered_at,
            });
        }
        tracking
    }
}
