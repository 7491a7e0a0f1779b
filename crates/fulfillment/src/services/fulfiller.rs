//! Print fulfiller client trait and in-memory implementation.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::FulfillmentError;
use crate::services::assets::PrintAsset;

/// Shipping destination for one production batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub name: String,
    pub address: Address,
}

/// Postal address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub line1: String,
    pub line2: Option<String>,
    pub town_or_city: String,
    pub postal_or_zip_code: String,
    pub country_code: String,
}

/// One production sub-item, one per purchased line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FulfillmentItem {
    pub sku: String,
    pub copies: u32,
    pub sizing: String,
    pub assets: Vec<PrintAsset>,
}

/// Operational metadata attached to the fulfiller order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderMetadata {
    /// Our internal order reference.
    pub order_reference: String,

    /// Marks the order as charged after production confirmation, for
    /// operational clarity when inspecting fulfiller dashboards.
    pub payment_phase: String,
}

impl OrderMetadata {
    /// Metadata for a deferred-payment order.
    pub fn deferred(order_reference: impl Into<String>) -> Self {
        Self {
            order_reference: order_reference.into(),
            payment_phase: "deferred".to_string(),
        }
    }
}

/// One production request covering a whole checkout batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FulfillmentOrderRequest {
    /// Our order reference, echoed back in webhook payloads.
    pub merchant_reference: String,

    pub shipping_method: String,
    pub recipient: Recipient,
    pub items: Vec<FulfillmentItem>,

    /// Where the fulfiller posts status callbacks.
    pub callback_url: String,

    pub metadata: OrderMetadata,
}

/// Response from a successful order submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedOrder {
    /// The fulfiller's order id; all print orders in the batch share it.
    pub fulfiller_order_id: String,
}

/// Trait for print fulfiller operations.
#[async_trait]
pub trait FulfillerClient: Send + Sync {
    /// Submits one production order for a batch of items.
    async fn submit_order(
        &self,
        request: FulfillmentOrderRequest,
    ) -> Result<SubmittedOrder, FulfillmentError>;

    /// Requests cancellation of a previously submitted order. Best-effort:
    /// the fulfiller may refuse once production has advanced.
    async fn cancel_order(&self, fulfiller_order_id: &str) -> Result<(), FulfillmentError>;
}

#[derive(Debug, Default)]
struct InMemoryFulfillerState {
    submitted: Vec<(String, FulfillmentOrderRequest)>,
    cancelled: Vec<String>,
    next_id: u32,
    fail_on_submit: bool,
    fail_on_cancel: bool,
}

/// In-memory fulfiller for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFulfiller {
    state: Arc<RwLock<InMemoryFulfillerState>>,
}

impl InMemoryFulfiller {
    /// Creates a new in-memory fulfiller.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the fulfiller to reject submissions.
    pub fn set_fail_on_submit(&self, fail: bool) {
        self.state.write().unwrap().fail_on_submit = fail;
    }

    /// Configures the fulfiller to refuse cancellations.
    pub fn set_fail_on_cancel(&self, fail: bool) {
        self.state.write().unwrap().fail_on_cancel = fail;
    }

    /// Returns the number of submitted orders.
    pub fn submitted_count(&self) -> usize {
        self.state.read().unwrap().submitted.len()
    }

    /// Returns the most recently submitted request.
    pub fn last_request(&self) -> Option<FulfillmentOrderRequest> {
        self.state
            .read()
            .unwrap()
            .submitted
            .last()
            .map(|(_, request)| request.clone())
    }

    /// Returns how many cancellation calls were received for the given
    /// fulfiller order id.
    pub fn cancellation_count(&self, fulfiller_order_id: &str) -> usize {
        self.state
            .read()
            .unwrap()
            .cancelled
            .iter()
            .filter(|id| id.as_str() == fulfiller_order_id)
            .count()
    }
}

#[async_trait]
impl FulfillerClient for InMemoryFulfiller {
    async fn submit_order(
        &self,
        request: FulfillmentOrderRequest,
    ) -> Result<SubmittedOrder, FulfillmentError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_submit {
            return Err(FulfillmentError::Fulfiller(
                "order submission rejected".to_string(),
            ));
        }

        state.next_id += 1;
        let fulfiller_order_id = format!("PD-{:04}", state.next_id);
        state.submitted.push((fulfiller_order_id.clone(), request));

        Ok(SubmittedOrder { fulfiller_order_id })
    }

    async fn cancel_order(&self, fulfiller_order_id: &str) -> Result<(), FulfillmentError> {
        let mut state = self.state.write().unwrap();

        // Record the attempt before deciding the outcome: compensation is
        // best-effort, and tests assert the call happened.
        state.cancelled.push(fulfiller_order_id.to_string());

        if state.fail_on_cancel {
            return Err(FulfillmentError::Fulfiller(
                "order can no longer be cancelled".to_string(),
            ));
        }

        Ok(())
    }
}
