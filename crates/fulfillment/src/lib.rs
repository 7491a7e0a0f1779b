//! Deferred-payment print fulfillment.
//!
//! An order is submitted to the external print fulfiller *before* the
//! customer is charged: the card is captured at checkout but the charge
//! fires only when the fulfiller confirms, via webhook, that production has
//! started. That inversion makes webhook handling the critical path:
//! deliveries are at-least-once (duplicated, reordered, concurrent), yet the
//! charge must execute exactly once.
//!
//! The pieces:
//! 1. [`FulfillmentSubmitter`] persists `Creating` records, then submits the
//!    production batch to the fulfiller.
//! 2. [`FulfillmentEvent`] normalizes the two webhook wire shapes.
//! 3. [`StateReconciler`] maps fulfiller stages onto order status and, on
//!    the production-start transition, acquires the `Charging` lock via a
//!    compare-and-swap in the store and drives the charge.
//! 4. The [`PaymentProcessor`] charge is idempotent: its key is the
//!    fulfiller order id, so internal retries collapse to one real charge.
//!
//! On permanent charge failure the batch is cancelled and a compensating
//! cancellation is sent to the fulfiller; on transient failure the lock is
//! released and the fulfiller's next status callback retries.

pub mod error;
pub mod event;
pub mod reconciler;
pub mod services;
pub mod submitter;

pub use error::FulfillmentError;
pub use event::{FulfillmentEvent, FulfillmentStage, ShipmentUpdate};
pub use reconciler::StateReconciler;
pub use services::{
    Address, AssetService, ChargeOutcome, ChargeRequest, DeclineCode, FulfillerClient,
    FulfillmentItem, FulfillmentOrderRequest, InMemoryAssetService, InMemoryFulfiller,
    InMemoryPaymentProcessor, OrderMetadata, PaymentProcessor, PrintAsset, Recipient,
    SubmittedOrder,
};
pub use submitter::{
    FulfillmentSubmitter, SubmissionItem, SubmissionReceipt, SubmissionRequest,
};
