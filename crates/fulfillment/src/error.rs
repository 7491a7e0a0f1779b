//! Fulfillment error types.

use common::PurchaseId;
use order_store::StoreError;
use thiserror::Error;

/// Errors that can occur during fulfillment operations.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    /// A submission was attempted with no line items.
    #[error("Submission contains no items")]
    EmptySubmission,

    /// Print asset preparation failed for a line item.
    #[error("Asset preparation failed for sku '{sku}': {reason}")]
    AssetPreparation { sku: String, reason: String },

    /// The fulfiller rejected or failed a request.
    #[error("Fulfiller error: {0}")]
    Fulfiller(String),

    /// A purchase referenced by a print order is missing from the store.
    #[error("Purchase not found: {0}")]
    PurchaseNotFound(PurchaseId),

    /// Order store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Convenience type alias for fulfillment results.
pub type Result<T> = std::result::Result<T, FulfillmentError>;
