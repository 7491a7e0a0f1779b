//! Shared identifier types used across the print-fulfillment crates.

pub mod types;

pub use types::{OrderReference, PrintOrderId, PurchaseId};
