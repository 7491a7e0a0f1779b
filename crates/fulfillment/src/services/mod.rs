//! External collaborator traits and in-memory implementations.
//!
//! The print fulfiller, payment processor, and asset renderer are opaque
//! services; the core depends only on the interface it needs from each.

pub mod assets;
pub mod fulfiller;
pub mod payment;

pub use assets::{AssetService, InMemoryAssetService, PrintAsset};
pub use fulfiller::{
    Address, FulfillerClient, FulfillmentItem, FulfillmentOrderRequest, InMemoryFulfiller,
    OrderMetadata, Recipient, SubmittedOrder,
};
pub use payment::{
    ChargeOutcome, ChargeRequest, DeclineCode, InMemoryPaymentProcessor, PaymentProcessor,
};
