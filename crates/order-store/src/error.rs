use common::{PrintOrderId, PurchaseId};
use thiserror::Error;

/// Errors that can occur when interacting with the order store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The purchase was not found in the store.
    #[error("Purchase not found: {0}")]
    PurchaseNotFound(PurchaseId),

    /// The print order was not found in the store.
    #[error("Print order not found: {0}")]
    PrintOrderNotFound(PrintOrderId),

    /// A stored value could not be mapped back into the domain model.
    #[error("Domain error: {0}")]
    Domain(#[from] domain::DomainError),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for order store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
