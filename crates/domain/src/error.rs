//! Domain error types.

use thiserror::Error;

/// Errors raised by the domain model.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A stored status value could not be parsed.
    #[error("Unknown status value: {value}")]
    UnknownStatus { value: String },

    /// A stored product type value could not be parsed.
    #[error("Unknown product type: {value}")]
    UnknownProductType { value: String },
}
