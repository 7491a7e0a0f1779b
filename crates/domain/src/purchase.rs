//! Purchase record and its status state machine.

use chrono::{DateTime, Utc};
use common::{OrderReference, PurchaseId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::value_objects::{CustomerId, Money, PrintCustomization};

/// The kind of product a purchase covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductType {
    /// Delivered digitally, paid at checkout time.
    Digital,

    /// Physically printed and shipped; payment is deferred until the
    /// fulfiller confirms production.
    Print,
}

impl ProductType {
    /// Returns the product type name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductType::Digital => "Digital",
            ProductType::Print => "Print",
        }
    }
}

impl std::fmt::Display for ProductType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ProductType {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Digital" => Ok(ProductType::Digital),
            "Print" => Ok(ProductType::Print),
            other => Err(DomainError::UnknownProductType {
                value: other.to_string(),
            }),
        }
    }
}

/// The status of a purchase in its lifecycle.
///
/// Status transitions:
/// ```text
/// Creating ──┬──► Pending ──► Completed
///            │       │
///            ├───────┴──► Cancelled
///            └──► Failed
/// ```
///
/// Status only advances; the only regression in the system is on the owning
/// print order (`Charging → Creating` transient-retry), which does not touch
/// the purchase status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PurchaseStatus {
    /// Created at checkout, not yet paid.
    #[default]
    Creating,

    /// Paid, fulfillment confirmed, awaiting delivery.
    Pending,

    /// Fulfillment finished (terminal state).
    Completed,

    /// Cancelled before completion (terminal state).
    Cancelled,

    /// Submission to the fulfiller failed (terminal state).
    Failed,
}

impl PurchaseStatus {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PurchaseStatus::Completed | PurchaseStatus::Cancelled | PurchaseStatus::Failed
        )
    }

    /// Returns true if the documented graph allows moving to `next`.
    pub fn can_transition_to(&self, next: PurchaseStatus) -> bool {
        matches!(
            (self, next),
            (
                PurchaseStatus::Creating,
                PurchaseStatus::Pending
                    | PurchaseStatus::Completed
                    | PurchaseStatus::Cancelled
                    | PurchaseStatus::Failed
            ) | (
                PurchaseStatus::Pending,
                PurchaseStatus::Completed | PurchaseStatus::Cancelled
            )
        )
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::Creating => "Creating",
            PurchaseStatus::Pending => "Pending",
            PurchaseStatus::Completed => "Completed",
            PurchaseStatus::Cancelled => "Cancelled",
            PurchaseStatus::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PurchaseStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Creating" => Ok(PurchaseStatus::Creating),
            "Pending" => Ok(PurchaseStatus::Pending),
            "Completed" => Ok(PurchaseStatus::Completed),
            "Cancelled" => Ok(PurchaseStatus::Cancelled),
            "Failed" => Ok(PurchaseStatus::Failed),
            other => Err(DomainError::UnknownStatus {
                value: other.to_string(),
            }),
        }
    }
}

/// One purchased line item.
///
/// All purchases created in one checkout share an order reference. Purchases
/// are never deleted; they reach a terminal status instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: PurchaseId,
    pub order_reference: OrderReference,
    pub customer_id: CustomerId,
    pub product_type: ProductType,
    pub price: Money,
    pub status: PurchaseStatus,

    /// Opaque id assigned by the payment processor once a charge is made.
    pub payment_reference: Option<String>,

    /// Print customization; present only for print purchases.
    pub customization: Option<PrintCustomization>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Purchase {
    /// Creates a print purchase in `Creating` status.
    pub fn new_print(
        order_reference: OrderReference,
        customer_id: CustomerId,
        price: Money,
        customization: Option<PrintCustomization>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: PurchaseId::new(),
            order_reference,
            customer_id,
            product_type: ProductType::Print,
            price,
            status: PurchaseStatus::Creating,
            payment_reference: None,
            customization,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_status_is_creating() {
        assert_eq!(PurchaseStatus::default(), PurchaseStatus::Creating);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!PurchaseStatus::Creating.is_terminal());
        assert!(!PurchaseStatus::Pending.is_terminal());
        assert!(PurchaseStatus::Completed.is_terminal());
        assert!(PurchaseStatus::Cancelled.is_terminal());
        assert!(PurchaseStatus::Failed.is_terminal());
    }

    #[test]
    fn test_creating_advances_forward_only() {
        assert!(PurchaseStatus::Creating.can_transition_to(PurchaseStatus::Pending));
        assert!(PurchaseStatus::Creating.can_transition_to(PurchaseStatus::Completed));
        assert!(PurchaseStatus::Creating.can_transition_to(PurchaseStatus::Cancelled));
        assert!(PurchaseStatus::Creating.can_transition_to(PurchaseStatus::Failed));
        assert!(!PurchaseStatus::Creating.can_transition_to(PurchaseStatus::Creating));
    }

    #[test]
    fn test_pending_can_complete_or_cancel() {
        assert!(PurchaseStatus::Pending.can_transition_to(PurchaseStatus::Completed));
        assert!(PurchaseStatus::Pending.can_transition_to(PurchaseStatus::Cancelled));
        assert!(!PurchaseStatus::Pending.can_transition_to(PurchaseStatus::Creating));
        assert!(!PurchaseStatus::Pending.can_transition_to(PurchaseStatus::Failed));
    }

    #[test]
    fn test_terminal_states_admit_no_transition() {
        for terminal in [
            PurchaseStatus::Completed,
            PurchaseStatus::Cancelled,
            PurchaseStatus::Failed,
        ] {
            for next in [
                PurchaseStatus::Creating,
                PurchaseStatus::Pending,
                PurchaseStatus::Completed,
                PurchaseStatus::Cancelled,
                PurchaseStatus::Failed,
            ] {
                assert!(!terminal.can_transition_to(next), "{terminal} -> {next}");
            }
        }
    }

    #[test]
    fn test_status_string_roundtrip() {
        for status in [
            PurchaseStatus::Creating,
            PurchaseStatus::Pending,
            PurchaseStatus::Completed,
            PurchaseStatus::Cancelled,
            PurchaseStatus::Failed,
        ] {
            let parsed: PurchaseStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert!("Chilling".parse::<PurchaseStatus>().is_err());
    }

    #[test]
    fn test_new_print_purchase() {
        let reference = OrderReference::new();
        let purchase = Purchase::new_print(
            reference,
            CustomerId::new(),
            Money::from_minor_units(1500),
            Some(PrintCustomization::with_book_size("A5-portrait")),
        );

        assert_eq!(purchase.order_reference, reference);
        assert_eq!(purchase.product_type, ProductType::Print);
        assert_eq!(purchase.status, PurchaseStatus::Creating);
        assert!(purchase.payment_reference.is_none());
    }

    #[test]
    fn test_product_type_string_roundtrip() {
        assert_eq!("Print".parse::<ProductType>().unwrap(), ProductType::Print);
        assert_eq!(
            "Digital".parse::<ProductType>().unwrap(),
            ProductType::Digital
        );
        assert!("Hologram".parse::<ProductType>().is_err());
    }
}
