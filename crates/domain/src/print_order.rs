//! Print order record and its status state machine.

use chrono::{DateTime, Utc};
use common::{PrintOrderId, PurchaseId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::value_objects::TrackingInfo;

/// The status of a print order in its lifecycle.
///
/// Status transitions:
/// ```text
/// Creating ──► Charging ──┬──► Pending      (charged, in production)
///     ▲           │       ├──► Cancelled    (permanent charge failure,
///     │           │       │                  or fulfiller cancellation)
///     └───────────┘       │
///   (transient charge     │
///    failure, retried on  │
///    the next webhook)    │
/// Creating ───────────────┴──► Cancelled | Failed
/// ```
///
/// `Charging` is a transient lock state: it marks the one handler that owns
/// the deferred charge attempt for this order. It is never a state the
/// system knowingly leaves a record in for long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PrintOrderStatus {
    /// Created at checkout, waiting for the fulfiller to confirm production.
    #[default]
    Creating,

    /// Production confirmed; the deferred charge is in flight.
    Charging,

    /// Charged and in production, awaiting physical delivery (terminal).
    Pending,

    /// Cancelled, by charge failure or by the fulfiller (terminal).
    Cancelled,

    /// Submission to the fulfiller failed; never charged (terminal).
    Failed,
}

impl PrintOrderStatus {
    /// Returns true if the deferred charge may be started from this state
    /// by acquiring the `Charging` lock.
    pub fn can_begin_charge(&self) -> bool {
        matches!(self, PrintOrderStatus::Creating)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PrintOrderStatus::Pending | PrintOrderStatus::Cancelled | PrintOrderStatus::Failed
        )
    }

    /// Returns true if the documented graph allows moving to `next`.
    ///
    /// `Charging → Creating` is the one sanctioned regression: it releases
    /// the charge lock after a transient payment failure so the next webhook
    /// delivery retries.
    pub fn can_transition_to(&self, next: PrintOrderStatus) -> bool {
        matches!(
            (self, next),
            (
                PrintOrderStatus::Creating,
                PrintOrderStatus::Charging | PrintOrderStatus::Cancelled | PrintOrderStatus::Failed
            ) | (
                PrintOrderStatus::Charging,
                PrintOrderStatus::Pending
                    | PrintOrderStatus::Creating
                    | PrintOrderStatus::Cancelled
            )
        )
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PrintOrderStatus::Creating => "Creating",
            PrintOrderStatus::Charging => "Charging",
            PrintOrderStatus::Pending => "Pending",
            PrintOrderStatus::Cancelled => "Cancelled",
            PrintOrderStatus::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for PrintOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PrintOrderStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Creating" => Ok(PrintOrderStatus::Creating),
            "Charging" => Ok(PrintOrderStatus::Charging),
            "Pending" => Ok(PrintOrderStatus::Pending),
            "Cancelled" => Ok(PrintOrderStatus::Cancelled),
            "Failed" => Ok(PrintOrderStatus::Failed),
            other => Err(DomainError::UnknownStatus {
                value: other.to_string(),
            }),
        }
    }
}

/// The fulfiller-facing production record for one print purchase.
///
/// Several print orders submitted as one batch share one fulfiller order id;
/// the batch moves through the state machine together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintOrder {
    pub id: PrintOrderId,
    pub purchase_id: PurchaseId,

    /// Id assigned by the fulfiller; None until submission succeeds.
    /// Non-unique: every print order in a batch carries the same value.
    pub fulfiller_order_id: Option<String>,

    pub status: PrintOrderStatus,

    /// Opaque handle to the customer's captured-but-uncharged payment
    /// instrument. Required before any charge attempt.
    pub payment_method_reference: String,

    /// Shipment tracking, merged opportunistically from webhooks.
    pub tracking: TrackingInfo,

    /// Raw last-seen webhook status payload, retained for diagnosis.
    pub last_webhook_payload: Option<serde_json::Value>,

    pub error_message: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PrintOrder {
    /// Creates a print order in `Creating` status for the given purchase.
    pub fn new(purchase_id: PurchaseId, payment_method_reference: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: PrintOrderId::new(),
            purchase_id,
            fulfiller_order_id: None,
            status: PrintOrderStatus::Creating,
            payment_method_reference: payment_method_reference.into(),
            tracking: TrackingInfo::default(),
            last_webhook_payload: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }
}
