use async_trait::async_trait;
use common::{OrderReference, PrintOrderId, PurchaseId};
use domain::{CustomerId, PrintOrder, PrintOrderStatus, Purchase, PurchaseStatus, TrackingInfo};

use crate::Result;

/// Core trait for purchase/print-order store implementations.
///
/// All implementations must be thread-safe (`Send + Sync`) and must make
/// `transition_print_order` atomic with respect to concurrent callers: it is
/// the lock that serializes the deferred charge across webhook handlers and
/// process instances.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists a new purchase.
    async fn create_purchase(&self, purchase: Purchase) -> Result<()>;

    /// Persists a new print order.
    async fn create_print_order(&self, print_order: PrintOrder) -> Result<()>;

    /// Retrieves a purchase by ID.
    async fn get_purchase(&self, id: PurchaseId) -> Result<Option<Purchase>>;

    /// Retrieves a print order by ID.
    async fn get_print_order(&self, id: PrintOrderId) -> Result<Option<PrintOrder>>;

    /// Retrieves all purchases created in one checkout.
    async fn purchases_by_reference(&self, reference: OrderReference) -> Result<Vec<Purchase>>;

    /// Retrieves all purchases owned by a customer, for order-history
    /// display. Newest first.
    async fn purchases_by_customer(&self, customer_id: CustomerId) -> Result<Vec<Purchase>>;

    /// Retrieves all print orders created in one checkout.
    async fn print_orders_by_reference(&self, reference: OrderReference)
    -> Result<Vec<PrintOrder>>;

    /// Retrieves every print order sharing a fulfiller order id.
    ///
    /// The fulfiller order id is a non-unique key: a batch submitted in one
    /// fulfiller call yields one print order per line item, all carrying the
    /// same id. An unknown id returns an empty vec, not an error.
    async fn print_orders_by_fulfiller(&self, fulfiller_order_id: &str) -> Result<Vec<PrintOrder>>;

    /// Attaches the fulfiller's order id to every listed print order after a
    /// successful submission.
    async fn assign_fulfiller_order_id(
        &self,
        ids: &[PrintOrderId],
        fulfiller_order_id: &str,
    ) -> Result<()>;

    /// Atomically moves a print order from `expected` to `next`.
    ///
    /// Returns `true` if the transition was applied. `false` means the
    /// record was not in `expected` status at the instant of the update —
    /// for the `Creating → Charging` edge that means another handler owns
    /// the charge attempt, and the caller must not charge this order.
    async fn transition_print_order(
        &self,
        id: PrintOrderId,
        expected: PrintOrderStatus,
        next: PrintOrderStatus,
    ) -> Result<bool>;

    /// Sets a print order's status unconditionally, with an optional error
    /// message. Used for submission failures, where no concurrent handler
    /// can be racing yet.
    async fn set_print_order_status(
        &self,
        id: PrintOrderId,
        status: PrintOrderStatus,
        error_message: Option<&str>,
    ) -> Result<()>;

    /// Merges tracking fields and records the raw webhook payload on a
    /// print order. This update is applied on every webhook delivery,
    /// regardless of status and regardless of whether a charge is in
    /// flight.
    async fn record_webhook(
        &self,
        id: PrintOrderId,
        tracking: &TrackingInfo,
        payload: &serde_json::Value,
    ) -> Result<()>;

    /// Sets a purchase's status.
    async fn set_purchase_status(&self, id: PurchaseId, status: PurchaseStatus) -> Result<()>;

    /// Records the payment processor's reference on a purchase after a
    /// successful charge.
    async fn set_purchase_payment_reference(
        &self,
        id: PurchaseId,
        payment_reference: &str,
    ) -> Result<()>;
}
