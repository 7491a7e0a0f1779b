//! The state reconciler: maps fulfiller stage callbacks onto purchase and
//! print-order status, and drives the deferred charge on the
//! production-start transition.
//!
//! Webhook deliveries are at-least-once and may arrive concurrently for the
//! same fulfiller order. Two mechanisms keep the charge exactly-once:
//! - the `Creating → Charging` compare-and-swap in the store serializes
//!   concurrent handlers; a handler that loses the swap skips charging
//! - the charge's idempotency key is the fulfiller order id, so any attempt
//!   that slips past the lock (crash recovery, a split batch) collapses to
//!   one real charge at the processor

use domain::{Money, PrintOrder, PrintOrderStatus, Purchase, PurchaseStatus};
use order_store::OrderStore;

use crate::error::{FulfillmentError, Result};
use crate::event::{FulfillmentEvent, FulfillmentStage};
use crate::services::fulfiller::FulfillerClient;
use crate::services::payment::{ChargeOutcome, ChargeRequest, PaymentProcessor};

/// Reconciles fulfiller status callbacks with the order store.
pub struct StateReconciler<S, F, P>
where
    S: OrderStore,
    F: FulfillerClient,
    P: PaymentProcessor,
{
    store: S,
    fulfiller: F,
    payment: P,
    currency: String,
}

impl<S, F, P> StateReconciler<S, F, P>
where
    S: OrderStore,
    F: FulfillerClient,
    P: PaymentProcessor,
{
    /// Creates a new reconciler charging in the given currency.
    pub fn new(store: S, fulfiller: F, payment: P, currency: impl Into<String>) -> Self {
        Self {
            store,
            fulfiller,
            payment,
            currency: currency.into(),
        }
    }

    /// Processes one normalized webhook event.
    ///
    /// Tracking fields and the raw payload are recorded on every print
    /// order in the batch unconditionally; status mapping and the charge
    /// trigger follow from the stage. An event for an unknown fulfiller
    /// order is logged and acknowledged, not an error: webhook delivery
    /// order relative to submission is not guaranteed.
    #[tracing::instrument(
        skip(self, event),
        fields(fulfiller_order_id = %event.fulfiller_order_id, stage = %event.stage)
    )]
    pub async fn handle_event(&self, event: FulfillmentEvent) -> Result<()> {
        metrics::counter!("fulfillment_webhooks_total").increment(1);

        let orders = self
            .store
            .print_orders_by_fulfiller(&event.fulfiller_order_id)
            .await?;

        if orders.is_empty() {
            tracing::warn!(
                merchant_reference = event.merchant_reference.as_deref().unwrap_or(""),
                "webhook for unknown fulfiller order"
            );
            metrics::counter!("fulfillment_webhooks_orphaned").increment(1);
            return Ok(());
        }

        let tracking = event.tracking_update();
        for order in &orders {
            self.store
                .record_webhook(order.id, &tracking, &event.payload)
                .await?;
        }

        match &event.stage {
            FulfillmentStage::InProgress => self.charge_batch(&orders, &event).await,
            FulfillmentStage::Complete => self.complete_batch(&orders, &event).await,
            FulfillmentStage::Cancelled => self.cancel_batch(&orders, &event).await,
            FulfillmentStage::Other(stage) => {
                tracing::debug!(%stage, "stage has no status mapping, tracking recorded");
                Ok(())
            }
        }
    }

    /// The charge trigger: production has started, which is the point of no
    /// return, so the deferred charge fires now.
    async fn charge_batch(&self, orders: &[PrintOrder], event: &FulfillmentEvent) -> Result<()> {
        let mut locked: Vec<&PrintOrder> = Vec::new();

        for order in orders {
            match order.status {
                PrintOrderStatus::Creating => {
                    // The lock: a conditional swap against the durable
                    // record. Losing it means another delivery owns the
                    // charge attempt for this order.
                    if self
                        .store
                        .transition_print_order(
                            order.id,
                            PrintOrderStatus::Creating,
                            PrintOrderStatus::Charging,
                        )
                        .await?
                    {
                        locked.push(order);
                    } else {
                        tracing::debug!(print_order_id = %order.id, "charge lock held elsewhere");
                    }
                }
                PrintOrderStatus::Charging => {
                    // A previous attempt was interrupted between acquiring
                    // the lock and reaching a terminal status. Include it:
                    // the idempotency key makes the retry safe.
                    tracing::warn!(
                        print_order_id = %order.id,
                        "print order stuck in Charging, retrying interrupted charge"
                    );
                    locked.push(order);
                }
                PrintOrderStatus::Pending
                | PrintOrderStatus::Cancelled
                | PrintOrderStatus::Failed => {}
            }
        }

        if locked.is_empty() {
            tracing::debug!("no print orders eligible for charging");
            return Ok(());
        }

        // One combined charge for the batch: sum of every line item price,
        // deduplicated at the processor by the fulfiller order id.
        let purchases = self.load_purchases(orders).await?;
        let amount: Money = purchases.iter().map(|p| p.price).sum();
        let payment_method = locked[0].payment_method_reference.clone();

        metrics::counter!("fulfillment_charge_attempts").increment(1);
        let outcome = self
            .payment
            .charge(ChargeRequest {
                amount,
                currency: self.currency.clone(),
                payment_method,
                idempotency_key: event.fulfiller_order_id.clone(),
            })
            .await;

        match outcome {
            ChargeOutcome::Succeeded { payment_reference } => {
                for order in &locked {
                    if self
                        .store
                        .transition_print_order(
                            order.id,
                            PrintOrderStatus::Charging,
                            PrintOrderStatus::Pending,
                        )
                        .await?
                    {
                        self.store
                            .set_purchase_payment_reference(order.purchase_id, &payment_reference)
                            .await?;
                        self.store
                            .set_purchase_status(order.purchase_id, PurchaseStatus::Pending)
                            .await?;
                    }
                }
                metrics::counter!("fulfillment_charges_succeeded").increment(1);
                tracing::info!(
                    %payment_reference,
                    amount = amount.minor_units(),
                    orders = locked.len(),
                    "deferred charge succeeded"
                );
                Ok(())
            }
            ChargeOutcome::PermanentlyFailed(code) => {
                metrics::counter!("fulfillment_charges_declined").increment(1);
                tracing::warn!(
                    decline = %code,
                    orders = locked.len(),
                    "charge permanently declined, cancelling batch"
                );

                for order in &locked {
                    self.store
                        .set_print_order_status(
                            order.id,
                            PrintOrderStatus::Cancelled,
                            Some(&format!("charge declined: {code}")),
                        )
                        .await?;
                    self.store
                        .set_purchase_status(order.purchase_id, PurchaseStatus::Cancelled)
                        .await?;
                }

                // Compensating cancellation, best-effort and exactly one
                // call: the batch is already cancelled internally.
                if let Err(error) = self
                    .fulfiller
                    .cancel_order(&event.fulfiller_order_id)
                    .await
                {
                    tracing::warn!(%error, "fulfiller cancellation failed after declined charge");
                }
                Ok(())
            }
            ChargeOutcome::TransientlyFailed(reason) => {
                metrics::counter!("fulfillment_charges_transient_failures").increment(1);
                tracing::warn!(
                    %reason,
                    orders = locked.len(),
                    "transient charge failure, releasing lock for webhook retry"
                );

                // Release the lock; the fulfiller repeats status callbacks
                // on a schedule and the next delivery retries the charge.
                // There is no timer-driven re-poll fallback, so an order
                // stuck in Creating after the last callback needs manual
                // intervention.
                for order in &locked {
                    self.store
                        .transition_print_order(
                            order.id,
                            PrintOrderStatus::Charging,
                            PrintOrderStatus::Creating,
                        )
                        .await?;
                }
                Ok(())
            }
        }
    }

    /// Terminal "complete" stage: production and shipping finished.
    async fn complete_batch(&self, orders: &[PrintOrder], event: &FulfillmentEvent) -> Result<()> {
        for order in orders {
            match order.status {
                PrintOrderStatus::Pending => {
                    self.store
                        .set_purchase_status(order.purchase_id, PurchaseStatus::Completed)
                        .await?;
                }
                PrintOrderStatus::Creating | PrintOrderStatus::Charging => {
                    // Production completed without the charge ever landing:
                    // the InProgress callback was lost or never retried.
                    // Flag for manual reconciliation rather than completing
                    // an unpaid purchase.
                    tracing::error!(
                        print_order_id = %order.id,
                        purchase_id = %order.purchase_id,
                        fulfiller_order_id = %event.fulfiller_order_id,
                        status = %order.status,
                        "completion reported for uncharged print order"
                    );
                    metrics::counter!("fulfillment_uncharged_completions").increment(1);
                }
                PrintOrderStatus::Cancelled | PrintOrderStatus::Failed => {}
            }
        }
        Ok(())
    }

    /// Terminal "cancelled" stage reported by the fulfiller.
    async fn cancel_batch(&self, orders: &[PrintOrder], event: &FulfillmentEvent) -> Result<()> {
        for order in orders {
            if order.status.is_terminal() {
                continue;
            }

            if self
                .store
                .transition_print_order(order.id, order.status, PrintOrderStatus::Cancelled)
                .await?
            {
                self.store
                    .set_purchase_status(order.purchase_id, PurchaseStatus::Cancelled)
                    .await?;
            } else {
                // Lost to a concurrent transition; the next callback for
                // this batch reconciles the remainder.
                tracing::debug!(
                    print_order_id = %order.id,
                    fulfiller_order_id = %event.fulfiller_order_id,
                    "cancellation skipped, status moved concurrently"
                );
            }
        }

        tracing::info!("fulfiller cancelled order batch");
        Ok(())
    }

    async fn load_purchases(&self, orders: &[PrintOrder]) -> Result<Vec<Purchase>> {
        let mut purchases = Vec::with_capacity(orders.len());
        for order in orders {
            let purchase = self
                .store
                .get_purchase(order.purchase_id)
                .await?
                .ok_or(FulfillmentError::PurchaseNotFound(order.purchase_id))?;
            purchases.push(purchase);
        }
        Ok(purchases)
    }
}
