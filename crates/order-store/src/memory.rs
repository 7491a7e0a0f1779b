use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{OrderReference, PrintOrderId, PurchaseId};
use domain::{CustomerId, PrintOrder, PrintOrderStatus, Purchase, PurchaseStatus, TrackingInfo};
use tokio::sync::RwLock;

use crate::{Result, StoreError, store::OrderStore};

#[derive(Default)]
struct Inner {
    purchases: HashMap<PurchaseId, Purchase>,
    print_orders: HashMap<PrintOrderId, PrintOrder>,
}

/// In-memory order store implementation for testing and local runs.
///
/// All records live behind one `RwLock`, so `transition_print_order` is a
/// genuine compare-and-swap: the status check and the write happen under a
/// single write-lock acquisition, same as the conditional `UPDATE` in the
/// PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryOrderStore {
    /// Creates a new empty in-memory order store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of purchases stored.
    pub async fn purchase_count(&self) -> usize {
        self.inner.read().await.purchases.len()
    }

    /// Returns the total number of print orders stored.
    pub async fn print_order_count(&self) -> usize {
        self.inner.read().await.print_orders.len()
    }

    /// Returns every stored purchase, for test assertions.
    pub async fn all_purchases(&self) -> Vec<Purchase> {
        self.inner.read().await.purchases.values().cloned().collect()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create_purchase(&self, purchase: Purchase) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.purchases.insert(purchase.id, purchase);
        Ok(())
    }

    async fn create_print_order(&self, print_order: PrintOrder) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.print_orders.insert(print_order.id, print_order);
        Ok(())
    }

    async fn get_purchase(&self, id: PurchaseId) -> Result<Option<Purchase>> {
        Ok(self.inner.read().await.purchases.get(&id).cloned())
    }

    async fn get_print_order(&self, id: PrintOrderId) -> Result<Option<PrintOrder>> {
        Ok(self.inner.read().await.print_orders.get(&id).cloned())
    }

    async fn purchases_by_reference(&self, reference: OrderReference) -> Result<Vec<Purchase>> {
        let inner = self.inner.read().await;
        let mut purchases: Vec<_> = inner
            .purchases
            .values()
            .filter(|p| p.order_reference == reference)
            .cloned()
            .collect();
        purchases.sort_by_key(|p| p.created_at);
        Ok(purchases)
    }

    async fn purchases_by_customer(&self, customer_id: CustomerId) -> Result<Vec<Purchase>> {
        let inner = self.inner.read().await;
        let mut purchases: Vec<_> = inner
            .purchases
            .values()
            .filter(|p| p.customer_id == customer_id)
            .cloned()
            .collect();
        purchases.sort_by_key(|p| std::cmp::Reverse(p.created_at));
        Ok(purchases)
    }

    async fn print_orders_by_reference(
        &self,
        reference: OrderReference,
    ) -> Result<Vec<PrintOrder>> {
        let inner = self.inner.read().await;
        let purchase_ids: Vec<PurchaseId> = inner
            .purchases
            .values()
            .filter(|p| p.order_reference == reference)
            .map(|p| p.id)
            .collect();
        let mut orders: Vec<_> = inner
            .print_orders
            .values()
            .filter(|o| purchase_ids.contains(&o.purchase_id))
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.created_at);
        Ok(orders)
    }

    async fn print_orders_by_fulfiller(&self, fulfiller_order_id: &str) -> Result<Vec<PrintOrder>> {
        let inner = self.inner.read().await;
        let mut orders: Vec<_> = inner
            .print_orders
            .values()
            .filter(|o| o.fulfiller_order_id.as_deref() == Some(fulfiller_order_id))
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.created_at);
        Ok(orders)
    }

    async fn assign_fulfiller_order_id(
        &self,
        ids: &[PrintOrderId],
        fulfiller_order_id: &str,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        for id in ids {
            let order = inner
                .print_orders
                .get_mut(id)
                .ok_or(StoreError::PrintOrderNotFound(*id))?;
            order.fulfiller_order_id = Some(fulfiller_order_id.to_string());
            order.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn transition_print_order(
        &self,
        id: PrintOrderId,
        expected: PrintOrderStatus,
        next: PrintOrderStatus,
    ) -> Result<bool> {
        // Check and write under one write-lock acquisition.
        let mut inner = self.inner.write().await;
        let order = inner
            .print_orders
            .get_mut(&id)
            .ok_or(StoreError::PrintOrderNotFound(id))?;

        if order.status != expected {
            return Ok(false);
        }

        order.status = next;
        order.updated_at = Utc::now();
        Ok(true)
    }

    async fn set_print_order_status(
        &self,
        id: PrintOrderId,
        status: PrintOrderStatus,
        error_message: Option<&str>,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let order = inner
            .print_orders
            .get_mut(&id)
            .ok_or(StoreError::PrintOrderNotFound(id))?;
        order.status = status;
        if let Some(message) = error_message {
            order.error_message = Some(message.to_string());
        }
        order.updated_at = Utc::now();
        Ok(())
    }

    async fn record_webhook(
        &self,
        id: PrintOrderId,
        tracking: &TrackingInfo,
        payload: &serde_json::Value,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let order = inner
            .print_orders
            .get_mut(&id)
            .ok_or(StoreError::PrintOrderNotFound(id))?;
        order.tracking.merge_from(tracking);
        order.last_webhook_payload = Some(payload.clone());
        order.updated_at = Utc::now();
        Ok(())
    }

    async fn set_purchase_status(&self, id: PurchaseId, status: PurchaseStatus) -> Result<()> {
        let mut inner = self.inner.write().await;
        let purchase = inner
            .purchases
            .get_mut(&id)
            .ok_or(StoreError::PurchaseNotFound(id))?;
        purchase.status = status;
        purchase.updated_at = Utc::now();
        Ok(())
    }

    async fn set_purchase_payment_reference(
        &self,
        id: PurchaseId,
        payment_reference: &str,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let purchase = inner
            .purchases
            .get_mut(&id)
            .ok_or(StoreError::PurchaseNotFound(id))?;
        purchase.payment_reference = Some(payment_reference.to_string());
        purchase.updated_at = Utc::now();
        Ok(())
    }
}
