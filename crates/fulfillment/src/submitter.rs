//! Fulfillment submitter: persists checkout records, then submits one
//! production batch to the fulfiller.
//!
//! Records are written in `Creating` status *before* the external call, so
//! a webhook that races the submission response still finds its batch once
//! the fulfiller order id lands. No charge is ever attempted for an order
//! that never left `Creating` for `Charging`.

use common::{OrderReference, PrintOrderId, PurchaseId};
use domain::{CustomerId, Money, PrintCustomization, PrintOrder, PrintOrderStatus, Purchase,
    PurchaseStatus};
use order_store::OrderStore;

use crate::error::{FulfillmentError, Result};
use crate::services::assets::AssetService;
use crate::services::fulfiller::{
    FulfillerClient, FulfillmentItem, FulfillmentOrderRequest, OrderMetadata, Recipient,
};

/// One line item in a checkout submission.
#[derive(Debug, Clone)]
pub struct SubmissionItem {
    pub sku: String,
    pub copies: u32,
    pub price: Money,
    pub customization: Option<PrintCustomization>,

    /// URL of the source artifact to render into print-ready assets.
    pub source_asset_url: String,
}

/// A checkout batch destined for one shipping address, paid with one
/// captured payment instrument.
#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    pub customer_id: CustomerId,
    pub recipient: Recipient,
    pub shipping_method: String,
    pub payment_method_reference: String,
    pub items: Vec<SubmissionItem>,
}

/// Result of a successful batch submission.
#[derive(Debug, Clone)]
pub struct SubmissionReceipt {
    pub order_reference: OrderReference,
    pub fulfiller_order_id: String,
    pub purchase_ids: Vec<PurchaseId>,
}

/// Creates purchases and print orders for a checkout batch and submits the
/// production request to the fulfiller.
pub struct FulfillmentSubmitter<S, F, A>
where
    S: OrderStore,
    F: FulfillerClient,
    A: AssetService,
{
    store: S,
    fulfiller: F,
    assets: A,

    /// Callback URL the fulfiller posts status updates to; carries the
    /// webhook path secret.
    callback_url: String,
}

impl<S, F, A> FulfillmentSubmitter<S, F, A>
where
    S: OrderStore,
    F: FulfillerClient,
    A: AssetService,
{
    /// Creates a new submitter.
    pub fn new(store: S, fulfiller: F, assets: A, callback_url: impl Into<String>) -> Self {
        Self {
            store,
            fulfiller,
            assets,
            callback_url: callback_url.into(),
        }
    }

    /// Submits a checkout batch to the fulfiller.
    ///
    /// On failure the affected print orders are written to `Failed` with an
    /// error message and the error is returned to the caller; partially
    /// failed batches are not retried automatically.
    #[tracing::instrument(skip(self, request), fields(item_count = request.items.len()))]
    pub async fn submit(&self, request: SubmissionRequest) -> Result<SubmissionReceipt> {
        if request.items.is_empty() {
            return Err(FulfillmentError::EmptySubmission);
        }

        metrics::counter!("fulfillment_submissions_total").increment(1);

        let order_reference = OrderReference::new();
        let mut records: Vec<(PurchaseId, PrintOrderId, SubmissionItem)> = Vec::new();

        // 1. Persist Creating records before any external call.
        for item in &request.items {
            let purchase = Purchase::new_print(
                order_reference,
                request.customer_id,
                item.price,
                item.customization.clone(),
            );
            let print_order =
                PrintOrder::new(purchase.id, request.payment_method_reference.clone());

            let purchase_id = purchase.id;
            let print_order_id = print_order.id;
            self.store.create_purchase(purchase).await?;
            self.store.create_print_order(print_order).await?;
            records.push((purchase_id, print_order_id, item.clone()));
        }

        // 2. Prepare print-ready assets per item.
        let mut items = Vec::with_capacity(records.len());
        for (purchase_id, print_order_id, item) in &records {
            match self
                .assets
                .prepare_assets(&item.sku, &item.source_asset_url)
                .await
            {
                Ok(assets) => items.push(FulfillmentItem {
                    sku: item.sku.clone(),
                    copies: item.copies,
                    sizing: "fillPrintArea".to_string(),
                    assets,
                }),
                Err(error) => {
                    tracing::error!(
                        %order_reference,
                        sku = %item.sku,
                        %error,
                        "asset preparation failed, marking print order failed"
                    );
                    self.fail_record(*purchase_id, *print_order_id, &error.to_string())
                        .await?;
                    metrics::counter!("fulfillment_submission_failures").increment(1);
                    return Err(error);
                }
            }
        }

        // 3. One production request for the whole batch.
        let fulfiller_request = FulfillmentOrderRequest {
            merchant_reference: order_reference.to_string(),
            shipping_method: request.shipping_method.clone(),
            recipient: request.recipient.clone(),
            items,
            callback_url: self.callback_url.clone(),
            metadata: OrderMetadata::deferred(order_reference.to_string()),
        };

        let submitted = match self.fulfiller.submit_order(fulfiller_request).await {
            Ok(submitted) => submitted,
            Err(error) => {
                tracing::error!(%order_reference, %error, "fulfiller rejected the batch");
                for (purchase_id, print_order_id, _) in &records {
                    self.fail_record(*purchase_id, *print_order_id, &error.to_string())
                        .await?;
                }
                metrics::counter!("fulfillment_submission_failures").increment(1);
                return Err(error);
            }
        };

        // 4. Attach the fulfiller order id to every print order in the batch.
        let print_order_ids: Vec<PrintOrderId> =
            records.iter().map(|(_, id, _)| *id).collect();
        self.store
            .assign_fulfiller_order_id(&print_order_ids, &submitted.fulfiller_order_id)
            .await?;

        tracing::info!(
            %order_reference,
            fulfiller_order_id = %submitted.fulfiller_order_id,
            items = records.len(),
            "batch submitted to fulfiller"
        );

        Ok(SubmissionReceipt {
            order_reference,
            fulfiller_order_id: submitted.fulfiller_order_id,
            purchase_ids: records.iter().map(|(id, _, _)| *id).collect(),
        })
    }

    async fn fail_record(
        &self,
        purchase_id: PurchaseId,
        print_order_id: PrintOrderId,
        message: &str,
    ) -> Result<()> {
        self.store
            .set_print_order_status(print_order_id, PrintOrderStatus::Failed, Some(message))
            .await?;
        self.store
            .set_purchase_status(purchase_id, PurchaseStatus::Failed)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::assets::InMemoryAssetService;
    use crate::services::fulfiller::{Address, InMemoryFulfiller};
    use order_store::InMemoryOrderStore;

    fn submitter(
        store: InMemoryOrderStore,
        fulfiller: InMemoryFulfiller,
        assets: InMemoryAssetService,
    ) -> FulfillmentSubmitter<InMemoryOrderStore, InMemoryFulfiller, InMemoryAssetService> {
        FulfillmentSubmitter::new(
            store,
            fulfiller,
            assets,
            "https://service.example/webhooks/fulfillment/secret",
        )
    }

    fn two_item_request() -> SubmissionRequest {
        SubmissionRequest {
            customer_id: CustomerId::new(),
            recipient: Recipient {
                name: "Ada Lovelace".to_string(),
                address: Address {
                    line1: "1 Analytical Way".to_string(),
                    line2: None,
                    town_or_city: "London".to_string(),
                    postal_or_zip_code: "N1 9GU".to_string(),
                    country_code: "GB".to_string(),
                },
            },
            shipping_method: "Standard".to_string(),
            payment_method_reference: "pm_captured".to_string(),
            items: vec![
                SubmissionItem {
                    sku: "BOOK-A5".to_string(),
                    copies: 1,
                    price: Money::from_minor_units(1500),
                    customization: Some(PrintCustomization::with_book_size("A5-portrait")),
                    source_asset_url: "https://assets.example/story-1.pdf".to_string(),
                },
                SubmissionItem {
                    sku: "BOOK-A4".to_string(),
                    copies: 1,
                    price: Money::from_minor_units(2000),
                    customization: None,
                    source_asset_url: "https://assets.example/story-2.pdf".to_string(),
                },
            ],
        }
    }

    #[tokio::test]
    async fn test_submit_creates_records_and_attaches_fulfiller_id() {
        let store = InMemoryOrderStore::new();
        let fulfiller = InMemoryFulfiller::new();
        let submitter = submitter(store.clone(), fulfiller.clone(), InMemoryAssetService::new());

        let receipt = submitter.submit(two_item_request()).await.unwrap();

        let purchases = store
            .purchases_by_reference(receipt.order_reference)
            .await
            .unwrap();
        assert_eq!(purchases.len(), 2);
        assert!(purchases
            .iter()
            .all(|p| p.status == PurchaseStatus::Creating));

        let batch = store
            .print_orders_by_fulfiller(&receipt.fulfiller_order_id)
            .await
            .unwrap();
        assert_eq!(batch.len(), 2);
        assert!(batch.iter().all(|o| o.status == PrintOrderStatus::Creating));
        assert!(batch
            .iter()
            .all(|o| o.payment_method_reference == "pm_captured"));
    }

    #[tokio::test]
    async fn test_submitted_request_carries_deferred_metadata() {
        let store = InMemoryOrderStore::new();
        let fulfiller = InMemoryFulfiller::new();
        let submitter = submitter(store, fulfiller.clone(), InMemoryAssetService::new());

        let receipt = submitter.submit(two_item_request()).await.unwrap();

        let request = fulfiller.last_request().unwrap();
        assert_eq!(request.merchant_reference, receipt.order_reference.to_string());
        assert_eq!(request.metadata.payment_phase, "deferred");
        assert_eq!(request.items.len(), 2);
        assert!(request
            .callback_url
            .contains("/webhooks/fulfillment/"));
        assert!(request.items.iter().all(|i| !i.assets.is_empty()));
    }

    #[tokio::test]
    async fn test_fulfiller_rejection_fails_whole_batch() {
        let store = InMemoryOrderStore::new();
        let fulfiller = InMemoryFulfiller::new();
        fulfiller.set_fail_on_submit(true);
        let submitter = submitter(store.clone(), fulfiller, InMemoryAssetService::new());

        let result = submitter.submit(two_item_request()).await;
        assert!(matches!(result, Err(FulfillmentError::Fulfiller(_))));

        // Both records written to Failed, with the fulfiller error retained.
        assert_eq!(store.print_order_count().await, 2);
        for purchase in store_all_purchases(&store).await {
            assert_eq!(purchase.status, PurchaseStatus::Failed);
        }
    }

    #[tokio::test]
    async fn test_asset_failure_marks_item_failed() {
        let store = InMemoryOrderStore::new();
        let assets = InMemoryAssetService::new();
        assets.set_fail_on_prepare(true);
        let submitter = submitter(store.clone(), InMemoryFulfiller::new(), assets);

        let result = submitter.submit(two_item_request()).await;
        assert!(matches!(
            result,
            Err(FulfillmentError::AssetPreparation { .. })
        ));

        let failed: Vec<_> = store_all_purchases(&store)
            .await
            .into_iter()
            .filter(|p| p.status == PurchaseStatus::Failed)
            .collect();
        assert_eq!(failed.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_submission_is_rejected() {
        let store = InMemoryOrderStore::new();
        let submitter = submitter(store, InMemoryFulfiller::new(), InMemoryAssetService::new());

        let mut request = two_item_request();
        request.items.clear();

        let result = submitter.submit(request).await;
        assert!(matches!(result, Err(FulfillmentError::EmptySubmission)));
    }

    async fn store_all_purchases(store: &InMemoryOrderStore) -> Vec<Purchase> {
        store.all_purchases().await
    }
}
