//! Checkout submission and order-history endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::OrderReference;
use domain::{CustomerId, Money, PrintCustomization, PrintOrder, Purchase};
use fulfillment::{
    Address, FulfillmentSubmitter, InMemoryAssetService, InMemoryFulfiller,
    InMemoryPaymentProcessor, Recipient, StateReconciler, SubmissionItem, SubmissionRequest,
};
use order_store::OrderStore;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: OrderStore> {
    pub store: S,
    pub submitter: FulfillmentSubmitter<S, InMemoryFulfiller, InMemoryAssetService>,
    pub reconciler: StateReconciler<S, InMemoryFulfiller, InMemoryPaymentProcessor>,
    pub webhook_secret: String,
}

// -- Request types --

#[derive(Deserialize)]
pub struct SubmitOrderRequest {
    pub customer_id: Option<String>,
    pub recipient: RecipientRequest,
    pub shipping_method: String,
    pub payment_method_reference: String,
    pub items: Vec<OrderItemRequest>,
}

#[derive(Deserialize)]
pub struct RecipientRequest {
    pub name: String,
    pub line1: String,
    pub line2: Option<String>,
    pub town_or_city: String,
    pub postal_or_zip_code: String,
    pub country_code: String,
}

#[derive(Deserialize)]
pub struct OrderItemRequest {
    pub sku: String,
    pub copies: u32,
    pub price_minor_units: i64,
    pub book_size: Option<String>,
    pub spine_text: Option<String>,
    pub source_asset_url: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct SubmittedResponse {
    pub order_reference: String,
    pub fulfiller_order_id: String,
    pub purchase_ids: Vec<String>,
}

#[derive(Serialize)]
pub struct PurchaseResponse {
    pub id: String,
    pub product_type: String,
    pub price_minor_units: i64,
    pub status: String,
    pub payment_reference: Option<String>,
}

#[derive(Serialize)]
pub struct PrintOrderResponse {
    pub id: String,
    pub purchase_id: String,
    pub fulfiller_order_id: Option<String>,
    pub status: String,
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub tracking_url: Option<String>,
    pub error_message: Option<String>,
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub order_reference: String,
    pub purchases: Vec<PurchaseResponse>,
    pub print_orders: Vec<PrintOrderResponse>,
}

#[derive(Serialize)]
pub struct OrderHistoryEntry {
    pub order_reference: String,
    pub purchase: PurchaseResponse,
}

// -- Handlers --

/// POST /orders — submit a checkout batch to the fulfiller.
#[tracing::instrument(skip(state, req))]
pub async fn submit<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<SubmitOrderRequest>,
) -> Result<(axum::http::StatusCode, Json<SubmittedResponse>), ApiError> {
    let customer_id = if let Some(ref id_str) = req.customer_id {
        let uuid = uuid::Uuid::parse_str(id_str)
            .map_err(|e| ApiError::BadRequest(format!("Invalid customer_id: {e}")))?;
        CustomerId::from_uuid(uuid)
    } else {
        CustomerId::new()
    };

    let items = req
        .items
        .iter()
        .map(|item| SubmissionItem {
            sku: item.sku.clone(),
            copies: item.copies,
            price: Money::from_minor_units(item.price_minor_units),
            customization: item.book_size.as_ref().map(|book_size| PrintCustomization {
                book_size: book_size.clone(),
                spine_text: item.spine_text.clone(),
            }),
            source_asset_url: item.source_asset_url.clone(),
        })
        .collect();

    let submission = SubmissionRequest {
        customer_id,
        recipient: Recipient {
            name: req.recipient.name.clone(),
            address: Address {
                line1: req.recipient.line1.clone(),
                line2: req.recipient.line2.clone(),
                town_or_city: req.recipient.town_or_city.clone(),
                postal_or_zip_code: req.recipient.postal_or_zip_code.clone(),
                country_code: req.recipient.country_code.clone(),
            },
        },
        shipping_method: req.shipping_method.clone(),
        payment_method_reference: req.payment_method_reference.clone(),
        items,
    };

    let receipt = state.submitter.submit(submission).await?;

    let response = SubmittedResponse {
        order_reference: receipt.order_reference.to_string(),
        fulfiller_order_id: receipt.fulfiller_order_id,
        purchase_ids: receipt
            .purchase_ids
            .iter()
            .map(|id| id.to_string())
            .collect(),
    };

    Ok((axum::http::StatusCode::CREATED, Json(response)))
}

/// GET /orders/:reference — purchases and print orders for one checkout.
#[tracing::instrument(skip(state))]
pub async fn get<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(reference): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let reference = parse_order_reference(&reference)?;

    let purchases = state.store.purchases_by_reference(reference).await?;
    if purchases.is_empty() {
        return Err(ApiError::NotFound(format!("Order {reference} not found")));
    }
    let print_orders = state.store.print_orders_by_reference(reference).await?;

    Ok(Json(OrderResponse {
        order_reference: reference.to_string(),
        purchases: purchases.iter().map(purchase_response).collect(),
        print_orders: print_orders.iter().map(print_order_response).collect(),
    }))
}

/// GET /customers/:id/orders — order history for a customer, newest first.
#[tracing::instrument(skip(state))]
pub async fn history<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<OrderHistoryEntry>>, ApiError> {
    let uuid = uuid::Uuid::parse_str(&id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid customer ID: {e}")))?;
    let customer_id = CustomerId::from_uuid(uuid);

    let purchases = state.store.purchases_by_customer(customer_id).await?;

    let entries = purchases
        .iter()
        .map(|purchase| OrderHistoryEntry {
            order_reference: purchase.order_reference.to_string(),
            purchase: purchase_response(purchase),
        })
        .collect();

    Ok(Json(entries))
}

fn purchase_response(purchase: &Purchase) -> PurchaseResponse {
    PurchaseResponse {
        id: purchase.id.to_string(),
        product_type: purchase.product_type.to_string(),
        price_minor_units: purchase.price.minor_units(),
        status: purchase.status.to_string(),
        payment_reference: purchase.payment_reference.clone(),
    }
}

fn print_order_response(order: &PrintOrder) -> PrintOrderResponse {
    PrintOrderResponse {
        id: order.id.to_string(),
        purchase_id: order.purchase_id.to_string(),
        fulfiller_order_id: order.fulfiller_order_id.clone(),
        status: order.status.to_string(),
        carrier: order.tracking.carrier.clone(),
        tracking_number: order.tracking.tracking_number.clone(),
        tracking_url: order.tracking.tracking_url.clone(),
        error_message: order.error_message.clone(),
    }
}

fn parse_order_reference(reference: &str) -> Result<OrderReference, ApiError> {
    let uuid = uuid::Uuid::parse_str(reference)
        .map_err(|e| ApiError::BadRequest(format!("Invalid order reference: {e}")))?;
    Ok(OrderReference::from_uuid(uuid))
}
