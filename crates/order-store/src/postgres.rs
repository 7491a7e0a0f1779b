use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderReference, PrintOrderId, PurchaseId};
use domain::{
    CustomerId, PrintOrder, PrintOrderStatus, Purchase, PurchaseStatus, TrackingInfo,
};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{Result, store::OrderStore};

const PURCHASE_COLUMNS: &str = "id, order_reference, customer_id, product_type, price_minor_units, \
     status, payment_reference, customization, created_at, updated_at";

const PRINT_ORDER_COLUMNS: &str = "id, purchase_id, fulfiller_order_id, status, \
     payment_method_reference, tracking, last_webhook_payload, error_message, created_at, \
     updated_at";

/// PostgreSQL-backed order store implementation.
///
/// `transition_print_order` is a single conditional `UPDATE` checking
/// `rows_affected`, so the `Creating → Charging` lock holds across process
/// instances sharing the database.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to the database and creates a store over a fresh pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_purchase(row: PgRow) -> Result<Purchase> {
        let status: String = row.try_get("status")?;
        let product_type: String = row.try_get("product_type")?;
        let customization: Option<serde_json::Value> = row.try_get("customization")?;

        Ok(Purchase {
            id: PurchaseId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_reference: OrderReference::from_uuid(row.try_get::<Uuid, _>("order_reference")?),
            customer_id: CustomerId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
            product_type: product_type.parse()?,
            price: domain::Money::from_minor_units(row.try_get("price_minor_units")?),
            status: status.parse()?,
            payment_reference: row.try_get("payment_reference")?,
            customization: customization
                .map(serde_json::from_value)
                .transpose()?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        })
    }

    fn row_to_print_order(row: PgRow) -> Result<PrintOrder> {
        let status: String = row.try_get("status")?;
        let tracking: serde_json::Value = row.try_get("tracking")?;

        Ok(PrintOrder {
            id: PrintOrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            purchase_id: PurchaseId::from_uuid(row.try_get::<Uuid, _>("purchase_id")?),
            fulfiller_order_id: row.try_get("fulfiller_order_id")?,
            status: status.parse()?,
            payment_method_reference: row.try_get("payment_method_reference")?,
            tracking: serde_json::from_value::<TrackingInfo>(tracking)?,
            last_webhook_payload: row.try_get("last_webhook_payload")?,
            error_message: row.try_get("error_message")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        })
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn create_purchase(&self, purchase: Purchase) -> Result<()> {
        let customization = purchase
            .customization
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO purchases
                (id, order_reference, customer_id, product_type, price_minor_units, status,
                 payment_reference, customization, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(purchase.id.as_uuid())
        .bind(purchase.order_reference.as_uuid())
        .bind(purchase.customer_id.as_uuid())
        .bind(purchase.product_type.as_str())
        .bind(purchase.price.minor_units())
        .bind(purchase.status.as_str())
        .bind(&purchase.payment_reference)
        .bind(customization)
        .bind(purchase.created_at)
        .bind(purchase.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn create_print_order(&self, print_order: PrintOrder) -> Result<()> {
        let tracking = serde_json::to_value(&print_order.tracking)?;

        sqlx::query(
            r#"
            INSERT INTO print_orders
                (id, purchase_id, fulfiller_order_id, status, payment_method_reference,
                 tracking, last_webhook_payload, error_message, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(print_order.id.as_uuid())
        .bind(print_order.purchase_id.as_uuid())
        .bind(&print_order.fulfiller_order_id)
        .bind(print_order.status.as_str())
        .bind(&print_order.payment_method_reference)
        .bind(tracking)
        .bind(&print_order.last_webhook_payload)
        .bind(&print_order.error_message)
        .bind(print_order.created_at)
        .bind(print_order.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_purchase(&self, id: PurchaseId) -> Result<Option<Purchase>> {
        let row = sqlx::query(&format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchases WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_purchase).transpose()
    }

    async fn get_print_order(&self, id: PrintOrderId) -> Result<Option<PrintOrder>> {
        let row = sqlx::query(&format!(
            "SELECT {PRINT_ORDER_COLUMNS} FROM print_orders WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_print_order).transpose()
    }

    async fn purchases_by_reference(&self, reference: OrderReference) -> Result<Vec<Purchase>> {
        let rows = sqlx::query(&format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchases WHERE order_reference = $1 \
             ORDER BY created_at ASC"
        ))
        .bind(reference.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_purchase).collect()
    }

    async fn purchases_by_customer(&self, customer_id: CustomerId) -> Result<Vec<Purchase>> {
        let rows = sqlx::query(&format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchases WHERE customer_id = $1 \
             ORDER BY created_at DESC"
        ))
        .bind(customer_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_purchase).collect()
    }

    async fn print_orders_by_reference(
        &self,
        reference: OrderReference,
    ) -> Result<Vec<PrintOrder>> {
        let rows = sqlx::query(
            "SELECT po.* FROM print_orders po \
             JOIN purchases p ON p.id = po.purchase_id \
             WHERE p.order_reference = $1 \
             ORDER BY po.created_at ASC",
        )
        .bind(reference.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_print_order).collect()
    }

    async fn print_orders_by_fulfiller(&self, fulfiller_order_id: &str) -> Result<Vec<PrintOrder>> {
        let rows = sqlx::query(&format!(
            "SELECT {PRINT_ORDER_COLUMNS} FROM print_orders WHERE fulfiller_order_id = $1 \
             ORDER BY created_at ASC"
        ))
        .bind(fulfiller_order_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_print_order).collect()
    }

    async fn assign_fulfiller_order_id(
        &self,
        ids: &[PrintOrderId],
        fulfiller_order_id: &str,
    ) -> Result<()> {
        let uuids: Vec<Uuid> = ids.iter().map(|id| id.as_uuid()).collect();

        sqlx::query(
            "UPDATE print_orders SET fulfiller_order_id = $1, updated_at = now() \
             WHERE id = ANY($2)",
        )
        .bind(fulfiller_order_id)
        .bind(&uuids)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn transition_print_order(
        &self,
        id: PrintOrderId,
        expected: PrintOrderStatus,
        next: PrintOrderStatus,
    ) -> Result<bool> {
        // The compare-and-swap: zero affected rows means the record was not
        // in `expected` status and another handler owns the transition.
        let result = sqlx::query(
            "UPDATE print_orders SET status = $1, updated_at = now() \
             WHERE id = $2 AND status = $3",
        )
        .bind(next.as_str())
        .bind(id.as_uuid())
        .bind(expected.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_print_order_status(
        &self,
        id: PrintOrderId,
        status: PrintOrderStatus,
        error_message: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE print_orders \
             SET status = $1, error_message = COALESCE($2, error_message), updated_at = now() \
             WHERE id = $3",
        )
        .bind(status.as_str())
        .bind(error_message)
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn record_webhook(
        &self,
        id: PrintOrderId,
        tracking: &TrackingInfo,
        payload: &serde_json::Value,
    ) -> Result<()> {
        let update = serde_json::to_value(tracking)?;

        // `||` merges only the fields the webhook reported; absent fields
        // are not serialized, so earlier tracking data survives.
        sqlx::query(
            "UPDATE print_orders \
             SET tracking = COALESCE(tracking, '{}'::jsonb) || $1, \
                 last_webhook_payload = $2, updated_at = now() \
             WHERE id = $3",
        )
        .bind(update)
        .bind(payload)
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_purchase_status(&self, id: PurchaseId, status: PurchaseStatus) -> Result<()> {
        sqlx::query("UPDATE purchases SET status = $1, updated_at = now() WHERE id = $2")
            .bind(status.as_str())
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn set_purchase_payment_reference(
        &self,
        id: PurchaseId,
        payment_reference: &str,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE purchases SET payment_reference = $1, updated_at = now() WHERE id = $2",
        )
        .bind(payment_reference)
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
