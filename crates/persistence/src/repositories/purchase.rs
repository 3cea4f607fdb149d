//! Sponsorship purchase repository for database operations.

use domain::models::SponsorshipPurchase;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::entities::{PaymentStatusDb, SponsorshipPurchaseEntity};
use crate::metrics::QueryTimer;

/// Repository for purchase records.
#[derive(Clone)]
pub struct PurchaseRepository {
    pool: PgPool,
}

impl PurchaseRepository {
    /// Creates a new PurchaseRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert a purchase record.
    pub async fn insert(
        &self,
        conn: &mut PgConnection,
        purchase: &SponsorshipPurchase,
    ) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("insert_purchase");
        let payment_status: PaymentStatusDb = purchase.payment_status.into();
        sqlx::query(
            r#"
            INSERT INTO sponsorship_purchases (
                id, sponsor_id, tier_id, quantity, unit_price_cents, total_amount_cents, currency,
                payment_method, payment_reference, payment_status, code_prefix, validity_days,
                company_name, invoice_address, tax_number, notes, purchased_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(purchase.id)
        .bind(purchase.sponsor_id)
        .bind(purchase.tier_id)
        .bind(purchase.quantity)
        .bind(purchase.unit_price_cents)
        .bind(purchase.total_amount_cents)
        .bind(&purchase.currency)
        .bind(&purchase.payment_method)
        .bind(&purchase.payment_reference)
        .bind(payment_status)
        .bind(&purchase.code_prefix)
        .bind(purchase.validity_days)
        .bind(&purchase.company_name)
        .bind(&purchase.invoice_address)
        .bind(&purchase.tax_number)
        .bind(&purchase.notes)
        .bind(purchase.purchased_at)
        .execute(&mut *conn)
        .await?;
        timer.record();
        Ok(())
    }

    /// Find purchase by ID.
    pub async fn find_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<SponsorshipPurchaseEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_purchase_by_id");
        let result = sqlx::query_as::<_, SponsorshipPurchaseEntity>(
            r#"
            SELECT id, sponsor_id, tier_id, quantity, unit_price_cents, total_amount_cents,
                   currency, payment_method, payment_reference, payment_status, code_prefix,
                   validity_days, company_name, invoice_address, tax_number, notes, purchased_at
            FROM sponsorship_purchases
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }
}
