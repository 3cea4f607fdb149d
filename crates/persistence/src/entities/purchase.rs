//! Sponsorship purchase entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{PaymentStatus, SponsorshipPurchase};
use sqlx::FromRow;
use uuid::Uuid;

/// Database enum for payment_status that maps to PostgreSQL enum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
pub enum PaymentStatusDb {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl From<PaymentStatusDb> for PaymentStatus {
    fn from(db: PaymentStatusDb) -> Self {
        match db {
            PaymentStatusDb::Pending => PaymentStatus::Pending,
            PaymentStatusDb::Completed => PaymentStatus::Completed,
            PaymentStatusDb::Failed => PaymentStatus::Failed,
            PaymentStatusDb::Refunded => PaymentStatus::Refunded,
        }
    }
}

impl From<PaymentStatus> for PaymentStatusDb {
    fn from(status: PaymentStatus) -> Self {
        match status {
            PaymentStatus::Pending => PaymentStatusDb::Pending,
            PaymentStatus::Completed => PaymentStatusDb::Completed,
            PaymentStatus::Failed => PaymentStatusDb::Failed,
            PaymentStatus::Refunded => PaymentStatusDb::Refunded,
        }
    }
}

/// Database row mapping for the sponsorship_purchases table.
#[derive(Debug, Clone, FromRow)]
pub struct SponsorshipPurchaseEntity {
    pub id: Uuid,
    pub sponsor_id: Uuid,
    pub tier_id: Uuid,
    pub quantity: i32,
    pub unit_price_cents: i64,
    pub total_amount_cents: i64,
    pub currency: String,
    pub payment_method: Option<String>,
    pub payment_reference: Option<String>,
    pub payment_status: PaymentStatusDb,
    pub code_prefix: String,
    pub validity_days: i32,
    pub company_name: Option<String>,
    pub invoice_address: Option<String>,
    pub tax_number: Option<String>,
    pub notes: Option<String>,
    pub purchased_at: DateTime<Utc>,
}

impl From<SponsorshipPurchaseEntity> for SponsorshipPurchase {
    fn from(entity: SponsorshipPurchaseEntity) -> Self {
        Self {
            id: entity.id,
            sponsor_id: entity.sponsor_id,
            tier_id: entity.tier_id,
            quantity: entity.quantity,
            unit_price_cents: entity.unit_price_cents,
            total_amount_cents: entity.total_amount_cents,
            currency: entity.currency,
            payment_method: entity.payment_method,
            payment_reference: entity.payment_reference,
            payment_status: entity.payment_status.into(),
            code_prefix: entity.code_prefix,
            validity_days: entity.validity_days,
            company_name: entity.company_name,
            invoice_address: entity.invoice_address,
            tax_number: entity.tax_number,
            notes: entity.notes,
            purchased_at: entity.purchased_at,
        }
    }
}
