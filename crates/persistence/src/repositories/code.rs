//! Sponsorship code repository for database operations.

use chrono::{DateTime, Utc};
use domain::models::SponsorshipCode;
use domain::services::{CodeFilter, CodeOrder};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::entities::{
    HoldColumns, HoldStateDb, PoolStatsEntity, SponsorshipCodeEntity, CODE_COLUMNS,
};
use crate::metrics::QueryTimer;

/// Rows per multi-row insert statement.
const INSERT_CHUNK_SIZE: usize = 5_000;

/// Predicate shared by every "available code" query. Binds `$1` sponsor,
/// `$2` tier, `$3` purchase and `$4` now.
const AVAILABLE_PREDICATE: &str = r#"
    sponsor_id = $1
      AND ($2::uuid IS NULL OR tier_id = $2)
      AND ($3::uuid IS NULL OR purchase_id = $3)
      AND hold_state = 'none'
      AND is_used = false
      AND is_active = true
      AND expiry_date > $4
"#;

fn order_clause(order: CodeOrder) -> &'static str {
    match order {
        CodeOrder::ExpirySoonest => "expiry_date ASC, created_at ASC, id ASC",
        CodeOrder::OldestCreated => "created_at ASC, id ASC",
    }
}

/// Repository for sponsorship code database operations.
#[derive(Clone)]
pub struct CodeRepository {
    pool: PgPool,
}

impl CodeRepository {
    /// Creates a new CodeRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Available codes in allocation order, without locking.
    pub async fn find_available(
        &self,
        filter: &CodeFilter,
        order: CodeOrder,
        limit: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<SponsorshipCodeEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_available_codes");
        let sql = format!(
            "SELECT {} FROM sponsorship_codes WHERE {} ORDER BY {} LIMIT $5",
            CODE_COLUMNS,
            AVAILABLE_PREDICATE,
            order_clause(order)
        );
        let result = sqlx::query_as::<_, SponsorshipCodeEntity>(&sql)
            .bind(filter.sponsor_id)
            .bind(filter.tier_id)
            .bind(filter.purchase_id)
            .bind(now)
            .bind(limit)
            .fetch_all(&self.pool)
            .await;
        timer.record();
        result
    }

    /// Locks available codes in allocation order. Rows another transaction
    /// already holds are skipped.
    pub async fn lock_available(
        &self,
        conn: &mut PgConnection,
        filter: &CodeFilter,
        order: CodeOrder,
        limit: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<SponsorshipCodeEntity>, sqlx::Error> {
        let timer = QueryTimer::new("lock_available_codes");
        let sql = format!(
            "SELECT {} FROM sponsorship_codes WHERE {} ORDER BY {} LIMIT $5 FOR UPDATE SKIP LOCKED",
            CODE_COLUMNS,
            AVAILABLE_PREDICATE,
            order_clause(order)
        );
        let result = sqlx::query_as::<_, SponsorshipCodeEntity>(&sql)
            .bind(filter.sponsor_id)
            .bind(filter.tier_id)
            .bind(filter.purchase_id)
            .bind(now)
            .bind(limit)
            .fetch_all(&mut *conn)
            .await;
        timer.record();
        result
    }

    /// Locks every code reserved for an invitation.
    pub async fn lock_reserved_for(
        &self,
        conn: &mut PgConnection,
        invitation_id: Uuid,
    ) -> Result<Vec<SponsorshipCodeEntity>, sqlx::Error> {
        let timer = QueryTimer::new("lock_codes_reserved_for");
        let sql = format!(
            r#"
            SELECT {} FROM sponsorship_codes
            WHERE hold_state = 'reserved' AND reserved_invitation_id = $1
            ORDER BY expiry_date ASC, created_at ASC, id ASC
            FOR UPDATE
            "#,
            CODE_COLUMNS
        );
        let result = sqlx::query_as::<_, SponsorshipCodeEntity>(&sql)
            .bind(invitation_id)
            .fetch_all(&mut *conn)
            .await;
        timer.record();
        result
    }

    /// Locks a dealer's unused, active, unexpired codes from one sponsor.
    pub async fn lock_reclaimable(
        &self,
        conn: &mut PgConnection,
        sponsor_id: Uuid,
        dealer_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<SponsorshipCodeEntity>, sqlx::Error> {
        let timer = QueryTimer::new("lock_reclaimable_codes");
        let sql = format!(
            r#"
            SELECT {} FROM sponsorship_codes
            WHERE sponsor_id = $1
              AND hold_state = 'assigned'
              AND dealer_id = $2
              AND is_used = false
              AND is_active = true
              AND expiry_date > $3
            ORDER BY created_at ASC, id ASC
            FOR UPDATE
            "#,
            CODE_COLUMNS
        );
        let result = sqlx::query_as::<_, SponsorshipCodeEntity>(&sql)
            .bind(sponsor_id)
            .bind(dealer_id)
            .bind(now)
            .fetch_all(&mut *conn)
            .await;
        timer.record();
        result
    }

    /// Find a code by its value.
    pub async fn find_by_value(
        &self,
        code: &str,
    ) -> Result<Option<SponsorshipCodeEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_code_by_value");
        let sql = format!("SELECT {} FROM sponsorship_codes WHERE code = $1", CODE_COLUMNS);
        let result = sqlx::query_as::<_, SponsorshipCodeEntity>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await;
        timer.record();
        result
    }

    /// Lock a code by its value.
    pub async fn lock_by_value(
        &self,
        conn: &mut PgConnection,
        code: &str,
    ) -> Result<Option<SponsorshipCodeEntity>, sqlx::Error> {
        let timer = QueryTimer::new("lock_code_by_value");
        let sql = format!(
            "SELECT {} FROM sponsorship_codes WHERE code = $1 FOR UPDATE",
            CODE_COLUMNS
        );
        let result = sqlx::query_as::<_, SponsorshipCodeEntity>(&sql)
            .bind(code)
            .fetch_optional(&mut *conn)
            .await;
        timer.record();
        result
    }

    /// Returns which of `values` are already taken.
    pub async fn existing_values(&self, values: &[String]) -> Result<Vec<String>, sqlx::Error> {
        let timer = QueryTimer::new("existing_code_values");
        let result = sqlx::query_scalar::<_, String>(
            r#"
            SELECT code FROM sponsorship_codes WHERE code = ANY($1)
            "#,
        )
        .bind(values)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Counts a sponsor's codes per bucket, optionally for one purchase.
    pub async fn pool_stats(
        &self,
        sponsor_id: Uuid,
        purchase_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<PoolStatsEntity, sqlx::Error> {
        let timer = QueryTimer::new("code_pool_stats");
        let result = sqlx::query_as::<_, PoolStatsEntity>(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE is_used) AS used,
                COUNT(*) FILTER (WHERE NOT is_used AND NOT is_active) AS inactive,
                COUNT(*) FILTER (WHERE NOT is_used AND is_active AND expiry_date <= $3) AS expired,
                COUNT(*) FILTER (
                    WHERE NOT is_used AND is_active AND expiry_date > $3 AND hold_state = 'reserved'
                ) AS reserved,
                COUNT(*) FILTER (
                    WHERE NOT is_used AND is_active AND expiry_date > $3 AND hold_state = 'assigned'
                ) AS assigned,
                COUNT(*) FILTER (
                    WHERE NOT is_used AND is_active AND expiry_date > $3 AND hold_state = 'none'
                ) AS available
            FROM sponsorship_codes
            WHERE sponsor_id = $1 AND ($2::uuid IS NULL OR purchase_id = $2)
            "#,
        )
        .bind(sponsor_id)
        .bind(purchase_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Writes `code` only if the row is still unused and still carries
    /// `expected`. Returns the number of rows updated (0 or 1).
    pub async fn compare_and_swap(
        &self,
        conn: &mut PgConnection,
        expected: &HoldColumns,
        code: &SponsorshipCode,
    ) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("swap_code");
        let next = HoldColumns::from(&code.hold);
        let result = sqlx::query(
            r#"
            UPDATE sponsorship_codes
            SET hold_state = $2,
                reserved_invitation_id = $3,
                reserved_kind = $4,
                reserved_at = $5,
                dealer_id = $6,
                farmer_invitation_id = $7,
                farmer_user_id = $8,
                is_used = $9,
                is_active = $10,
                used_by_user_id = $11,
                used_at = $12,
                created_subscription_id = $13,
                transferred_at = $14,
                transferred_by_user_id = $15,
                reclaimed_at = $16,
                reclaimed_by_user_id = $17,
                distribution_date = $18,
                distribution_channel = $19,
                distributed_to = $20
            WHERE id = $1
              AND is_used = false
              AND hold_state = $21
              AND reserved_invitation_id IS NOT DISTINCT FROM $22
              AND dealer_id IS NOT DISTINCT FROM $23
              AND farmer_invitation_id IS NOT DISTINCT FROM $24
              AND farmer_user_id IS NOT DISTINCT FROM $25
            "#,
        )
        .bind(code.id)
        .bind(next.state)
        .bind(next.reserved_invitation_id)
        .bind(next.reserved_kind)
        .bind(next.reserved_at)
        .bind(next.dealer_id)
        .bind(next.farmer_invitation_id)
        .bind(next.farmer_user_id)
        .bind(code.is_used)
        .bind(code.is_active)
        .bind(code.used_by_user_id)
        .bind(code.used_at)
        .bind(code.created_subscription_id)
        .bind(code.transferred_at)
        .bind(code.transferred_by_user_id)
        .bind(code.reclaimed_at)
        .bind(code.reclaimed_by_user_id)
        .bind(code.distribution_date)
        .bind(&code.distribution_channel)
        .bind(&code.distributed_to)
        .bind(expected.state)
        .bind(expected.reserved_invitation_id)
        .bind(expected.dealer_id)
        .bind(expected.farmer_invitation_id)
        .bind(expected.farmer_user_id)
        .execute(&mut *conn)
        .await?;
        timer.record();
        Ok(result.rows_affected())
    }

    /// Inserts freshly issued, unheld codes in batches.
    pub async fn insert_unheld(
        &self,
        conn: &mut PgConnection,
        codes: &[SponsorshipCode],
    ) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("insert_codes");
        let mut inserted = 0;

        for chunk in codes.chunks(INSERT_CHUNK_SIZE) {
            let ids: Vec<Uuid> = chunk.iter().map(|c| c.id).collect();
            let values: Vec<String> = chunk.iter().map(|c| c.code.clone()).collect();
            let sponsors: Vec<Uuid> = chunk.iter().map(|c| c.sponsor_id).collect();
            let purchases: Vec<Uuid> = chunk.iter().map(|c| c.purchase_id).collect();
            let tiers: Vec<Uuid> = chunk.iter().map(|c| c.tier_id).collect();
            let expiries: Vec<DateTime<Utc>> = chunk.iter().map(|c| c.expiry_date).collect();
            let created: Vec<DateTime<Utc>> = chunk.iter().map(|c| c.created_at).collect();

            let result = sqlx::query(
                r#"
                INSERT INTO sponsorship_codes
                    (id, code, sponsor_id, purchase_id, tier_id, expiry_date, created_at, hold_state)
                SELECT id, code, sponsor_id, purchase_id, tier_id, expiry_date, created_at, $8
                FROM UNNEST($1::uuid[], $2::text[], $3::uuid[], $4::uuid[], $5::uuid[],
                            $6::timestamptz[], $7::timestamptz[])
                    AS t(id, code, sponsor_id, purchase_id, tier_id, expiry_date, created_at)
                "#,
            )
            .bind(&ids)
            .bind(&values)
            .bind(&sponsors)
            .bind(&purchases)
            .bind(&tiers)
            .bind(&expiries)
            .bind(&created)
            .bind(HoldStateDb::None)
            .execute(&mut *conn)
            .await?;
            inserted += result.rows_affected();
        }

        timer.record();
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_clauses_are_total() {
        assert!(order_clause(CodeOrder::ExpirySoonest).ends_with("id ASC"));
        assert!(order_clause(CodeOrder::OldestCreated).ends_with("id ASC"));
        assert!(order_clause(CodeOrder::ExpirySoonest).starts_with("expiry_date"));
    }
}
