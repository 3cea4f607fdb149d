//! Invitation repository for database operations.

use chrono::{DateTime, Utc};
use domain::models::Invitation;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::entities::{
    DeliveryChannelDb, InvitationEntity, InvitationKindDb, InvitationStatusDb, InvitationTypeDb,
    INVITATION_COLUMNS,
};
use crate::metrics::QueryTimer;

/// Filter for a listing page, newest first.
#[derive(Debug, Clone)]
pub struct InvitationListFilter {
    pub sponsor_id: Uuid,
    pub kind: InvitationKindDb,
    pub status: Option<InvitationStatusDb>,
    pub after: Option<(DateTime<Utc>, Uuid)>,
    pub limit: i64,
    pub now: DateTime<Utc>,
}

/// Repository for invitation-related database operations.
#[derive(Clone)]
pub struct InvitationRepository {
    pool: PgPool,
}

impl InvitationRepository {
    /// Creates a new InvitationRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert a new invitation.
    pub async fn insert(
        &self,
        conn: &mut PgConnection,
        invitation: &Invitation,
    ) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("insert_invitation");
        let kind: InvitationKindDb = invitation.kind.into();
        let invitation_type: InvitationTypeDb = invitation.invitation_type.into();
        let status: InvitationStatusDb = invitation.status.into();
        let channel: Option<DeliveryChannelDb> = invitation.delivery.channel.map(Into::into);

        sqlx::query(
            r#"
            INSERT INTO sponsorship_invitations (
                id, kind, sponsor_id, invitation_type, recipient_name, recipient_email,
                recipient_phone, token, code_count, package_tier, tier_id, purchase_id, status,
                created_at, expires_at, accepted_at, accepted_by_user_id, cancelled_at,
                cancelled_by_user_id, link_sent_via, link_sent_at, link_delivered,
                provider_message_id, delivery_error, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                    $18, $19, $20, $21, $22, $23, $24, $25)
            "#,
        )
        .bind(invitation.id)
        .bind(kind)
        .bind(invitation.sponsor_id)
        .bind(invitation_type)
        .bind(&invitation.recipient.name)
        .bind(&invitation.recipient.email)
        .bind(&invitation.recipient.phone)
        .bind(&invitation.token)
        .bind(invitation.code_count)
        .bind(invitation.package_tier.map(|t| t.as_str()))
        .bind(invitation.tier_id)
        .bind(invitation.purchase_id)
        .bind(status)
        .bind(invitation.created_at)
        .bind(invitation.expires_at)
        .bind(invitation.accepted_at)
        .bind(invitation.accepted_by_user_id)
        .bind(invitation.cancelled_at)
        .bind(invitation.cancelled_by_user_id)
        .bind(channel)
        .bind(invitation.delivery.sent_at)
        .bind(invitation.delivery.delivered)
        .bind(&invitation.delivery.provider_message_id)
        .bind(&invitation.delivery.error)
        .bind(&invitation.notes)
        .execute(&mut *conn)
        .await?;
        timer.record();
        Ok(())
    }

    /// Update the mutable fields of an invitation. Returns rows affected.
    pub async fn update(
        &self,
        conn: &mut PgConnection,
        invitation: &Invitation,
    ) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("update_invitation");
        let status: InvitationStatusDb = invitation.status.into();
        let channel: Option<DeliveryChannelDb> = invitation.delivery.channel.map(Into::into);

        let result = sqlx::query(
            r#"
            UPDATE sponsorship_invitations
            SET status = $2,
                expires_at = $3,
                accepted_at = $4,
                accepted_by_user_id = $5,
                cancelled_at = $6,
                cancelled_by_user_id = $7,
                link_sent_via = $8,
                link_sent_at = $9,
                link_delivered = $10,
                provider_message_id = $11,
                delivery_error = $12,
                notes = $13
            WHERE id = $1
            "#,
        )
        .bind(invitation.id)
        .bind(status)
        .bind(invitation.expires_at)
        .bind(invitation.accepted_at)
        .bind(invitation.accepted_by_user_id)
        .bind(invitation.cancelled_at)
        .bind(invitation.cancelled_by_user_id)
        .bind(channel)
        .bind(invitation.delivery.sent_at)
        .bind(invitation.delivery.delivered)
        .bind(&invitation.delivery.provider_message_id)
        .bind(&invitation.delivery.error)
        .bind(&invitation.notes)
        .execute(&mut *conn)
        .await?;
        timer.record();
        Ok(result.rows_affected())
    }

    /// Find invitation by ID.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<InvitationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_invitation_by_id");
        let sql = format!(
            "SELECT {} FROM sponsorship_invitations WHERE id = $1",
            INVITATION_COLUMNS
        );
        let result = sqlx::query_as::<_, InvitationEntity>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await;
        timer.record();
        result
    }

    /// Lock invitation by ID.
    pub async fn lock_by_id(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<InvitationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("lock_invitation_by_id");
        let sql = format!(
            "SELECT {} FROM sponsorship_invitations WHERE id = $1 FOR UPDATE",
            INVITATION_COLUMNS
        );
        let result = sqlx::query_as::<_, InvitationEntity>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await;
        timer.record();
        result
    }

    /// Lock invitation by token and kind.
    pub async fn lock_by_token(
        &self,
        conn: &mut PgConnection,
        kind: InvitationKindDb,
        token: &str,
    ) -> Result<Option<InvitationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("lock_invitation_by_token");
        let sql = format!(
            "SELECT {} FROM sponsorship_invitations WHERE token = $1 AND kind = $2 FOR UPDATE",
            INVITATION_COLUMNS
        );
        let result = sqlx::query_as::<_, InvitationEntity>(&sql)
            .bind(token)
            .bind(kind)
            .fetch_optional(&mut *conn)
            .await;
        timer.record();
        result
    }

    /// Lock pending invitations past their expiry, skipping rows in use.
    pub async fn lock_overdue(
        &self,
        conn: &mut PgConnection,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<InvitationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("lock_overdue_invitations");
        let sql = format!(
            r#"
            SELECT {} FROM sponsorship_invitations
            WHERE status = 'pending' AND expires_at < $1
            ORDER BY expires_at ASC, id ASC
            LIMIT $2
            FOR UPDATE SKIP LOCKED
            "#,
            INVITATION_COLUMNS
        );
        let result = sqlx::query_as::<_, InvitationEntity>(&sql)
            .bind(now)
            .bind(limit)
            .fetch_all(&mut *conn)
            .await;
        timer.record();
        result
    }

    /// Lock accepted dealer invitations from a sponsor to a dealer.
    pub async fn lock_accepted_dealer(
        &self,
        conn: &mut PgConnection,
        sponsor_id: Uuid,
        dealer_id: Uuid,
    ) -> Result<Vec<InvitationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("lock_accepted_dealer_invitations");
        let sql = format!(
            r#"
            SELECT {} FROM sponsorship_invitations
            WHERE kind = 'dealer'
              AND status = 'accepted'
              AND sponsor_id = $1
              AND accepted_by_user_id = $2
            ORDER BY accepted_at ASC, id ASC
            FOR UPDATE
            "#,
            INVITATION_COLUMNS
        );
        let result = sqlx::query_as::<_, InvitationEntity>(&sql)
            .bind(sponsor_id)
            .bind(dealer_id)
            .fetch_all(&mut *conn)
            .await;
        timer.record();
        result
    }

    /// List a sponsor's invitations of one kind, newest first.
    ///
    /// The status filter matches the effective status, so an overdue pending
    /// row is listed as expired before the sweep reaches it.
    pub async fn list(
        &self,
        filter: &InvitationListFilter,
    ) -> Result<Vec<InvitationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_invitations");
        let (cursor_created_at, cursor_id) = filter.after.unzip();
        let sql = format!(
            r#"
            SELECT {} FROM sponsorship_invitations
            WHERE sponsor_id = $1
              AND kind = $2
              AND ($3::invitation_status IS NULL OR
                   (CASE WHEN status = 'pending' AND expires_at < $4
                         THEN 'expired'::invitation_status
                         ELSE status END) = $3)
              AND ($5::timestamptz IS NULL OR (created_at, id) < ($5, $6))
            ORDER BY created_at DESC, id DESC
            LIMIT $7
            "#,
            INVITATION_COLUMNS
        );
        let result = sqlx::query_as::<_, InvitationEntity>(&sql)
            .bind(filter.sponsor_id)
            .bind(filter.kind)
            .bind(filter.status)
            .bind(filter.now)
            .bind(cursor_created_at)
            .bind(cursor_id)
            .bind(filter.limit)
            .fetch_all(&self.pool)
            .await;
        timer.record();
        result
    }
}

#[cfg(test)]
mod tests {
    // Note: InvitationRepository tests require database connection and are covered by integration tests
}
