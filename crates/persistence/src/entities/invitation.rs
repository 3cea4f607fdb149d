//! Invitation entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::error::StoreError;
use domain::models::{
    DeliveryChannel, DeliveryStatus, Invitation, InvitationKind, InvitationStatus, InvitationType,
    Recipient, TierName,
};
use sqlx::FromRow;
use uuid::Uuid;

/// Columns selected for every invitation read, in entity order.
pub const INVITATION_COLUMNS: &str = r#"
    id, kind, sponsor_id, invitation_type, recipient_name, recipient_email, recipient_phone,
    token, code_count, package_tier, tier_id, purchase_id, status, created_at, expires_at,
    accepted_at, accepted_by_user_id, cancelled_at, cancelled_by_user_id,
    link_sent_via, link_sent_at, link_delivered, provider_message_id, delivery_error, notes
"#;

/// Database enum for invitation_kind that maps to PostgreSQL enum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "invitation_kind", rename_all = "lowercase")]
pub enum InvitationKindDb {
    Dealer,
    Farmer,
}

impl From<InvitationKindDb> for InvitationKind {
    fn from(db: InvitationKindDb) -> Self {
        match db {
            InvitationKindDb::Dealer => InvitationKind::Dealer,
            InvitationKindDb::Farmer => InvitationKind::Farmer,
        }
    }
}

impl From<InvitationKind> for InvitationKindDb {
    fn from(kind: InvitationKind) -> Self {
        match kind {
            InvitationKind::Dealer => InvitationKindDb::Dealer,
            InvitationKind::Farmer => InvitationKindDb::Farmer,
        }
    }
}

/// Database enum for invitation_status that maps to PostgreSQL enum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "invitation_status", rename_all = "lowercase")]
pub enum InvitationStatusDb {
    Pending,
    Accepted,
    Expired,
    Cancelled,
    Reclaimed,
}

impl From<InvitationStatusDb> for InvitationStatus {
    fn from(db: InvitationStatusDb) -> Self {
        match db {
            InvitationStatusDb::Pending => InvitationStatus::Pending,
            InvitationStatusDb::Accepted => InvitationStatus::Accepted,
            InvitationStatusDb::Expired => InvitationStatus::Expired,
            InvitationStatusDb::Cancelled => InvitationStatus::Cancelled,
            InvitationStatusDb::Reclaimed => InvitationStatus::Reclaimed,
        }
    }
}

impl From<InvitationStatus> for InvitationStatusDb {
    fn from(status: InvitationStatus) -> Self {
        match status {
            InvitationStatus::Pending => InvitationStatusDb::Pending,
            InvitationStatus::Accepted => InvitationStatusDb::Accepted,
            InvitationStatus::Expired => InvitationStatusDb::Expired,
            InvitationStatus::Cancelled => InvitationStatusDb::Cancelled,
            InvitationStatus::Reclaimed => InvitationStatusDb::Reclaimed,
        }
    }
}

/// Database enum for invitation_type that maps to PostgreSQL enum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "invitation_type", rename_all = "snake_case")]
pub enum InvitationTypeDb {
    Invite,
    AutoCreate,
}

impl From<InvitationTypeDb> for InvitationType {
    fn from(db: InvitationTypeDb) -> Self {
        match db {
            InvitationTypeDb::Invite => InvitationType::Invite,
            InvitationTypeDb::AutoCreate => InvitationType::AutoCreate,
        }
    }
}

impl From<InvitationType> for InvitationTypeDb {
    fn from(kind: InvitationType) -> Self {
        match kind {
            InvitationType::Invite => InvitationTypeDb::Invite,
            InvitationType::AutoCreate => InvitationTypeDb::AutoCreate,
        }
    }
}

/// Database enum for delivery_channel that maps to PostgreSQL enum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "delivery_channel", rename_all = "lowercase")]
pub enum DeliveryChannelDb {
    Sms,
    Whatsapp,
}

impl From<DeliveryChannelDb> for DeliveryChannel {
    fn from(db: DeliveryChannelDb) -> Self {
        match db {
            DeliveryChannelDb::Sms => DeliveryChannel::Sms,
            DeliveryChannelDb::Whatsapp => DeliveryChannel::WhatsApp,
        }
    }
}

impl From<DeliveryChannel> for DeliveryChannelDb {
    fn from(channel: DeliveryChannel) -> Self {
        match channel {
            DeliveryChannel::Sms => DeliveryChannelDb::Sms,
            DeliveryChannel::WhatsApp => DeliveryChannelDb::Whatsapp,
        }
    }
}

/// Database row mapping for the sponsorship_invitations table.
#[derive(Debug, Clone, FromRow)]
pub struct InvitationEntity {
    pub id: Uuid,
    pub kind: InvitationKindDb,
    pub sponsor_id: Uuid,
    pub invitation_type: InvitationTypeDb,
    pub recipient_name: Option<String>,
    pub recipient_email: Option<String>,
    pub recipient_phone: Option<String>,
    pub token: String,
    pub code_count: i32,
    pub package_tier: Option<String>,
    pub tier_id: Option<Uuid>,
    pub purchase_id: Option<Uuid>,
    pub status: InvitationStatusDb,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub accepted_by_user_id: Option<Uuid>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by_user_id: Option<Uuid>,
    pub link_sent_via: Option<DeliveryChannelDb>,
    pub link_sent_at: Option<DateTime<Utc>>,
    pub link_delivered: bool,
    pub provider_message_id: Option<String>,
    pub delivery_error: Option<String>,
    pub notes: Option<String>,
}

impl TryFrom<InvitationEntity> for Invitation {
    type Error = StoreError;

    fn try_from(entity: InvitationEntity) -> Result<Self, Self::Error> {
        let package_tier = entity
            .package_tier
            .as_deref()
            .map(str::parse::<TierName>)
            .transpose()
            .map_err(|e| StoreError::Backend(format!("Invitation {}: {}", entity.id, e)))?;

        Ok(Self {
            id: entity.id,
            kind: entity.kind.into(),
            sponsor_id: entity.sponsor_id,
            invitation_type: entity.invitation_type.into(),
            recipient: Recipient {
                name: entity.recipient_name,
                email: entity.recipient_email,
                phone: entity.recipient_phone,
            },
            token: entity.token,
            code_count: entity.code_count,
            package_tier,
            tier_id: entity.tier_id,
            purchase_id: entity.purchase_id,
            status: entity.status.into(),
            created_at: entity.created_at,
            expires_at: entity.expires_at,
            accepted_at: entity.accepted_at,
            accepted_by_user_id: entity.accepted_by_user_id,
            cancelled_at: entity.cancelled_at,
            cancelled_by_user_id: entity.cancelled_by_user_id,
            delivery: DeliveryStatus {
                channel: entity.link_sent_via.map(Into::into),
                sent_at: entity.link_sent_at,
                delivered: entity.link_delivered,
                provider_message_id: entity.provider_message_id,
                error: entity.delivery_error,
            },
            notes: entity.notes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entity() -> InvitationEntity {
        let now = Utc::now();
        InvitationEntity {
            id: Uuid::new_v4(),
            kind: InvitationKindDb::Farmer,
            sponsor_id: Uuid::new_v4(),
            invitation_type: InvitationTypeDb::Invite,
            recipient_name: Some("Ayse".to_string()),
            recipient_email: None,
            recipient_phone: Some("05556866386".to_string()),
            token: "a".repeat(32),
            code_count: 2,
            package_tier: Some("M".to_string()),
            tier_id: Some(Uuid::new_v4()),
            purchase_id: None,
            status: InvitationStatusDb::Pending,
            created_at: now,
            expires_at: now + Duration::days(7),
            accepted_at: None,
            accepted_by_user_id: None,
            cancelled_at: None,
            cancelled_by_user_id: None,
            link_sent_via: Some(DeliveryChannelDb::Whatsapp),
            link_sent_at: Some(now),
            link_delivered: false,
            provider_message_id: None,
            delivery_error: Some("timeout".to_string()),
            notes: None,
        }
    }

    #[test]
    fn test_entity_maps_delivery_and_tier() {
        let invitation = Invitation::try_from(entity()).unwrap();
        assert_eq!(invitation.package_tier, Some(TierName::M));
        assert_eq!(invitation.delivery.channel, Some(DeliveryChannel::WhatsApp));
        assert_eq!(invitation.delivery.error.as_deref(), Some("timeout"));
        assert_eq!(invitation.recipient.phone.as_deref(), Some("05556866386"));
    }

    #[test]
    fn test_unknown_tier_is_backend_error() {
        let mut row = entity();
        row.package_tier = Some("XXL".to_string());
        assert!(matches!(
            Invitation::try_from(row),
            Err(StoreError::Backend(_))
        ));
    }
}
