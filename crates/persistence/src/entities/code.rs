//! Sponsorship code entity (database row mapping).
//!
//! The hold of a code is stored as a `hold_state` discriminant plus holder
//! columns. A CHECK constraint keeps the holder columns consistent with the
//! discriminant, so a row can never carry a reservation and an assignment
//! at the same time.

use chrono::{DateTime, Utc};
use domain::error::StoreError;
use domain::models::{Hold, RecipientRef, Reservation, SponsorshipCode};
use sqlx::FromRow;
use uuid::Uuid;

use super::invitation::InvitationKindDb;

/// Columns selected for every code read, in entity order.
pub const CODE_COLUMNS: &str = r#"
    id, code, sponsor_id, purchase_id, tier_id,
    hold_state, reserved_invitation_id, reserved_kind, reserved_at,
    dealer_id, farmer_invitation_id, farmer_user_id,
    is_used, is_active, expiry_date, created_at, used_by_user_id, used_at,
    created_subscription_id, transferred_at, transferred_by_user_id,
    reclaimed_at, reclaimed_by_user_id, distribution_date, distribution_channel, distributed_to
"#;

/// Database enum for hold_state that maps to PostgreSQL enum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "hold_state", rename_all = "lowercase")]
pub enum HoldStateDb {
    None,
    Reserved,
    Assigned,
}

/// Column values for one hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoldColumns {
    pub state: HoldStateDb,
    pub reserved_invitation_id: Option<Uuid>,
    pub reserved_kind: Option<InvitationKindDb>,
    pub reserved_at: Option<DateTime<Utc>>,
    pub dealer_id: Option<Uuid>,
    pub farmer_invitation_id: Option<Uuid>,
    pub farmer_user_id: Option<Uuid>,
}

impl From<&Hold> for HoldColumns {
    fn from(hold: &Hold) -> Self {
        let empty = Self {
            state: HoldStateDb::None,
            reserved_invitation_id: None,
            reserved_kind: None,
            reserved_at: None,
            dealer_id: None,
            farmer_invitation_id: None,
            farmer_user_id: None,
        };

        match *hold {
            Hold::None => empty,
            Hold::Reserved(r) => Self {
                state: HoldStateDb::Reserved,
                reserved_invitation_id: Some(r.invitation_id),
                reserved_kind: Some(r.kind.into()),
                reserved_at: Some(r.reserved_at),
                ..empty
            },
            Hold::Assigned(RecipientRef::Dealer { dealer_id }) => Self {
                state: HoldStateDb::Assigned,
                dealer_id: Some(dealer_id),
                ..empty
            },
            Hold::Assigned(RecipientRef::Farmer {
                invitation_id,
                user_id,
            }) => Self {
                state: HoldStateDb::Assigned,
                farmer_invitation_id: Some(invitation_id),
                farmer_user_id: Some(user_id),
                ..empty
            },
        }
    }
}

impl TryFrom<HoldColumns> for Hold {
    type Error = String;

    fn try_from(columns: HoldColumns) -> Result<Self, Self::Error> {
        match columns.state {
            HoldStateDb::None => Ok(Hold::None),
            HoldStateDb::Reserved => match (
                columns.reserved_invitation_id,
                columns.reserved_kind,
                columns.reserved_at,
            ) {
                (Some(invitation_id), Some(kind), Some(reserved_at)) => {
                    Ok(Hold::Reserved(Reservation {
                        invitation_id,
                        kind: kind.into(),
                        reserved_at,
                    }))
                }
                _ => Err("reserved hold without reservation columns".to_string()),
            },
            HoldStateDb::Assigned => match (
                columns.dealer_id,
                columns.farmer_invitation_id,
                columns.farmer_user_id,
            ) {
                (Some(dealer_id), None, None) => {
                    Ok(Hold::Assigned(RecipientRef::Dealer { dealer_id }))
                }
                (None, Some(invitation_id), Some(user_id)) => {
                    Ok(Hold::Assigned(RecipientRef::Farmer {
                        invitation_id,
                        user_id,
                    }))
                }
                _ => Err("assigned hold without a single holder".to_string()),
            },
        }
    }
}

/// Database row mapping for the sponsorship_codes table.
#[derive(Debug, Clone, FromRow)]
pub struct SponsorshipCodeEntity {
    pub id: Uuid,
    pub code: String,
    pub sponsor_id: Uuid,
    pub purchase_id: Uuid,
    pub tier_id: Uuid,
    pub hold_state: HoldStateDb,
    pub reserved_invitation_id: Option<Uuid>,
    pub reserved_kind: Option<InvitationKindDb>,
    pub reserved_at: Option<DateTime<Utc>>,
    pub dealer_id: Option<Uuid>,
    pub farmer_invitation_id: Option<Uuid>,
    pub farmer_user_id: Option<Uuid>,
    pub is_used: bool,
    pub is_active: bool,
    pub expiry_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub used_by_user_id: Option<Uuid>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_subscription_id: Option<Uuid>,
    pub transferred_at: Option<DateTime<Utc>>,
    pub transferred_by_user_id: Option<Uuid>,
    pub reclaimed_at: Option<DateTime<Utc>>,
    pub reclaimed_by_user_id: Option<Uuid>,
    pub distribution_date: Option<DateTime<Utc>>,
    pub distribution_channel: Option<String>,
    pub distributed_to: Option<String>,
}

impl SponsorshipCodeEntity {
    pub fn hold_columns(&self) -> HoldColumns {
        HoldColumns {
            state: self.hold_state,
            reserved_invitation_id: self.reserved_invitation_id,
            reserved_kind: self.reserved_kind,
            reserved_at: self.reserved_at,
            dealer_id: self.dealer_id,
            farmer_invitation_id: self.farmer_invitation_id,
            farmer_user_id: self.farmer_user_id,
        }
    }
}

impl TryFrom<SponsorshipCodeEntity> for SponsorshipCode {
    type Error = StoreError;

    fn try_from(entity: SponsorshipCodeEntity) -> Result<Self, Self::Error> {
        let hold = Hold::try_from(entity.hold_columns())
            .map_err(|e| StoreError::Backend(format!("Code {}: {}", entity.id, e)))?;

        Ok(Self {
            id: entity.id,
            code: entity.code,
            sponsor_id: entity.sponsor_id,
            purchase_id: entity.purchase_id,
            tier_id: entity.tier_id,
            hold,
            is_used: entity.is_used,
            is_active: entity.is_active,
            expiry_date: entity.expiry_date,
            created_at: entity.created_at,
            used_by_user_id: entity.used_by_user_id,
            used_at: entity.used_at,
            created_subscription_id: entity.created_subscription_id,
            transferred_at: entity.transferred_at,
            transferred_by_user_id: entity.transferred_by_user_id,
            reclaimed_at: entity.reclaimed_at,
            reclaimed_by_user_id: entity.reclaimed_by_user_id,
            distribution_date: entity.distribution_date,
            distribution_channel: entity.distribution_channel,
            distributed_to: entity.distributed_to,
        })
    }
}

/// Per-bucket counts computed by the pool statistics query.
#[derive(Debug, Clone, Copy, FromRow)]
pub struct PoolStatsEntity {
    pub total: i64,
    pub available: i64,
    pub reserved: i64,
    pub assigned: i64,
    pub used: i64,
    pub expired: i64,
    pub inactive: i64,
}

impl From<PoolStatsEntity> for domain::models::PoolStats {
    fn from(entity: PoolStatsEntity) -> Self {
        Self {
            total: entity.total,
            available: entity.available,
            reserved: entity.reserved,
            assigned: entity.assigned,
            used: entity.used,
            expired: entity.expired,
            inactive: entity.inactive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::InvitationKind;

    #[test]
    fn test_hold_columns_round_trip_each_variant() {
        let holds = [
            Hold::None,
            Hold::Reserved(Reservation {
                invitation_id: Uuid::new_v4(),
                kind: InvitationKind::Dealer,
                reserved_at: Utc::now(),
            }),
            Hold::Assigned(RecipientRef::Dealer {
                dealer_id: Uuid::new_v4(),
            }),
            Hold::Assigned(RecipientRef::Farmer {
                invitation_id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
            }),
        ];

        for hold in holds {
            let columns = HoldColumns::from(&hold);
            assert_eq!(Hold::try_from(columns).unwrap(), hold);
        }
    }

    #[test]
    fn test_reserved_columns_never_carry_holders() {
        let columns = HoldColumns::from(&Hold::Reserved(Reservation {
            invitation_id: Uuid::new_v4(),
            kind: InvitationKind::Farmer,
            reserved_at: Utc::now(),
        }));
        assert_eq!(columns.state, HoldStateDb::Reserved);
        assert!(columns.dealer_id.is_none());
        assert!(columns.farmer_user_id.is_none());
    }

    #[test]
    fn test_assigned_with_two_holders_is_rejected() {
        let columns = HoldColumns {
            state: HoldStateDb::Assigned,
            reserved_invitation_id: None,
            reserved_kind: None,
            reserved_at: None,
            dealer_id: Some(Uuid::new_v4()),
            farmer_invitation_id: Some(Uuid::new_v4()),
            farmer_user_id: Some(Uuid::new_v4()),
        };
        assert!(Hold::try_from(columns).is_err());
    }
}
