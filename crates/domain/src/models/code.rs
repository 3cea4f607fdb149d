//! Sponsorship codes and the hold that a code carries while it moves
//! from a purchase to its recipient.

use chrono::{DateTime, Datelike, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::invitation::InvitationKind;

/// Distribution channel stamped on codes assigned through farmer invitations.
pub const FARMER_INVITATION_CHANNEL: &str = "FarmerInvitation";

lazy_static::lazy_static! {
    pub static ref SPONSORSHIP_CODE_REGEX: regex::Regex =
        regex::Regex::new(r"^(?i)[A-Z0-9]{2,10}-\d{4}-\d{4}[0-9A-F]{4}$").unwrap();
}

/// A soft, reversible claim of a code by a pending invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Reservation {
    pub invitation_id: Uuid,
    pub kind: InvitationKind,
    pub reserved_at: DateTime<Utc>,
}

/// The permanent holder of an assigned code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecipientRef {
    Dealer { dealer_id: Uuid },
    Farmer { invitation_id: Uuid, user_id: Uuid },
}

/// Marker carried by a code. A code has exactly one hold at a time, so a
/// reservation and an assignment can never coexist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "holder", rename_all = "snake_case")]
pub enum Hold {
    #[default]
    None,
    Reserved(Reservation),
    Assigned(RecipientRef),
}

impl Hold {
    pub fn is_none(&self) -> bool {
        matches!(self, Hold::None)
    }

    /// Invitation this hold reserves the code for, if any.
    pub fn reserved_for(&self) -> Option<Uuid> {
        match self {
            Hold::Reserved(r) => Some(r.invitation_id),
            _ => None,
        }
    }

    /// Dealer currently holding the code, if any.
    pub fn dealer(&self) -> Option<Uuid> {
        match self {
            Hold::Assigned(RecipientRef::Dealer { dealer_id }) => Some(*dealer_id),
            _ => None,
        }
    }
}

/// Mutually exclusive bucket a code falls into, evaluated in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeState {
    Used,
    Inactive,
    Expired,
    Reserved,
    Assigned,
    Available,
}

/// Outcome of checking whether a code can be redeemed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeValidity {
    Valid,
    NotFound,
    AlreadyUsed,
    Deactivated,
    Expired,
    Reserved,
}

impl CodeValidity {
    pub fn message(&self) -> &'static str {
        match self {
            CodeValidity::Valid => "Code is valid",
            CodeValidity::NotFound => "Invalid or expired sponsorship code",
            CodeValidity::AlreadyUsed => "Code has already been used",
            CodeValidity::Deactivated => "Code has been deactivated",
            CodeValidity::Expired => "Code has expired",
            CodeValidity::Reserved => "Code is reserved for a pending invitation",
        }
    }
}

impl std::fmt::Display for CodeValidity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// A single redeemable code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SponsorshipCode {
    pub id: Uuid,
    pub code: String,
    pub sponsor_id: Uuid,
    pub purchase_id: Uuid,
    pub tier_id: Uuid,
    pub hold: Hold,
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

impl SponsorshipCode {
    /// A fresh, unheld code belonging to a purchase.
    pub fn issue(
        code: String,
        sponsor_id: Uuid,
        purchase_id: Uuid,
        tier_id: Uuid,
        expiry_date: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            code,
            sponsor_id,
            purchase_id,
            tier_id,
            hold: Hold::None,
            is_used: false,
            is_active: true,
            expiry_date,
            created_at: now,
            used_by_user_id: None,
            used_at: None,
            created_subscription_id: None,
            transferred_at: None,
            transferred_by_user_id: None,
            reclaimed_at: None,
            reclaimed_by_user_id: None,
            distribution_date: None,
            distribution_channel: None,
            distributed_to: None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date <= now
    }

    /// Unused, active and unexpired, regardless of hold.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.is_used && self.is_active && !self.is_expired(now)
    }

    /// Valid and not held by anyone.
    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        self.is_valid(now) && self.hold.is_none()
    }

    pub fn state(&self, now: DateTime<Utc>) -> CodeState {
        if self.is_used {
            CodeState::Used
        } else if !self.is_active {
            CodeState::Inactive
        } else if self.is_expired(now) {
            CodeState::Expired
        } else {
            match self.hold {
                Hold::Reserved(_) => CodeState::Reserved,
                Hold::Assigned(_) => CodeState::Assigned,
                Hold::None => CodeState::Available,
            }
        }
    }

    pub fn validity(&self, now: DateTime<Utc>) -> CodeValidity {
        match self.state(now) {
            CodeState::Used => CodeValidity::AlreadyUsed,
            CodeState::Inactive => CodeValidity::Deactivated,
            CodeState::Expired => CodeValidity::Expired,
            CodeState::Reserved => CodeValidity::Reserved,
            CodeState::Assigned | CodeState::Available => CodeValidity::Valid,
        }
    }

    pub fn reserve(&mut self, kind: InvitationKind, invitation_id: Uuid, now: DateTime<Utc>) {
        self.hold = Hold::Reserved(Reservation {
            invitation_id,
            kind,
            reserved_at: now,
        });
    }

    /// Drops a reservation. Assignments are left untouched.
    pub fn release(&mut self) {
        if matches!(self.hold, Hold::Reserved(_)) {
            self.hold = Hold::None;
        }
    }

    pub fn assign_to_dealer(&mut self, dealer_id: Uuid, actor_id: Uuid, now: DateTime<Utc>) {
        self.hold = Hold::Assigned(RecipientRef::Dealer { dealer_id });
        self.transferred_at = Some(now);
        self.transferred_by_user_id = Some(actor_id);
    }

    pub fn assign_to_farmer(
        &mut self,
        invitation_id: Uuid,
        user_id: Uuid,
        distributed_to: Option<String>,
        now: DateTime<Utc>,
    ) {
        self.hold = Hold::Assigned(RecipientRef::Farmer {
            invitation_id,
            user_id,
        });
        self.distribution_date = Some(now);
        self.distribution_channel = Some(FARMER_INVITATION_CHANNEL.to_string());
        self.distributed_to = distributed_to;
    }

    /// Returns a dealer-held code to the sponsor's pool.
    pub fn reclaim(&mut self, actor_id: Uuid, now: DateTime<Utc>) {
        self.hold = Hold::None;
        self.reclaimed_at = Some(now);
        self.reclaimed_by_user_id = Some(actor_id);
    }

    pub fn redeem(&mut self, user_id: Uuid, subscription_id: Uuid, now: DateTime<Utc>) {
        self.is_used = true;
        self.used_by_user_id = Some(user_id);
        self.used_at = Some(now);
        self.created_subscription_id = Some(subscription_id);
    }
}

/// Per-bucket code counts. Every code lands in exactly one bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PoolStats {
    pub total: i64,
    pub available: i64,
    pub reserved: i64,
    pub assigned: i64,
    pub used: i64,
    pub expired: i64,
    pub inactive: i64,
}

impl PoolStats {
    pub fn record(&mut self, state: CodeState) {
        self.total += 1;
        match state {
            CodeState::Available => self.available += 1,
            CodeState::Reserved => self.reserved += 1,
            CodeState::Assigned => self.assigned += 1,
            CodeState::Used => self.used += 1,
            CodeState::Expired => self.expired += 1,
            CodeState::Inactive => self.inactive += 1,
        }
    }

    pub fn from_codes<'a>(
        codes: impl IntoIterator<Item = &'a SponsorshipCode>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut stats = Self::default();
        for code in codes {
            stats.record(code.state(now));
        }
        stats
    }

    /// Whether the buckets add up to the total.
    pub fn is_conserved(&self) -> bool {
        self.available + self.reserved + self.assigned + self.used + self.expired + self.inactive
            == self.total
    }
}

/// Generates a code in `{PREFIX}-{YEAR}-{NNNN}{XXXX}` format.
pub fn generate_sponsorship_code(prefix: &str, now: DateTime<Utc>) -> String {
    const HEX: &[u8] = b"0123456789ABCDEF";
    let mut rng = rand::thread_rng();
    let number: u16 = rng.gen_range(1000..=9999);
    let suffix: String = (0..4)
        .map(|_| HEX[rng.gen_range(0..HEX.len())] as char)
        .collect();

    format!("{}-{}-{}{}", prefix, now.year(), number, suffix)
}
