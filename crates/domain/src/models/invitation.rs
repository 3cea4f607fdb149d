//! Dealer and farmer invitations. Both kinds share one shape and one
//! lifecycle: Pending, then Accepted, Expired, Cancelled or Reclaimed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::tier::TierName;
use shared::phone::{emails_match, normalize_email, normalize_phone, phones_match};

/// Which recipient path an invitation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationKind {
    Dealer,
    Farmer,
}

impl std::fmt::Display for InvitationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvitationKind::Dealer => write!(f, "dealer"),
            InvitationKind::Farmer => write!(f, "farmer"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Expired,
    Cancelled,
    Reclaimed,
}

impl InvitationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, InvitationStatus::Pending)
    }
}

impl std::fmt::Display for InvitationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvitationStatus::Pending => write!(f, "pending"),
            InvitationStatus::Accepted => write!(f, "accepted"),
            InvitationStatus::Expired => write!(f, "expired"),
            InvitationStatus::Cancelled => write!(f, "cancelled"),
            InvitationStatus::Reclaimed => write!(f, "reclaimed"),
        }
    }
}

/// How a dealer invitation is fulfilled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationType {
    /// Recipient signs up and accepts with the token.
    #[default]
    Invite,
    /// A dealer account is provisioned and codes are assigned at creation.
    AutoCreate,
}

/// Outbound channel for the invitation link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryChannel {
    #[serde(rename = "sms")]
    Sms,
    #[serde(rename = "whatsapp")]
    WhatsApp,
}

impl std::fmt::Display for DeliveryChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryChannel::Sms => write!(f, "sms"),
            DeliveryChannel::WhatsApp => write!(f, "whatsapp"),
        }
    }
}

/// Who the invitation is addressed to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Recipient {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl Recipient {
    /// Trims fields, drops empty ones, normalizes email and phone.
    pub fn normalized(self) -> Self {
        let clean = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        Self {
            name: clean(self.name),
            email: clean(self.email).map(|e| normalize_email(&e)),
            phone: clean(self.phone).map(|p| normalize_phone(&p)),
        }
    }
}

/// Delivery metadata recorded after the link is dispatched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DeliveryStatus {
    pub channel: Option<DeliveryChannel>,
    pub sent_at: Option<DateTime<Utc>>,
    pub delivered: bool,
    pub provider_message_id: Option<String>,
    pub error: Option<String>,
}

/// The authenticated caller attempting to accept an invitation.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Invitation {
    pub id: Uuid,
    pub kind: InvitationKind,
    pub sponsor_id: Uuid,
    pub invitation_type: InvitationType,
    pub recipient: Recipient,
    #[serde(skip_serializing)]
    pub token: String,
    pub code_count: i32,
    pub package_tier: Option<TierName>,
    pub tier_id: Option<Uuid>,
    pub purchase_id: Option<Uuid>,
    pub status: InvitationStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    /// Farmer user or dealer account that took the codes.
    pub accepted_by_user_id: Option<Uuid>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by_user_id: Option<Uuid>,
    pub delivery: DeliveryStatus,
    pub notes: Option<String>,
}

impl Invitation {
    pub fn is_pending(&self) -> bool {
        self.status == InvitationStatus::Pending
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// Status as seen by readers: a pending invitation past its expiry
    /// reads as expired even before the transition is written.
    pub fn effective_status(&self, now: DateTime<Utc>) -> InvitationStatus {
        if self.is_pending() && self.is_expired(now) {
            InvitationStatus::Expired
        } else {
            self.status
        }
    }

    /// Dealers match on email or phone; farmers must match on phone.
    pub fn is_addressed_to(&self, caller: &Caller) -> bool {
        let phone_matches = match (&self.recipient.phone, &caller.phone) {
            (Some(expected), Some(actual)) => phones_match(expected, actual),
            _ => false,
        };

        match self.kind {
            InvitationKind::Farmer => phone_matches,
            InvitationKind::Dealer => {
                let email_matches = match (&self.recipient.email, &caller.email) {
                    (Some(expected), Some(actual)) => emails_match(expected, actual),
                    _ => false,
                };
                email_matches || phone_matches
            }
        }
    }

    pub fn mark_accepted(&mut self, user_id: Uuid, now: DateTime<Utc>) {
        self.status = InvitationStatus::Accepted;
        self.accepted_at = Some(now);
        self.accepted_by_user_id = Some(user_id);
    }

    pub fn mark_expired(&mut self) {
        self.status = InvitationStatus::Expired;
    }

    pub fn mark_cancelled(&mut self, actor_id: Uuid, now: DateTime<Utc>) {
        self.status = InvitationStatus::Cancelled;
        self.cancelled_at = Some(now);
        self.cancelled_by_user_id = Some(actor_id);
    }

    pub fn mark_reclaimed(&mut self, note: &str) {
        self.status = InvitationStatus::Reclaimed;
        self.append_note(note);
    }

    pub fn append_note(&mut self, note: &str) {
        self.notes = Some(match self.notes.take() {
            Some(existing) if !existing.is_empty() => format!("{}\n{}", existing, note),
            _ => note.to_string(),
        });
    }
}

/// Input for creating an invitation of either kind.
#[derive(Debug, Clone)]
pub struct NewInvitation {
    pub kind: InvitationKind,
    pub invitation_type: InvitationType,
    pub recipient: Recipient,
    pub code_count: i32,
    pub package_tier: Option<String>,
    pub purchase_id: Option<Uuid>,
    pub channel: Option<DeliveryChannel>,
    pub notes: Option<String>,
}

impl From<CreateDealerInvitationRequest> for NewInvitation {
    fn from(req: CreateDealerInvitationRequest) -> Self {
        Self {
            kind: InvitationKind::Dealer,
            invitation_type: req.invitation_type,
            recipient: Recipient {
                name: req.dealer_name,
                email: req.email,
                phone: req.phone,
            },
            code_count: req.code_count,
            package_tier: req.package_tier,
            purchase_id: req.purchase_id,
            channel: req.channel,
            notes: req.notes,
        }
    }
}

impl From<CreateFarmerInvitationRequest> for NewInvitation {
    fn from(req: CreateFarmerInvitationRequest) -> Self {
        Self {
            kind: InvitationKind::Farmer,
            invitation_type: InvitationType::Invite,
            recipient: Recipient {
                name: req.farmer_name,
                email: req.email,
                phone: Some(req.phone),
            },
            code_count: req.code_count,
            package_tier: req.package_tier,
            purchase_id: None,
            channel: req.channel,
            notes: req.notes,
        }
    }
}

impl BulkFarmerRecipient {
    pub fn into_new_invitation(self, channel: Option<DeliveryChannel>) -> NewInvitation {
        NewInvitation {
            kind: InvitationKind::Farmer,
            invitation_type: InvitationType::Invite,
            recipient: Recipient {
                name: self.farmer_name,
                email: self.email,
                phone: Some(self.phone),
            },
            code_count: self.code_count,
            package_tier: self.package_tier,
            purchase_id: None,
            channel,
            notes: self.notes,
        }
    }
}

// ============================================================================
// Request / response types
// ============================================================================

/// Request to invite a dealer.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct CreateDealerInvitationRequest {
    #[serde(default)]
    pub invitation_type: InvitationType,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(custom(function = "shared::validation::validate_phone"))]
    pub phone: Option<String>,

    #[validate(length(max = 200, message = "Dealer name must be at most 200 characters"))]
    pub dealer_name: Option<String>,

    #[validate(range(min = 1, max = 10000, message = "code_count must be between 1 and 10000"))]
    pub code_count: i32,

    #[validate(custom(function = "shared::validation::validate_tier_name"))]
    pub package_tier: Option<String>,

    pub purchase_id: Option<Uuid>,

    pub channel: Option<DeliveryChannel>,

    #[validate(length(max = 1000, message = "Notes must be at most 1000 characters"))]
    pub notes: Option<String>,
}

/// Request to invite a farmer.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct CreateFarmerInvitationRequest {
    #[validate(custom(function = "shared::validation::validate_phone"))]
    pub phone: String,

    #[validate(length(max = 200, message = "Farmer name must be at most 200 characters"))]
    pub farmer_name: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(range(min = 1, max = 1000, message = "code_count must be between 1 and 1000"))]
    #[serde(default = "default_farmer_code_count")]
    pub code_count: i32,

    #[validate(custom(function = "shared::validation::validate_tier_name"))]
    pub package_tier: Option<String>,

    pub channel: Option<DeliveryChannel>,

    #[validate(length(max = 1000, message = "Notes must be at most 1000 characters"))]
    pub notes: Option<String>,
}

fn default_farmer_code_count() -> i32 {
    1
}

/// One row of a bulk farmer invitation.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct BulkFarmerRecipient {
    pub phone: String,
    pub farmer_name: Option<String>,
    pub email: Option<String>,
    pub package_tier: Option<String>,
    #[serde(default = "default_farmer_code_count")]
    pub code_count: i32,
    pub notes: Option<String>,
}

/// Request to invite many farmers at once.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct BulkFarmerInvitationRequest {
    #[validate(length(min = 1, max = 500, message = "Between 1 and 500 recipients allowed"))]
    pub recipients: Vec<BulkFarmerRecipient>,
    pub channel: Option<DeliveryChannel>,
}

/// Request to accept an invitation by token.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct AcceptInvitationRequest {
    #[validate(length(min = 1, max = 128, message = "Invalid invitation token"))]
    pub token: String,
}

/// Request to re-send an invitation link.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ResendInvitationRequest {
    pub channel: DeliveryChannel,
}

/// Query parameters for invitation listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ListInvitationsQuery {
    pub status: Option<InvitationStatus>,
    pub cursor: Option<String>,
    pub limit: Option<i64>,
}

/// Invitation as returned to the owning sponsor.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct InvitationResponse {
    pub id: Uuid,
    pub kind: InvitationKind,
    pub invitation_type: InvitationType,
    pub recipient: Recipient,
    pub code_count: i32,
    pub package_tier: Option<TierName>,
    pub purchase_id: Option<Uuid>,
    pub status: InvitationStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub accepted_by_user_id: Option<Uuid>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub delivery: DeliveryStatus,
    pub notes: Option<String>,
}

impl InvitationResponse {
    /// Builds the response using the effective status at `now`.
    pub fn from_invitation(invitation: &Invitation, now: DateTime<Utc>) -> Self {
        Self {
            id: invitation.id,
            kind: invitation.kind,
            invitation_type: invitation.invitation_type,
            recipient: invitation.recipient.clone(),
            code_count: invitation.code_count,
            package_tier: invitation.package_tier,
            purchase_id: invitation.purchase_id,
            status: invitation.effective_status(now),
            created_at: invitation.created_at,
            expires_at: invitation.expires_at,
            accepted_at: invitation.accepted_at,
            accepted_by_user_id: invitation.accepted_by_user_id,
            cancelled_at: invitation.cancelled_at,
            delivery: invitation.delivery.clone(),
            notes: invitation.notes.clone(),
        }
    }
}

/// Response after creating an invitation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct CreateInvitationResponse {
    pub invitation: InvitationResponse,
    pub token: String,
    pub invitation_link: String,
    pub code_ids: Vec<Uuid>,
    /// Only present for auto-created dealer accounts, shown once.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temporary_password: Option<String>,
}

/// Response after accepting an invitation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct AcceptInvitationResponse {
    pub invitation_id: Uuid,
    pub status: InvitationStatus,
    pub code_ids: Vec<Uuid>,
    pub codes: Vec<String>,
    pub accepted_at: DateTime<Utc>,
}

/// Response after cancelling an invitation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct CancelInvitationResponse {
    pub invitation_id: Uuid,
    pub status: InvitationStatus,
    pub released_count: usize,
}

/// One row of a bulk invitation result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct BulkInvitationRow {
    pub phone: String,
    pub success: bool,
    pub invitation_id: Option<Uuid>,
    pub error: Option<String>,
    pub delivered: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct BulkInvitationResponse {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<BulkInvitationRow>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ListInvitationsResponse {
    pub data: Vec<InvitationResponse>,
    pub next_cursor: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn invitation(kind: InvitationKind, recipient: Recipient) -> Invitation {
        Invitation {
            id: Uuid::new_v4(),
            kind,
            sponsor_id: Uuid::new_v4(),
            invitation_type: InvitationType::Invite,
            recipient,
            token: "0123456789abcdef0123456789abcdef".to_string(),
            code_count: 3,
            package_tier: Some(TierName::M),
            tier_id: None,
            purchase_id: None,
            status: InvitationStatus::Pending,
            created_at: now(),
            expires_at: now() + Duration::days(7),
            accepted_at: None,
            accepted_by_user_id: None,
            cancelled_at: None,
            cancelled_by_user_id: None,
            delivery: DeliveryStatus::default(),
            notes: None,
        }
    }

    fn caller(email: Option<&str>, phone: Option<&str>) -> Caller {
        Caller {
            user_id: Uuid::new_v4(),
            email: email.map(String::from),
            phone: phone.map(String::from),
        }
    }

    #[test]
    fn test_effective_status_reads_expired_after_deadline() {
        let inv = invitation(InvitationKind::Farmer, Recipient::default());
        assert_eq!(inv.effective_status(now()), InvitationStatus::Pending);
        assert_eq!(inv.effective_status(inv.expires_at), InvitationStatus::Pending);
        assert_eq!(
            inv.effective_status(inv.expires_at + Duration::seconds(1)),
            InvitationStatus::Expired
        );
    }

    #[test]
    fn test_farmer_requires_phone_match() {
        let inv = invitation(
            InvitationKind::Farmer,
            Recipient {
                name: None,
                email: Some("farmer@example.com".into()),
                phone: Some("05556866386".into()),
            },
        );
        assert!(inv.is_addressed_to(&caller(None, Some("+90 555 686 6386"))));
        // Email alone is not enough for farmers
        assert!(!inv.is_addressed_to(&caller(Some("farmer@example.com"), None)));
        assert!(!inv.is_addressed_to(&caller(None, Some("05550000000"))));
    }

    #[test]
    fn test_dealer_matches_email_or_phone() {
        let inv = invitation(
            InvitationKind::Dealer,
            Recipient {
                name: Some("Dealer".into()),
                email: Some("dealer@example.com".into()),
                phone: Some("05556866386".into()),
            },
        );
        assert!(inv.is_addressed_to(&caller(Some("DEALER@example.com"), None)));
        assert!(inv.is_addressed_to(&caller(None, Some("0555-686-6386"))));
        assert!(inv.is_addressed_to(&caller(Some("other@example.com"), Some("05556866386"))));
        assert!(!inv.is_addressed_to(&caller(Some("other@example.com"), Some("05550000000"))));
        assert!(!inv.is_addressed_to(&caller(None, None)));
    }

    #[test]
    fn test_recipient_normalized() {
        let recipient = Recipient {
            name: Some("  ".into()),
            email: Some(" Farmer@Example.COM ".into()),
            phone: Some("+90 555 686 6386".into()),
        }
        .normalized();
        assert_eq!(recipient.name, None);
        assert_eq!(recipient.email.as_deref(), Some("farmer@example.com"));
        assert_eq!(recipient.phone.as_deref(), Some("05556866386"));
    }

    #[test]
    fn test_append_note() {
        let mut inv = invitation(InvitationKind::Dealer, Recipient::default());
        inv.append_note("first");
        inv.mark_reclaimed("second");
        assert_eq!(inv.notes.as_deref(), Some("first\nsecond"));
        assert_eq!(inv.status, InvitationStatus::Reclaimed);
    }

    #[test]
    fn test_token_never_serialized() {
        let inv = invitation(InvitationKind::Farmer, Recipient::default());
        let json = serde_json::to_string(&inv).unwrap();
        assert!(!json.contains(&inv.token));
    }

    #[test]
    fn test_farmer_request_validation() {
        let valid: CreateFarmerInvitationRequest = serde_json::from_value(serde_json::json!({
            "phone": "+90 555 686 6386",
            "package_tier": "M"
        }))
        .unwrap();
        assert_eq!(valid.code_count, 1);
        assert!(valid.validate().is_ok());

        let bad_tier: CreateFarmerInvitationRequest = serde_json::from_value(serde_json::json!({
            "phone": "05556866386",
            "package_tier": "XXL"
        }))
        .unwrap();
        assert!(bad_tier.validate().is_err());

        let bad_phone: CreateFarmerInvitationRequest =
            serde_json::from_value(serde_json::json!({ "phone": "123" })).unwrap();
        assert!(bad_phone.validate().is_err());
    }

    #[test]
    fn test_dealer_request_defaults_to_invite() {
        let req: CreateDealerInvitationRequest = serde_json::from_value(serde_json::json!({
            "email": "dealer@example.com",
            "code_count": 5,
            "channel": "whatsapp"
        }))
        .unwrap();
        assert_eq!(req.invitation_type, InvitationType::Invite);
        assert_eq!(req.channel, Some(DeliveryChannel::WhatsApp));
        assert!(req.validate().is_ok());

        let zero: CreateDealerInvitationRequest = serde_json::from_value(serde_json::json!({
            "email": "dealer@example.com",
            "code_count": 0
        }))
        .unwrap();
        assert!(zero.validate().is_err());
    }

    fn bulk_request(rows: usize) -> BulkFarmerInvitationRequest {
        use fake::faker::name::en::Name;
        use fake::Fake;

        let recipients: Vec<serde_json::Value> = (0..rows)
            .map(|i| {
                let name: String = Name().fake();
                serde_json::json!({
                    "phone": format!("0555{:07}", i),
                    "farmer_name": name,
                })
            })
            .collect();
        serde_json::from_value(serde_json::json!({ "recipients": recipients })).unwrap()
    }

    #[test]
    fn test_bulk_request_recipient_bounds() {
        let request = bulk_request(3);
        assert!(request.validate().is_ok());
        assert!(request.recipients.iter().all(|r| r.code_count == 1));
        assert!(request.recipients[0].farmer_name.is_some());

        let errors = bulk_request(0).validate().unwrap_err();
        assert!(errors.field_errors().contains_key("recipients"));
        assert!(bulk_request(501).validate().is_err());
    }
}
