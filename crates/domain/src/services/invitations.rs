//! Invitation lifecycle for dealer and farmer invitations.
//!
//! Creation reserves codes, acceptance converts reservations into
//! assignments, and cancellation or expiry releases them. Expiry is applied
//! lazily whenever a pending invitation past its deadline is touched, and
//! by the periodic sweep in [`SponsorshipService::expire_overdue_invitations`].

use chrono::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use super::allocation::{CodeFilter, CodeOrder};
use super::identity::NewDealerAccount;
use super::messaging::DeliveryReceipt;
use super::settings::{render_template, TemplateVars};
use super::sponsorship::SponsorshipService;
use super::store::{with_retry, InvitationQuery, SponsorshipStore};
use crate::error::{IdentityError, SponsorshipError, SponsorshipResult};
use crate::models::invitation::{
    BulkFarmerInvitationRequest, BulkInvitationResponse, BulkInvitationRow, ListInvitationsQuery,
};
use crate::models::{
    Caller, DeliveryChannel, DeliveryStatus, Invitation, InvitationKind, InvitationStatus,
    InvitationType, NewInvitation, SponsorshipCode, SubscriptionTier,
};
use shared::crypto::{generate_invitation_token, generate_temporary_password, token_fingerprint};
use shared::pagination::{clamp_page_size, decode_cursor, encode_cursor};
use shared::password::hash_password;
use shared::validation::validate_phone;

/// Length of the one-time password for auto-created dealer accounts.
pub const TEMPORARY_PASSWORD_LENGTH: usize = 12;

/// Upper bound on rows in one bulk request.
pub const MAX_BULK_RECIPIENTS: usize = 500;

#[derive(Debug, Clone)]
pub struct CreatedInvitation {
    pub invitation: Invitation,
    /// Reserved codes, or assigned codes for auto-created dealers.
    pub code_ids: Vec<Uuid>,
    /// Plaintext password of an auto-created dealer account. Returned once.
    pub temporary_password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AcceptedInvitation {
    pub invitation: Invitation,
    pub codes: Vec<SponsorshipCode>,
}

#[derive(Debug, Clone)]
pub struct CancelledInvitation {
    pub invitation: Invitation,
    pub released: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    pub invitations: usize,
    pub codes_released: usize,
}

#[derive(Debug, Clone)]
pub struct InvitationPage {
    pub invitations: Vec<Invitation>,
    pub next_cursor: Option<String>,
}

impl<S: SponsorshipStore> SponsorshipService<S> {
    // ========================================================================
    // Creation
    // ========================================================================

    /// Creates an invitation and reserves its codes atomically.
    ///
    /// When a channel is given the link is dispatched after commit. Delivery
    /// failure is recorded on the invitation and never undoes the reservation.
    pub async fn create_invitation(
        &self,
        sponsor_id: Uuid,
        input: NewInvitation,
    ) -> SponsorshipResult<CreatedInvitation> {
        self.ensure_sponsor(sponsor_id).await?;
        self.create_for_sponsor(sponsor_id, input).await
    }

    async fn create_for_sponsor(
        &self,
        sponsor_id: Uuid,
        input: NewInvitation,
    ) -> SponsorshipResult<CreatedInvitation> {
        let input = self.validate_new_invitation(input)?;
        self.ensure_purchase_owner(sponsor_id, input.purchase_id)
            .await?;
        let tier = self.resolve_tier(input.package_tier.as_deref()).await?;

        let mut created = match input.invitation_type {
            InvitationType::AutoCreate => {
                self.create_auto_dealer(sponsor_id, &input, tier.as_ref())
                    .await?
            }
            InvitationType::Invite => {
                let (invitation, code_ids) = with_retry("create_invitation", || {
                    self.try_allocate_new(sponsor_id, &input, tier.as_ref(), None)
                })
                .await?;
                CreatedInvitation {
                    invitation,
                    code_ids,
                    temporary_password: None,
                }
            }
        };

        info!(
            invitation_id = %created.invitation.id,
            kind = %created.invitation.kind,
            sponsor_id = %sponsor_id,
            codes = created.code_ids.len(),
            token = %token_fingerprint(&created.invitation.token),
            "Invitation created"
        );

        if let (Some(channel), InvitationType::Invite) = (input.channel, input.invitation_type) {
            self.deliver(&mut created.invitation, channel).await;
        }

        Ok(created)
    }

    fn validate_new_invitation(&self, input: NewInvitation) -> SponsorshipResult<NewInvitation> {
        let mut input = input;
        input.recipient = input.recipient.normalized();

        let max = self.settings().max_codes_per_invitation;
        if input.code_count < 1 || input.code_count > max {
            return Err(SponsorshipError::Validation(format!(
                "code_count must be between 1 and {}",
                max
            )));
        }

        if let Some(phone) = input.recipient.phone.as_deref() {
            validate_phone(phone).map_err(|e| {
                SponsorshipError::Validation(
                    e.message
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "Invalid phone number".to_string()),
                )
            })?;
        }

        let recipient = &input.recipient;
        match (input.kind, input.invitation_type) {
            (InvitationKind::Farmer, InvitationType::AutoCreate) => {
                return Err(SponsorshipError::Validation(
                    "Farmer invitations cannot auto-create accounts".to_string(),
                ));
            }
            (InvitationKind::Farmer, InvitationType::Invite) if recipient.phone.is_none() => {
                return Err(SponsorshipError::Validation(
                    "Phone number is required for farmer invitations".to_string(),
                ));
            }
            (InvitationKind::Dealer, InvitationType::Invite)
                if recipient.email.is_none() && recipient.phone.is_none() =>
            {
                return Err(SponsorshipError::Validation(
                    "Email or phone is required for dealer invitations".to_string(),
                ));
            }
            (InvitationKind::Dealer, InvitationType::AutoCreate) if recipient.email.is_none() => {
                return Err(SponsorshipError::Validation(
                    "Email is required for auto-created dealer accounts".to_string(),
                ));
            }
            _ => {}
        }

        if input.channel.is_some()
            && input.invitation_type == InvitationType::Invite
            && recipient.phone.is_none()
        {
            return Err(SponsorshipError::Validation(
                "A phone number is required to send the invitation link".to_string(),
            ));
        }

        Ok(input)
    }

    fn build_invitation(
        &self,
        sponsor_id: Uuid,
        input: &NewInvitation,
        tier: Option<&SubscriptionTier>,
    ) -> Invitation {
        let now = self.now();
        let settings = self.settings().for_kind(input.kind);

        Invitation {
            id: Uuid::new_v4(),
            kind: input.kind,
            sponsor_id,
            invitation_type: input.invitation_type,
            recipient: input.recipient.clone(),
            token: generate_invitation_token(),
            code_count: input.code_count,
            package_tier: tier.map(|t| t.name),
            tier_id: tier.map(|t| t.id),
            purchase_id: input.purchase_id,
            status: InvitationStatus::Pending,
            created_at: now,
            expires_at: now + Duration::days(settings.token_expiry_days),
            accepted_at: None,
            accepted_by_user_id: None,
            cancelled_at: None,
            cancelled_by_user_id: None,
            delivery: DeliveryStatus::default(),
            notes: input.notes.clone(),
        }
    }

    /// Selects and marks codes for a new invitation in one transaction.
    /// With `dealer_id` set the invitation is written already accepted and
    /// codes are assigned to that dealer instead of reserved.
    async fn try_allocate_new(
        &self,
        sponsor_id: Uuid,
        input: &NewInvitation,
        tier: Option<&SubscriptionTier>,
        dealer_id: Option<Uuid>,
    ) -> SponsorshipResult<(Invitation, Vec<Uuid>)> {
        let now = self.now();
        let count = input.code_count as usize;
        let filter = CodeFilter::sponsor(sponsor_id)
            .with_tier(tier.map(|t| t.id))
            .with_purchase(input.purchase_id);

        let store = self.store();
        let mut tx = store.begin().await?;
        let codes = store
            .lock_available_codes(&mut tx, &filter, CodeOrder::ExpirySoonest, count, now)
            .await?;
        if codes.len() < count {
            return Err(SponsorshipError::insufficient(count, codes.len()));
        }

        let mut invitation = self.build_invitation(sponsor_id, input, tier);
        if let Some(dealer_id) = dealer_id {
            invitation.mark_accepted(dealer_id, now);
        }
        store.insert_invitation(&mut tx, &invitation).await?;

        let mut code_ids = Vec::with_capacity(count);
        for mut code in codes {
            let expected = code.hold;
            match dealer_id {
                Some(dealer_id) => code.assign_to_dealer(dealer_id, sponsor_id, now),
                None => code.reserve(invitation.kind, invitation.id, now),
            }
            store.swap_code(&mut tx, &expected, &code).await?;
            code_ids.push(code.id);
        }

        store.commit(tx).await?;
        Ok((invitation, code_ids))
    }

    async fn create_auto_dealer(
        &self,
        sponsor_id: Uuid,
        input: &NewInvitation,
        tier: Option<&SubscriptionTier>,
    ) -> SponsorshipResult<CreatedInvitation> {
        let email = input.recipient.email.clone().ok_or_else(|| {
            SponsorshipError::Validation(
                "Email is required for auto-created dealer accounts".to_string(),
            )
        })?;

        // Refuse before an account is created when inventory is already short.
        let count = input.code_count as usize;
        let filter = CodeFilter::sponsor(sponsor_id)
            .with_tier(tier.map(|t| t.id))
            .with_purchase(input.purchase_id);
        let available = self
            .store()
            .find_available_codes(&filter, CodeOrder::ExpirySoonest, count, self.now())
            .await?
            .len();
        if available < count {
            return Err(SponsorshipError::insufficient(count, available));
        }

        if self.identity().find_user_by_email(&email).await?.is_some() {
            return Err(SponsorshipError::Validation(
                IdentityError::EmailTaken.to_string(),
            ));
        }

        let password = generate_temporary_password(TEMPORARY_PASSWORD_LENGTH);
        let password_hash = hash_password(&password)
            .map_err(|e| SponsorshipError::Identity(IdentityError::Backend(e.to_string())))?;

        let dealer_id = self
            .identity()
            .create_dealer_account(NewDealerAccount {
                email,
                phone: input.recipient.phone.clone(),
                name: input.recipient.name.clone(),
                password_hash,
            })
            .await
            .map_err(|e| match e {
                IdentityError::EmailTaken => SponsorshipError::Validation(e.to_string()),
                other => SponsorshipError::Identity(other),
            })?;
        self.identity().grant_sponsor_role(dealer_id).await?;

        info!(
            dealer_id = %dealer_id,
            sponsor_id = %sponsor_id,
            "Dealer account auto-created"
        );

        let (invitation, code_ids) = with_retry("create_auto_dealer_invitation", || {
            self.try_allocate_new(sponsor_id, input, tier, Some(dealer_id))
        })
        .await
        .map_err(|e| {
            warn!(
                dealer_id = %dealer_id,
                error = %e,
                "Dealer account created but code assignment failed"
            );
            e
        })?;

        Ok(CreatedInvitation {
            invitation,
            code_ids,
            temporary_password: Some(password),
        })
    }

    /// Creates one farmer invitation per row. Each row succeeds or fails
    /// on its own.
    pub async fn bulk_create_farmer_invitations(
        &self,
        sponsor_id: Uuid,
        request: BulkFarmerInvitationRequest,
    ) -> SponsorshipResult<BulkInvitationResponse> {
        if request.recipients.is_empty() || request.recipients.len() > MAX_BULK_RECIPIENTS {
            return Err(SponsorshipError::Validation(format!(
                "Between 1 and {} recipients allowed",
                MAX_BULK_RECIPIENTS
            )));
        }
        self.ensure_sponsor(sponsor_id).await?;

        let channel = request.channel;
        let total = request.recipients.len();
        let mut results = Vec::with_capacity(total);

        for row in request.recipients {
            let phone = row.phone.clone();
            match self
                .create_for_sponsor(sponsor_id, row.into_new_invitation(channel))
                .await
            {
                Ok(created) => results.push(BulkInvitationRow {
                    phone,
                    success: true,
                    invitation_id: Some(created.invitation.id),
                    error: None,
                    delivered: channel.map(|_| created.invitation.delivery.delivered),
                }),
                Err(e) => {
                    let message = if e.is_internal() {
                        warn!(sponsor_id = %sponsor_id, error = %e, "Bulk invitation row failed");
                        "Internal error".to_string()
                    } else {
                        e.to_string()
                    };
                    results.push(BulkInvitationRow {
                        phone,
                        success: false,
                        invitation_id: None,
                        error: Some(message),
                        delivered: None,
                    });
                }
            }
        }

        let succeeded = results.iter().filter(|r| r.success).count();
        info!(
            sponsor_id = %sponsor_id,
            total,
            succeeded,
            "Bulk farmer invitations processed"
        );

        Ok(BulkInvitationResponse {
            total,
            succeeded,
            failed: total - succeeded,
            results,
        })
    }

    // ========================================================================
    // Acceptance
    // ========================================================================

    /// Accepts the pending invitation identified by `token` for `caller`.
    ///
    /// A token that is unknown, or whose invitation is no longer pending,
    /// yields `AlreadyResolved`. An overdue invitation is expired, its codes
    /// released, and `Expired` returned.
    pub async fn accept_invitation(
        &self,
        kind: InvitationKind,
        token: &str,
        caller: &Caller,
    ) -> SponsorshipResult<AcceptedInvitation> {
        let accepted =
            with_retry("accept_invitation", || self.try_accept(kind, token, caller)).await?;

        info!(
            invitation_id = %accepted.invitation.id,
            kind = %kind,
            user_id = %caller.user_id,
            codes = accepted.codes.len(),
            "Invitation accepted"
        );

        if kind == InvitationKind::Dealer {
            self.promote_dealer(caller.user_id).await;
        }

        Ok(accepted)
    }

    async fn try_accept(
        &self,
        kind: InvitationKind,
        token: &str,
        caller: &Caller,
    ) -> SponsorshipResult<AcceptedInvitation> {
        let now = self.now();
        let store = self.store();
        let mut tx = store.begin().await?;

        let mut invitation = match store.lock_invitation_by_token(&mut tx, kind, token).await? {
            Some(invitation) if invitation.is_pending() => invitation,
            _ => return Err(SponsorshipError::AlreadyResolved),
        };

        if invitation.is_expired(now) {
            let released = self.expire_locked(&mut tx, &mut invitation).await?;
            store.commit(tx).await?;
            info!(
                invitation_id = %invitation.id,
                released,
                "Invitation expired on acceptance"
            );
            return Err(SponsorshipError::Expired);
        }

        if !invitation.is_addressed_to(caller) {
            warn!(
                invitation_id = %invitation.id,
                user_id = %caller.user_id,
                "Invitation recipient mismatch"
            );
            return Err(SponsorshipError::NotAuthorized);
        }

        let count = invitation.code_count as usize;
        let reserved = store
            .lock_codes_reserved_for(&mut tx, invitation.id)
            .await?;
        let (mut selected, mut stale): (Vec<_>, Vec<_>) =
            reserved.into_iter().partition(|c| c.is_valid(now));
        if selected.len() > count {
            stale.extend(selected.split_off(count));
        }

        if selected.len() < count {
            let filter = CodeFilter::sponsor(invitation.sponsor_id)
                .with_tier(invitation.tier_id)
                .with_purchase(invitation.purchase_id);
            let top_up = store
                .lock_available_codes(
                    &mut tx,
                    &filter,
                    CodeOrder::ExpirySoonest,
                    count - selected.len(),
                    now,
                )
                .await?;
            selected.extend(top_up);
            if selected.len() < count {
                return Err(SponsorshipError::insufficient(count, selected.len()));
            }
        }

        for mut code in stale {
            let expected = code.hold;
            code.release();
            store.swap_code(&mut tx, &expected, &code).await?;
        }

        for code in selected.iter_mut() {
            let expected = code.hold;
            match kind {
                InvitationKind::Dealer => {
                    code.assign_to_dealer(caller.user_id, invitation.sponsor_id, now)
                }
                InvitationKind::Farmer => code.assign_to_farmer(
                    invitation.id,
                    caller.user_id,
                    invitation.recipient.phone.clone(),
                    now,
                ),
            }
            store.swap_code(&mut tx, &expected, code).await?;
        }

        invitation.mark_accepted(caller.user_id, now);
        store.update_invitation(&mut tx, &invitation).await?;
        store.commit(tx).await?;

        Ok(AcceptedInvitation {
            invitation,
            codes: selected,
        })
    }

    /// Grants the Sponsor role to a dealer who just accepted.
    async fn promote_dealer(&self, user_id: Uuid) {
        let result = match self.identity().has_sponsor_role(user_id).await {
            Ok(true) => Ok(()),
            Ok(false) => self.identity().grant_sponsor_role(user_id).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(user_id = %user_id, error = %e, "Failed to grant sponsor role to dealer");
        }
    }

    // ========================================================================
    // Cancellation and expiry
    // ========================================================================

    pub async fn cancel_invitation(
        &self,
        kind: InvitationKind,
        invitation_id: Uuid,
        actor_id: Uuid,
    ) -> SponsorshipResult<CancelledInvitation> {
        let cancelled = with_retry("cancel_invitation", || {
            self.try_cancel(kind, invitation_id, actor_id)
        })
        .await?;

        info!(
            invitation_id = %invitation_id,
            kind = %kind,
            released = cancelled.released,
            "Invitation cancelled"
        );
        Ok(cancelled)
    }

    async fn try_cancel(
        &self,
        kind: InvitationKind,
        invitation_id: Uuid,
        actor_id: Uuid,
    ) -> SponsorshipResult<CancelledInvitation> {
        let now = self.now();
        let store = self.store();
        let mut tx = store.begin().await?;

        let mut invitation = match store.lock_invitation(&mut tx, invitation_id).await? {
            Some(invitation) if invitation.kind == kind => invitation,
            _ => return Err(SponsorshipError::NotFound("Invitation not found".to_string())),
        };

        if invitation.sponsor_id != actor_id {
            return Err(SponsorshipError::Forbidden(
                "Only the sponsor who created the invitation can cancel it".to_string(),
            ));
        }
        if !invitation.is_pending() {
            return Err(SponsorshipError::AlreadyResolved);
        }
        if invitation.is_expired(now) {
            self.expire_locked(&mut tx, &mut invitation).await?;
            store.commit(tx).await?;
            return Err(SponsorshipError::Expired);
        }

        let released = self.release_reservations(&mut tx, invitation.id).await?;
        invitation.mark_cancelled(actor_id, now);
        store.update_invitation(&mut tx, &invitation).await?;
        store.commit(tx).await?;

        Ok(CancelledInvitation {
            invitation,
            released,
        })
    }

    /// Expires pending invitations past their deadline, at most `limit`
    /// per call, releasing their reservations.
    pub async fn expire_overdue_invitations(&self, limit: usize) -> SponsorshipResult<SweepOutcome> {
        let outcome =
            with_retry("expire_overdue_invitations", || self.try_expire_overdue(limit)).await?;
        if outcome.invitations > 0 {
            info!(
                invitations = outcome.invitations,
                codes_released = outcome.codes_released,
                "Expired overdue invitations"
            );
        }
        Ok(outcome)
    }

    async fn try_expire_overdue(&self, limit: usize) -> SponsorshipResult<SweepOutcome> {
        let now = self.now();
        let store = self.store();
        let mut tx = store.begin().await?;

        let overdue = store.lock_overdue_invitations(&mut tx, now, limit).await?;
        let mut outcome = SweepOutcome::default();
        for mut invitation in overdue {
            outcome.codes_released += self.expire_locked(&mut tx, &mut invitation).await?;
            outcome.invitations += 1;
        }

        store.commit(tx).await?;
        Ok(outcome)
    }

    async fn expire_locked(
        &self,
        tx: &mut S::Tx,
        invitation: &mut Invitation,
    ) -> SponsorshipResult<usize> {
        let released = self.release_reservations(tx, invitation.id).await?;
        invitation.mark_expired();
        self.store().update_invitation(tx, invitation).await?;
        Ok(released)
    }

    async fn release_reservations(
        &self,
        tx: &mut S::Tx,
        invitation_id: Uuid,
    ) -> SponsorshipResult<usize> {
        let store = self.store();
        let reserved = store.lock_codes_reserved_for(tx, invitation_id).await?;
        let released = reserved.len();
        for mut code in reserved {
            let expected = code.hold;
            code.release();
            store.swap_code(tx, &expected, &code).await?;
        }
        Ok(released)
    }

    // ========================================================================
    // Delivery
    // ========================================================================

    /// Re-dispatches the link of a pending invitation.
    pub async fn resend_invitation(
        &self,
        kind: InvitationKind,
        invitation_id: Uuid,
        sponsor_id: Uuid,
        channel: DeliveryChannel,
    ) -> SponsorshipResult<Invitation> {
        let mut invitation = match self.store().find_invitation(invitation_id).await? {
            Some(invitation) if invitation.kind == kind => invitation,
            _ => return Err(SponsorshipError::NotFound("Invitation not found".to_string())),
        };

        if invitation.sponsor_id != sponsor_id {
            return Err(SponsorshipError::Forbidden(
                "Only the sponsor who created the invitation can resend it".to_string(),
            ));
        }
        if !invitation.is_pending() {
            return Err(SponsorshipError::AlreadyResolved);
        }
        if invitation.is_expired(self.now()) {
            return Err(SponsorshipError::Expired);
        }
        if invitation.recipient.phone.is_none() {
            return Err(SponsorshipError::Validation(
                "A phone number is required to send the invitation link".to_string(),
            ));
        }
        if !self.settings().for_kind(kind).channel_enabled(channel) {
            return Err(SponsorshipError::Validation(format!(
                "{} delivery is disabled for {} invitations",
                channel, kind
            )));
        }

        self.deliver(&mut invitation, channel).await;
        Ok(invitation)
    }

    /// Sends the invitation link and records the outcome. Returns whether
    /// the provider accepted the message.
    async fn deliver(&self, invitation: &mut Invitation, channel: DeliveryChannel) -> bool {
        let settings = self.settings().for_kind(invitation.kind);

        let receipt = match invitation.recipient.phone.clone() {
            _ if !settings.channel_enabled(channel) => {
                DeliveryReceipt::failed(format!("{} delivery is disabled", channel))
            }
            Some(phone) => {
                let sponsor_name = self.sponsor_name(invitation.sponsor_id).await;
                let deep_link = settings.deep_link(&invitation.token);
                let text = render_template(
                    &settings.sms_template,
                    &TemplateVars {
                        sponsor_name: &sponsor_name,
                        token: &invitation.token,
                        deep_link: &deep_link,
                        play_store_link: &self.settings().play_store_link,
                        expiry_days: settings.token_expiry_days,
                        code_count: invitation.code_count,
                    },
                );
                self.messenger().send(channel, &phone, &text).await
            }
            None => DeliveryReceipt::failed("Recipient has no phone number"),
        };

        invitation.delivery = DeliveryStatus {
            channel: Some(channel),
            sent_at: Some(self.now()),
            delivered: receipt.success,
            provider_message_id: receipt.provider_message_id,
            error: receipt.error,
        };

        if invitation.delivery.delivered {
            info!(
                invitation_id = %invitation.id,
                channel = %channel,
                "Invitation link sent"
            );
        } else {
            warn!(
                invitation_id = %invitation.id,
                channel = %channel,
                error = invitation.delivery.error.as_deref().unwrap_or("unknown"),
                "Invitation link delivery failed"
            );
        }

        let invitation_id = invitation.id;
        let delivery = invitation.delivery.clone();
        if let Err(e) = with_retry("record_delivery", || {
            self.try_record_delivery(invitation_id, &delivery)
        })
        .await
        {
            warn!(
                invitation_id = %invitation_id,
                error = %e,
                "Failed to record delivery status"
            );
        }

        invitation.delivery.delivered
    }

    async fn try_record_delivery(
        &self,
        invitation_id: Uuid,
        delivery: &DeliveryStatus,
    ) -> SponsorshipResult<()> {
        let store = self.store();
        let mut tx = store.begin().await?;
        let mut stored = store
            .lock_invitation(&mut tx, invitation_id)
            .await?
            .ok_or_else(|| SponsorshipError::NotFound("Invitation not found".to_string()))?;
        stored.delivery = delivery.clone();
        store.update_invitation(&mut tx, &stored).await?;
        store.commit(tx).await?;
        Ok(())
    }

    // ========================================================================
    // Listing
    // ========================================================================

    /// Newest-first page of a sponsor's invitations with effective statuses.
    pub async fn list_invitations(
        &self,
        sponsor_id: Uuid,
        kind: InvitationKind,
        query: ListInvitationsQuery,
    ) -> SponsorshipResult<InvitationPage> {
        self.ensure_sponsor(sponsor_id).await?;

        let after = query
            .cursor
            .as_deref()
            .map(decode_cursor)
            .transpose()
            .map_err(|e| SponsorshipError::Validation(e.to_string()))?;
        let limit = clamp_page_size(query.limit);

        let mut invitations = self
            .store()
            .list_invitations(&InvitationQuery {
                sponsor_id,
                kind,
                status: query.status,
                after,
                limit: limit + 1,
                now: self.now(),
            })
            .await?;

        let next_cursor = if invitations.len() as i64 > limit {
            invitations.truncate(limit as usize);
            invitations
                .last()
                .map(|i| encode_cursor(i.created_at, i.id))
        } else {
            None
        };

        Ok(InvitationPage {
            invitations,
            next_cursor,
        })
    }
}
