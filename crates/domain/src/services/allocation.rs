//! Allocation engine: which available codes a request gets, and in what order.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use super::sponsorship::SponsorshipService;
use super::store::SponsorshipStore;
use crate::error::SponsorshipResult;
use crate::models::SponsorshipCode;

/// Which of a sponsor's codes a selection may draw from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeFilter {
    pub sponsor_id: Uuid,
    pub tier_id: Option<Uuid>,
    pub purchase_id: Option<Uuid>,
}

impl CodeFilter {
    pub fn sponsor(sponsor_id: Uuid) -> Self {
        Self {
            sponsor_id,
            tier_id: None,
            purchase_id: None,
        }
    }

    pub fn with_tier(mut self, tier_id: Option<Uuid>) -> Self {
        self.tier_id = tier_id;
        self
    }

    pub fn with_purchase(mut self, purchase_id: Option<Uuid>) -> Self {
        self.purchase_id = purchase_id;
        self
    }

    /// Whether `code` is available and inside this filter.
    pub fn admits(&self, code: &SponsorshipCode, now: DateTime<Utc>) -> bool {
        code.sponsor_id == self.sponsor_id
            && self.tier_id.map_or(true, |t| code.tier_id == t)
            && self.purchase_id.map_or(true, |p| code.purchase_id == p)
            && code.is_available(now)
    }
}

/// Total orders a selection can take a prefix of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeOrder {
    /// Soonest expiry first, then oldest created. Used by invitations.
    ExpirySoonest,
    /// Oldest created first. Used by direct transfers.
    OldestCreated,
}

impl CodeOrder {
    pub fn compare(&self, a: &SponsorshipCode, b: &SponsorshipCode) -> Ordering {
        match self {
            CodeOrder::ExpirySoonest => a
                .expiry_date
                .cmp(&b.expiry_date)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id)),
            CodeOrder::OldestCreated => a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)),
        }
    }
}

/// Takes the first `count` codes admitted by `filter` under `order`.
pub fn select_codes<'a>(
    codes: impl IntoIterator<Item = &'a SponsorshipCode>,
    filter: &CodeFilter,
    order: CodeOrder,
    count: usize,
    now: DateTime<Utc>,
) -> Vec<SponsorshipCode> {
    let mut candidates: Vec<&SponsorshipCode> =
        codes.into_iter().filter(|c| filter.admits(c, now)).collect();
    candidates.sort_by(|a, b| order.compare(a, b));
    candidates.into_iter().take(count).cloned().collect()
}

impl<S: SponsorshipStore> SponsorshipService<S> {
    /// Read-only preview of the codes an invitation would receive right now.
    pub async fn select_codes(
        &self,
        sponsor_id: Uuid,
        count: usize,
        tier: Option<&str>,
    ) -> SponsorshipResult<Vec<SponsorshipCode>> {
        let tier = self.resolve_tier(tier).await?;
        let filter = CodeFilter::sponsor(sponsor_id).with_tier(tier.map(|t| t.id));
        let codes = self
            .store()
            .find_available_codes(&filter, CodeOrder::ExpirySoonest, count, self.now())
            .await?;

        debug!(
            sponsor_id = %sponsor_id,
            requested = count,
            selected = codes.len(),
            "Selected codes"
        );
        Ok(codes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InvitationKind;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn code(sponsor: Uuid, tier: Uuid, expiry_days: i64, created_offset_secs: i64) -> SponsorshipCode {
        SponsorshipCode::issue(
            format!("AGRI-2026-{}", Uuid::new_v4().simple()),
            sponsor,
            Uuid::new_v4(),
            tier,
            now() + Duration::days(expiry_days),
            now() - Duration::days(30) + Duration::seconds(created_offset_secs),
        )
    }

    #[test]
    fn test_expiry_soonest_then_oldest_created() {
        let sponsor = Uuid::new_v4();
        let tier_m = Uuid::new_v4();
        let tier_s = Uuid::new_v4();

        let codes = vec![
            code(sponsor, tier_m, 300, 0),
            code(sponsor, tier_m, 100, 50),
            code(sponsor, tier_m, 100, 10),
            code(sponsor, tier_s, 10, 0),
            code(sponsor, tier_m, 200, 0),
            code(sponsor, tier_m, 50, 99),
        ];

        let filter = CodeFilter::sponsor(sponsor).with_tier(Some(tier_m));
        let picked = select_codes(&codes, &filter, CodeOrder::ExpirySoonest, 3, now());

        let ids: Vec<Uuid> = picked.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![codes[5].id, codes[2].id, codes[1].id]);
    }

    #[test]
    fn test_oldest_created_ignores_expiry() {
        let sponsor = Uuid::new_v4();
        let tier = Uuid::new_v4();
        let codes = vec![
            code(sponsor, tier, 10, 30),
            code(sponsor, tier, 300, 0),
            code(sponsor, tier, 5, 60),
        ];

        let picked = select_codes(
            &codes,
            &CodeFilter::sponsor(sponsor),
            CodeOrder::OldestCreated,
            2,
            now(),
        );
        assert_eq!(picked[0].id, codes[1].id);
        assert_eq!(picked[1].id, codes[0].id);
    }

    #[test]
    fn test_unavailable_and_foreign_codes_are_skipped() {
        let sponsor = Uuid::new_v4();
        let tier = Uuid::new_v4();
        let mut codes: Vec<SponsorshipCode> = (0..6).map(|i| code(sponsor, tier, 100, i)).collect();
        codes[0].reserve(InvitationKind::Farmer, Uuid::new_v4(), now());
        codes[1].assign_to_dealer(Uuid::new_v4(), sponsor, now());
        codes[2].is_used = true;
        codes[3].is_active = false;
        codes[4].expiry_date = now();
        codes.push(code(Uuid::new_v4(), tier, 1, 0));

        let picked = select_codes(
            &codes,
            &CodeFilter::sponsor(sponsor),
            CodeOrder::ExpirySoonest,
            10,
            now(),
        );
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].id, codes[5].id);
    }

    #[test]
    fn test_selection_is_deterministic() {
        let sponsor = Uuid::new_v4();
        let tier = Uuid::new_v4();
        let codes: Vec<SponsorshipCode> = (0..20).map(|i| code(sponsor, tier, 100, i % 3)).collect();
        let filter = CodeFilter::sponsor(sponsor);

        let first = select_codes(&codes, &filter, CodeOrder::ExpirySoonest, 7, now());
        let mut reversed = codes.clone();
        reversed.reverse();
        let second = select_codes(&reversed, &filter, CodeOrder::ExpirySoonest, 7, now());
        assert_eq!(first, second);
    }

    #[test]
    fn test_purchase_filter() {
        let sponsor = Uuid::new_v4();
        let tier = Uuid::new_v4();
        let codes: Vec<SponsorshipCode> = (0..3).map(|i| code(sponsor, tier, 100, i)).collect();
        let filter = CodeFilter::sponsor(sponsor).with_purchase(Some(codes[2].purchase_id));

        let picked = select_codes(&codes, &filter, CodeOrder::ExpirySoonest, 3, now());
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].id, codes[2].id);
    }
}
