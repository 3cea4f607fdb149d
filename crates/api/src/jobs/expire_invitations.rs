//! Periodic expiry of pending invitations past their deadline.
//!
//! Expiry is also applied lazily when an invitation is touched; this sweep
//! returns codes held by invitations nobody touches again.

use std::sync::Arc;

use domain::services::{SponsorshipService, SponsorshipStore};

use super::scheduler::{Job, JobFrequency};
use crate::middleware::metrics::{record_codes_released, ReleaseReason};

/// Upper bound on batches per run so one sweep cannot monopolize the pool.
const MAX_BATCHES_PER_RUN: usize = 50;

pub struct ExpireInvitationsJob<S: SponsorshipStore> {
    service: Arc<SponsorshipService<S>>,
    interval_minutes: u64,
    batch_size: usize,
}

impl<S: SponsorshipStore> ExpireInvitationsJob<S> {
    pub fn new(service: Arc<SponsorshipService<S>>, interval_minutes: u64, batch_size: usize) -> Self {
        Self {
            service,
            interval_minutes,
            batch_size: batch_size.max(1),
        }
    }

    /// Sweeps batch by batch until a short batch. Returns invitations expired.
    pub async fn sweep(&self) -> Result<usize, String> {
        let mut expired = 0;
        for _ in 0..MAX_BATCHES_PER_RUN {
            let outcome = self
                .service
                .expire_overdue_invitations(self.batch_size)
                .await
                .map_err(|e| e.to_string())?;

            record_codes_released(ReleaseReason::Expired, outcome.codes_released);
            expired += outcome.invitations;

            if outcome.invitations < self.batch_size {
                break;
            }
        }
        Ok(expired)
    }
}

#[async_trait::async_trait]
impl<S: SponsorshipStore> Job for ExpireInvitationsJob<S> {
    fn name(&self) -> &'static str {
        "expire_invitations"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Minutes(self.interval_minutes)
    }

    async fn execute(&self) -> Result<(), String> {
        let expired = self.sweep().await?;
        tracing::debug!(expired, "Expiry sweep finished");
        Ok(())
    }
}
