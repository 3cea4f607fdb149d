//! Identity provider over the users and user_roles tables.

use async_trait::async_trait;
use domain::error::IdentityError;
use domain::services::{IdentityProvider, NewDealerAccount};
use shared::phone::normalize_email;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::entities::SPONSOR_ROLE;
use crate::repositories::UserRepository;

/// [`IdentityProvider`] backed by the local account tables.
#[derive(Clone)]
pub struct PgIdentityProvider {
    users: UserRepository,
}

impl PgIdentityProvider {
    pub fn new(pool: PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }
}

#[async_trait]
impl IdentityProvider for PgIdentityProvider {
    async fn user_exists(&self, user_id: Uuid) -> Result<bool, IdentityError> {
        Ok(self.users.find_by_id(user_id).await?.is_some())
    }

    async fn has_sponsor_role(&self, user_id: Uuid) -> Result<bool, IdentityError> {
        Ok(self.users.has_role(user_id, SPONSOR_ROLE).await?)
    }

    async fn grant_sponsor_role(&self, user_id: Uuid) -> Result<(), IdentityError> {
        self.users.grant_role(user_id, SPONSOR_ROLE).await?;
        info!(user_id = %user_id, "Sponsor role granted");
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<Uuid>, IdentityError> {
        let email = normalize_email(email);
        Ok(self.users.find_by_email(&email).await?.map(|u| u.id))
    }

    async fn create_dealer_account(
        &self,
        account: NewDealerAccount,
    ) -> Result<Uuid, IdentityError> {
        let email = normalize_email(&account.email);
        // Unique violation on the email index maps to EmailTaken.
        let user = self
            .users
            .create_user(
                &email,
                account.phone.as_deref(),
                account.name.as_deref(),
                &account.password_hash,
            )
            .await?;
        Ok(user.id)
    }

    async fn display_name(&self, user_id: Uuid) -> Result<Option<String>, IdentityError> {
        Ok(self
            .users
            .find_by_id(user_id)
            .await?
            .and_then(|u| u.display_name))
    }
}
