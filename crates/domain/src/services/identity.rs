//! Identity collaborator: account lookup, role checks and dealer provisioning.

use std::collections::HashMap;

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::IdentityError;
use shared::phone::normalize_email;

/// A dealer account to provision for an auto-create invitation.
#[derive(Debug, Clone)]
pub struct NewDealerAccount {
    pub email: String,
    pub phone: Option<String>,
    pub name: Option<String>,
    /// Argon2id PHC string. The plaintext never reaches the provider.
    pub password_hash: String,
}

#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn user_exists(&self, user_id: Uuid) -> Result<bool, IdentityError>;

    async fn has_sponsor_role(&self, user_id: Uuid) -> Result<bool, IdentityError>;

    /// Grants the Sponsor role. Granting an existing role is a no-op.
    async fn grant_sponsor_role(&self, user_id: Uuid) -> Result<(), IdentityError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<Uuid>, IdentityError>;

    async fn create_dealer_account(&self, account: NewDealerAccount)
        -> Result<Uuid, IdentityError>;

    async fn display_name(&self, user_id: Uuid) -> Result<Option<String>, IdentityError>;
}

#[derive(Debug, Clone)]
pub struct MockUser {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub display_name: Option<String>,
    pub password_hash: Option<String>,
    pub is_sponsor: bool,
}

/// In-memory identity provider for testing.
#[derive(Debug, Default)]
pub struct MockIdentityProvider {
    users: Mutex<HashMap<Uuid, MockUser>>,
    simulate_failure: bool,
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a provider whose every call fails with a backend error.
    pub fn failing() -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
            simulate_failure: true,
        }
    }

    pub async fn add_user(&self, email: Option<&str>, phone: Option<&str>) -> Uuid {
        self.insert(email, phone, false).await
    }

    pub async fn add_sponsor(&self, name: &str) -> Uuid {
        let id = self.insert(None, None, true).await;
        if let Some(user) = self.users.lock().await.get_mut(&id) {
            user.display_name = Some(name.to_string());
        }
        id
    }

    pub async fn user(&self, user_id: Uuid) -> Option<MockUser> {
        self.users.lock().await.get(&user_id).cloned()
    }

    async fn insert(&self, email: Option<&str>, phone: Option<&str>, is_sponsor: bool) -> Uuid {
        let id = Uuid::new_v4();
        self.users.lock().await.insert(
            id,
            MockUser {
                email: email.map(normalize_email),
                phone: phone.map(String::from),
                display_name: None,
                password_hash: None,
                is_sponsor,
            },
        );
        id
    }

    fn check(&self) -> Result<(), IdentityError> {
        if self.simulate_failure {
            Err(IdentityError::Backend("Simulated identity failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn user_exists(&self, user_id: Uuid) -> Result<bool, IdentityError> {
        self.check()?;
        Ok(self.users.lock().await.contains_key(&user_id))
    }

    async fn has_sponsor_role(&self, user_id: Uuid) -> Result<bool, IdentityError> {
        self.check()?;
        Ok(self
            .users
            .lock()
            .await
            .get(&user_id)
            .map_or(false, |u| u.is_sponsor))
    }

    async fn grant_sponsor_role(&self, user_id: Uuid) -> Result<(), IdentityError> {
        self.check()?;
        match self.users.lock().await.get_mut(&user_id) {
            Some(user) => {
                user.is_sponsor = true;
                Ok(())
            }
            None => Err(IdentityError::Backend(format!("Unknown user {}", user_id))),
        }
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<Uuid>, IdentityError> {
        self.check()?;
        let email = normalize_email(email);
        Ok(self
            .users
            .lock()
            .await
            .iter()
            .find(|(_, u)| u.email.as_deref() == Some(email.as_str()))
            .map(|(id, _)| *id))
    }

    async fn create_dealer_account(
        &self,
        account: NewDealerAccount,
    ) -> Result<Uuid, IdentityError> {
        self.check()?;
        let email = normalize_email(&account.email);
        let mut users = self.users.lock().await;
        if users.values().any(|u| u.email.as_deref() == Some(email.as_str())) {
            return Err(IdentityError::EmailTaken);
        }

        let id = Uuid::new_v4();
        users.insert(
            id,
            MockUser {
                email: Some(email),
                phone: account.phone,
                display_name: account.name,
                password_hash: Some(account.password_hash),
                is_sponsor: false,
            },
        );
        Ok(id)
    }

    async fn display_name(&self, user_id: Uuid) -> Result<Option<String>, IdentityError> {
        self.check()?;
        Ok(self
            .users
            .lock()
            .await
            .get(&user_id)
            .and_then(|u| u.display_name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_dealer_rejects_duplicate_email() {
        let identity = MockIdentityProvider::new();
        identity.add_user(Some("dealer@example.com"), None).await;

        let result = identity
            .create_dealer_account(NewDealerAccount {
                email: "Dealer@Example.com".to_string(),
                phone: None,
                name: None,
                password_hash: "$argon2id$stub".to_string(),
            })
            .await;
        assert!(matches!(result, Err(IdentityError::EmailTaken)));
    }

    #[tokio::test]
    async fn test_grant_sponsor_role() {
        let identity = MockIdentityProvider::new();
        let user = identity.add_user(Some("a@example.com"), None).await;
        assert!(!identity.has_sponsor_role(user).await.unwrap());
        identity.grant_sponsor_role(user).await.unwrap();
        assert!(identity.has_sponsor_role(user).await.unwrap());
    }
}
