//! Account creation, password verification, and password changes.
//!
//! [`CredentialStore`] sits between the handlers and a [`UserRepository`]. It owns hashing and
//! turns repository outcomes into [`ModelError`] classifications so handlers never see storage
//! details. Nothing is cached; every call goes to the repository.

use crate::auth::password::{PasswordError, PasswordHasher};
use crate::models::{now_secs, ModelError, NewUser, User, UserId};
use crate::storage::{RepositoryError, UserRepository};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Password hashed once per store to give unknown-email logins the same verify cost.
const DUMMY_PASSWORD: &str = "snippetbox-unknown-account";

impl From<PasswordError> for ModelError {
    fn from(err: PasswordError) -> Self {
        ModelError::Hash(err.to_string())
    }
}

#[derive(Clone)]
pub struct CredentialStore {
    repo: Arc<dyn UserRepository>,
    hasher: PasswordHasher,
    dummy_hash: Arc<OnceCell<String>>,
}

impl CredentialStore {
    pub fn new(repo: Arc<dyn UserRepository>, hasher: PasswordHasher) -> Self {
        Self {
            repo,
            hasher,
            dummy_hash: Arc::new(OnceCell::new()),
        }
    }

    /// Create an account. An email already in use is [`ModelError::DuplicateEmail`].
    pub async fn insert(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<UserId, ModelError> {
        let hashed_password = self.hasher.hash_blocking(password).await?;

        let user = NewUser {
            name: name.to_string(),
            email: email.to_string(),
            hashed_password,
            created_at: now_secs(),
        };

        match self.repo.insert(user).await {
            Ok(id) => {
                tracing::info!(action = "user_created", user_id = %id);
                Ok(id)
            }
            Err(RepositoryError::UniqueViolation { field: "email" }) => {
                Err(ModelError::DuplicateEmail)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve an email/password pair to a user id.
    ///
    /// Unknown email and wrong password are indistinguishable to the caller, in outcome and in
    /// cost: an unknown email is still verified against a hash made with the same parameters.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<UserId, ModelError> {
        let Some((id, hashed_password)) = self.repo.find_credentials(email).await? else {
            let dummy = self
                .dummy_hash
                .get_or_try_init(|| self.hasher.hash_blocking(DUMMY_PASSWORD))
                .await?;
            self.hasher.verify_blocking(password, dummy).await?;
            return Err(ModelError::InvalidCredentials);
        };

        if !self.hasher.verify_blocking(password, &hashed_password).await? {
            return Err(ModelError::InvalidCredentials);
        }

        Ok(id)
    }

    pub async fn get(&self, id: UserId) -> Result<User, ModelError> {
        self.repo.get(id).await?.ok_or(ModelError::NoRecord)
    }

    /// Replace the password after re-checking the current one.
    pub async fn update_password(
        &self,
        id: UserId,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), ModelError> {
        let user = self.get(id).await?;

        if !self
            .hasher
            .verify_blocking(current_password, &user.hashed_password)
            .await?
        {
            return Err(ModelError::InvalidCredentials);
        }

        if new_password == current_password {
            return Err(ModelError::SamePassword);
        }

        let hashed_password = self.hasher.hash_blocking(new_password).await?;
        if !self.repo.update_password_hash(id, &hashed_password).await? {
            return Err(ModelError::NoRecord);
        }

        tracing::info!(action = "password_updated", user_id = %id);
        Ok(())
    }

    pub async fn exists(&self, id: UserId) -> Result<bool, ModelError> {
        Ok(self.repo.exists(id).await?)
    }
}
