//! Argon2id password hashing.
//!
//! Hashes are PHC strings, so the parameters used at hash time travel with the hash and
//! verification keeps working if the configured parameters change later.

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordVerifier, Version};
use zeroize::Zeroizing;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("invalid Argon2 parameters: {0}")]
    Params(argon2::Error),

    #[error("password hashing failed: {0}")]
    Hash(argon2::password_hash::Error),

    #[error("stored password hash is malformed: {0}")]
    MalformedHash(argon2::password_hash::Error),

    #[error("hashing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Argon2id hasher with fixed cost parameters.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl PasswordHasher {
    /// Memory cost in KiB, iteration count, lanes.
    pub fn new(m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self, PasswordError> {
        let params = Params::new(m_cost, t_cost, p_cost, None).map_err(PasswordError::Params)?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash `password` with a fresh random salt.
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        use argon2::PasswordHasher as _;

        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(password.as_bytes(), &salt)
            .map_err(PasswordError::Hash)?;
        Ok(hash.to_string())
    }

    /// Check `password` against a stored PHC string.
    ///
    /// A mismatch is `Ok(false)`; only a hash that cannot be parsed is an error.
    pub fn verify(&self, password: &str, stored: &str) -> Result<bool, PasswordError> {
        let parsed = PasswordHash::new(stored).map_err(PasswordError::MalformedHash)?;
        match self.argon2().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(PasswordError::Hash(e)),
        }
    }

    /// [`Self::hash`] on the blocking pool.
    pub async fn hash_blocking(&self, password: &str) -> Result<String, PasswordError> {
        let hasher = self.clone();
        let password = Zeroizing::new(password.to_string());
        run_blocking(move || hasher.hash(&password)).await
    }

    /// [`Self::verify`] on the blocking pool.
    pub async fn verify_blocking(&self, password: &str, stored: &str) -> Result<bool, PasswordError> {
        let hasher = self.clone();
        let password = Zeroizing::new(password.to_string());
        let stored = stored.to_string();
        run_blocking(move || hasher.verify(&password, &stored)).await
    }
}

impl Default for PasswordHasher {
    /// 19 MiB, 2 iterations, 1 lane.
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T, PasswordError>
where
    F: FnOnce() -> Result<T, PasswordError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}
