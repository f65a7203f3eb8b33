use super::CatalogError;
use crate::storage::GuardedBackend;
use sha2::{Digest, Sha256};

/// Setting holding the fingerprint of the admin password.
pub const MASTER_PASSWORD_KEY: &str = "master_password";

/// Lowercase hex SHA-256 of a secret, the form secrets are stored in.
pub fn fingerprint(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Clone)]
pub struct SettingsRepository {
    backend: GuardedBackend,
}

impl SettingsRepository {
    pub fn new(backend: GuardedBackend) -> Self {
        SettingsRepository { backend }
    }

    fn check_key(key: &str) -> Result<(), CatalogError> {
        if key.trim().is_empty() {
            return Err(CatalogError::Validation("Setting key is required".into()));
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, CatalogError> {
        Self::check_key(key)?;
        Ok(self.backend.get_setting(key)?)
    }

    pub fn put(&self, key: &str, value: &str) -> Result<(), CatalogError> {
        Self::check_key(key)?;
        Ok(self.backend.put_setting(key, value)?)
    }

    /// Compares the fingerprint of `candidate` with the stored value.
    /// Nothing stored never verifies.
    pub fn verify(&self, key: &str, candidate: &str) -> Result<bool, CatalogError> {
        Ok(match self.get(key)? {
            Some(stored) => stored.trim().eq_ignore_ascii_case(&fingerprint(candidate)),
            None => false,
        })
    }
}
