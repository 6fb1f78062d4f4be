//! Identity provider abstraction
//!
//! The identity provider owns login credentials. The broker only ever
//! creates an account for a newly approved administrator, or refreshes the
//! password of one that already exists.

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryIdentityProvider;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::crypto::verify_password;
use crate::error::BrokerError;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("An account already exists for {email}")]
    AlreadyExists { email: String },

    #[error("Account not found: {0}")]
    NotFound(String),

    #[error("Identity backend error: {0}")]
    Backend(String),
}

impl From<IdentityError> for BrokerError {
    fn from(err: IdentityError) -> Self {
        BrokerError::IdentityProvisionFailed(err.to_string())
    }
}

/// A login account held by the identity provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityAccount {
    pub uid: String,
    pub email: String,
    pub password_hash: String,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
}

/// Trait for identity provider backends.
///
/// The primitive operations mirror what hosted identity services offer:
/// create (failing if the email is taken), lookup by email and update.
pub trait IdentityProvider: Send + Sync {
    /// Create an account, failing with [`IdentityError::AlreadyExists`] if
    /// the email is taken
    fn create_account(
        &self,
        email: &str,
        password_hash: &str,
        email_verified: bool,
    ) -> Result<IdentityAccount, IdentityError>;

    /// Get an account by email address
    fn get_account_by_email(&self, email: &str) -> Result<Option<IdentityAccount>, IdentityError>;

    /// Replace the password and verified flag of an account
    fn update_account(
        &self,
        uid: &str,
        password_hash: &str,
        email_verified: bool,
    ) -> Result<IdentityAccount, IdentityError>;

    /// Check a plaintext password against the stored hash
    fn verify_credentials(&self, email: &str, password: &str) -> Result<bool, IdentityError> {
        match self.get_account_by_email(email)? {
            Some(account) => verify_password(password, &account.password_hash)
                .map_err(|e| IdentityError::Backend(e.to_string())),
            None => Ok(false),
        }
    }
}

/// Which branch an upsert took
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityUpsert {
    Created(IdentityAccount),
    Updated(IdentityAccount),
}

impl IdentityUpsert {
    pub fn account(&self) -> &IdentityAccount {
        match self {
            IdentityUpsert::Created(account) | IdentityUpsert::Updated(account) => account,
        }
    }
}

/// Create a verified account for `email`, or update the existing one.
///
/// An existing account is an expected outcome: its password is replaced and
/// its email marked verified.
pub fn upsert_account<I>(
    provider: &I,
    email: &str,
    password_hash: &str,
) -> Result<IdentityUpsert, IdentityError>
where
    I: IdentityProvider + ?Sized,
{
    match provider.create_account(email, password_hash, true) {
        Ok(account) => Ok(IdentityUpsert::Created(account)),
        Err(IdentityError::AlreadyExists { .. }) => {
            let existing = provider
                .get_account_by_email(email)?
                .ok_or_else(|| IdentityError::NotFound(email.to_string()))?;
            let updated = provider.update_account(&existing.uid, password_hash, true)?;
            Ok(IdentityUpsert::Updated(updated))
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash_password;

    #[test]
    fn test_upsert_creates_then_updates() {
        let provider = InMemoryIdentityProvider::new();
        let first = hash_password("first-password", 4).unwrap();
        let second = hash_password("second-password", 4).unwrap();

        let created = upsert_account(&provider, "a@b.com", &first).unwrap();
        assert!(matches!(created, IdentityUpsert::Created(_)));
        assert!(created.account().email_verified);

        let updated = upsert_account(&provider, "a@b.com", &second).unwrap();
        assert!(matches!(updated, IdentityUpsert::Updated(_)));
        assert_eq!(updated.account().uid, created.account().uid);

        assert!(provider.verify_credentials("a@b.com", "second-password").unwrap());
        assert!(!provider.verify_credentials("a@b.com", "first-password").unwrap());
    }

    #[test]
    fn test_upsert_marks_existing_unverified_account_verified() {
        let provider = InMemoryIdentityProvider::new();
        let hash = hash_password("some-password", 4).unwrap();
        provider.create_account("a@b.com", &hash, false).unwrap();

        let result = upsert_account(&provider, "a@b.com", &hash).unwrap();
        assert!(matches!(result, IdentityUpsert::Updated(_)));
        assert!(result.account().email_verified);
    }

    #[test]
    fn test_unknown_account_does_not_verify() {
        let provider = InMemoryIdentityProvider::new();
        assert!(!provider.verify_credentials("nobody@b.com", "x").unwrap());
    }
}
