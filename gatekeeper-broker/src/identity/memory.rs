//! In-memory identity provider

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;
use uuid::Uuid;

use super::{IdentityAccount, IdentityError, IdentityProvider};

/// In-memory identity provider, keyed by uid
pub struct InMemoryIdentityProvider {
    accounts: RwLock<HashMap<String, IdentityAccount>>,
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
        }
    }

    /// Number of accounts (for testing purposes)
    pub fn account_count(&self) -> usize {
        self.accounts.read().map(|a| a.len()).unwrap_or(0)
    }
}

impl Default for InMemoryIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> IdentityError {
    IdentityError::Backend("identity lock poisoned".to_string())
}

impl IdentityProvider for InMemoryIdentityProvider {
    fn create_account(
        &self,
        email: &str,
        password_hash: &str,
        email_verified: bool,
    ) -> Result<IdentityAccount, IdentityError> {
        let normalized = email.to_lowercase();
        let mut accounts = self.accounts.write().map_err(poisoned)?;
        if accounts.values().any(|a| a.email == normalized) {
            return Err(IdentityError::AlreadyExists { email: normalized });
        }

        let account = IdentityAccount {
            uid: Uuid::new_v4().to_string(),
            email: normalized,
            password_hash: password_hash.to_string(),
            email_verified,
            created_at: Utc::now(),
        };
        accounts.insert(account.uid.clone(), account.clone());
        Ok(account)
    }

    fn get_account_by_email(&self, email: &str) -> Result<Option<IdentityAccount>, IdentityError> {
        let normalized = email.to_lowercase();
        let accounts = self.accounts.read().map_err(poisoned)?;
        Ok(accounts.values().find(|a| a.email == normalized).cloned())
    }

    fn update_account(
        &self,
        uid: &str,
        password_hash: &str,
        email_verified: bool,
    ) -> Result<IdentityAccount, IdentityError> {
        let mut accounts = self.accounts.write().map_err(poisoned)?;
        let account = accounts
            .get_mut(uid)
            .ok_or_else(|| IdentityError::NotFound(uid.to_string()))?;
        account.password_hash = password_hash.to_string();
        account.email_verified = email_verified;
        Ok(account.clone())
    }
}
