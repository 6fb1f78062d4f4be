//! Registration request issuer

use chrono::Utc;
use gatekeeper_core::{generate_approval_token, normalize_email, ApprovalToken};

use crate::crypto::hash_password;
use crate::error::BrokerError;
use crate::store::{PendingRegistration, RegistrationStore};

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 80;
pub const MAX_NAME_LENGTH: usize = 100;

/// Attempts at drawing an unused token
pub const MAX_TOKEN_ATTEMPTS: usize = 3;

/// A request for administrator access
#[derive(Clone)]
pub struct RegistrationRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

impl std::fmt::Debug for RegistrationRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .finish()
    }
}

/// A stored pending registration and the links that decide it
#[derive(Debug, Clone)]
pub struct IssuedRegistration {
    pub token: ApprovalToken,
    pub email: String,
    /// Who the approval email goes to
    pub recipient: String,
    pub approve_link: String,
    pub reject_link: String,
}

pub struct Issuer {
    public_base_url: String,
    approver_email: Option<String>,
    bcrypt_cost: u32,
}

fn check_name(field: &str, value: &str) -> Result<String, BrokerError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(BrokerError::ValidationError(format!("{} is required", field)));
    }
    if value.chars().count() > MAX_NAME_LENGTH {
        return Err(BrokerError::ValidationError(format!("{} is too long", field)));
    }
    Ok(value.to_string())
}

impl Issuer {
    pub fn new(public_base_url: &str, approver_email: Option<String>, bcrypt_cost: u32) -> Self {
        Self {
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            approver_email,
            bcrypt_cost,
        }
    }

    pub fn approve_link(&self, token: &ApprovalToken) -> String {
        format!("{}/verifyAdmin?token={}", self.public_base_url, token.as_str())
    }

    pub fn reject_link(&self, token: &ApprovalToken) -> String {
        format!("{}/rejectAdmin?token={}", self.public_base_url, token.as_str())
    }

    /// Validate the request and store a pending registration under a fresh token
    pub fn issue<S>(
        &self,
        store: &S,
        request: &RegistrationRequest,
    ) -> Result<IssuedRegistration, BrokerError>
    where
        S: RegistrationStore + ?Sized,
    {
        self.issue_with(store, request, generate_approval_token)
    }

    /// Like [`Issuer::issue`], drawing tokens from `next_token`
    pub fn issue_with<S, F>(
        &self,
        store: &S,
        request: &RegistrationRequest,
        mut next_token: F,
    ) -> Result<IssuedRegistration, BrokerError>
    where
        S: RegistrationStore + ?Sized,
        F: FnMut() -> ApprovalToken,
    {
        let email = normalize_email(&request.email)?;

        let length = request.password.chars().count();
        if !(MIN_PASSWORD_LENGTH..=MAX_PASSWORD_LENGTH).contains(&length) {
            return Err(BrokerError::ValidationError(format!(
                "Password must be between {} and {} characters",
                MIN_PASSWORD_LENGTH, MAX_PASSWORD_LENGTH
            )));
        }

        let first_name = check_name("firstName", &request.first_name)?;
        let last_name = check_name("lastName", &request.last_name)?;

        let password_hash = hash_password(&request.password, self.bcrypt_cost)
            .map_err(|e| BrokerError::Internal(format!("Failed to hash password: {}", e)))?;

        for attempt in 1..=MAX_TOKEN_ATTEMPTS {
            let token = next_token();
            let pending = PendingRegistration {
                token: token.as_str().to_string(),
                email: email.clone(),
                password_hash: password_hash.clone(),
                first_name: first_name.clone(),
                last_name: last_name.clone(),
                verified: false,
                created_at: Utc::now(),
                rejected_at: None,
            };

            match store.create_pending(pending) {
                Ok(()) => {
                    tracing::info!(
                        email = %email,
                        token = %token.redacted(),
                        "Pending registration stored"
                    );
                    return Ok(IssuedRegistration {
                        recipient: self.approver_email.clone().unwrap_or_else(|| email.clone()),
                        approve_link: self.approve_link(&token),
                        reject_link: self.reject_link(&token),
                        token,
                        email,
                    });
                }
                Err(BrokerError::TokenConflict) => {
                    tracing::warn!(attempt, "Approval token collision, drawing another");
                }
                Err(e) => return Err(e),
            }
        }

        tracing::error!(email = %email, "Could not draw an unused approval token");
        Err(BrokerError::TokenConflict)
    }
}
