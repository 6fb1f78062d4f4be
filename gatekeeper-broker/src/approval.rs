//! Approval and rejection of pending registrations
//!
//! A pending registration is decided exactly once. Approval consumes the
//! record and creates (or refreshes) the administrator in a single batch, so
//! two clicks on the same link can never both succeed.

use chrono::{Duration, Utc};
use gatekeeper_core::ApprovalToken;

use crate::error::BrokerError;
use crate::identity::{upsert_account, IdentityProvider, IdentityUpsert};
use crate::store::{
    AdministratorAccount, PendingRegistration, Precondition, RegistrationStore, Write, WriteBatch,
};

/// Bound on rebuilding the batch after a concurrent administrator change
pub const MAX_COMMIT_ATTEMPTS: usize = 5;

#[derive(Debug, Clone)]
pub struct ApprovalPolicy {
    /// How long a token stays usable after issuance
    pub token_ttl: Duration,
    pub max_commit_attempts: usize,
}

impl ApprovalPolicy {
    pub fn new(token_ttl_hours: u32) -> Self {
        Self {
            token_ttl: Duration::hours(i64::from(token_ttl_hours)),
            max_commit_attempts: MAX_COMMIT_ATTEMPTS,
        }
    }
}

/// What happened to the login account after approval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityStatus {
    Created,
    Updated,
    /// Provisioning failed; the approval itself stands
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovedAdmin {
    pub email: String,
    pub first_name: String,
    /// False when an existing administrator only had its names refreshed
    pub admin_created: bool,
    pub identity: IdentityStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRequest {
    pub email: String,
}

/// Find the open, unexpired record for a token.
///
/// Unknown, consumed, rejected and expired tokens all come back as
/// [`BrokerError::TokenNotFound`].
fn open_pending<S>(
    store: &S,
    policy: &ApprovalPolicy,
    token: &ApprovalToken,
) -> Result<PendingRegistration, BrokerError>
where
    S: RegistrationStore + ?Sized,
{
    let pending = match store.find_open_pending(token.as_str())? {
        Some(pending) => pending,
        None => {
            tracing::info!(token = %token.redacted(), "No open registration for token");
            return Err(BrokerError::TokenNotFound);
        }
    };

    if pending.is_expired(policy.token_ttl, Utc::now()) {
        tracing::info!(
            token = %token.redacted(),
            email = %pending.email,
            created_at = %pending.created_at,
            "Approval token expired"
        );
        return Err(BrokerError::TokenNotFound);
    }

    Ok(pending)
}

fn commit_failed(err: BrokerError) -> BrokerError {
    match err {
        BrokerError::StoreCommitFailed(_) => err,
        other => BrokerError::StoreCommitFailed(other.to_string()),
    }
}

/// Approve the registration behind `token`.
///
/// Commits the pending record and the administrator together, then
/// provisions the login account best-effort.
pub fn approve<S, I>(
    store: &S,
    identity: &I,
    policy: &ApprovalPolicy,
    token: &ApprovalToken,
) -> Result<ApprovedAdmin, BrokerError>
where
    S: RegistrationStore + ?Sized,
    I: IdentityProvider + ?Sized,
{
    let pending = open_pending(store, policy, token)?;

    let mut admin_created = None;
    for attempt in 1..=policy.max_commit_attempts {
        let admin_write = match store.get_admin(&pending.email)? {
            Some(_) => Write::UpdateAdminNames {
                email: pending.email.clone(),
                first_name: pending.first_name.clone(),
                last_name: pending.last_name.clone(),
            },
            None => Write::CreateAdmin(AdministratorAccount {
                email: pending.email.clone(),
                first_name: pending.first_name.clone(),
                last_name: pending.last_name.clone(),
                created_at: Utc::now(),
            }),
        };
        let creates = matches!(admin_write, Write::CreateAdmin(_));

        let batch = WriteBatch::new()
            .with(Write::ConsumePending {
                token: pending.token.clone(),
            })
            .with(admin_write);

        match store.commit(batch) {
            Ok(()) => {
                admin_created = Some(creates);
                break;
            }
            Err(BrokerError::PreconditionFailed(Precondition::PendingUnavailable { .. })) => {
                tracing::info!(
                    token = %token.redacted(),
                    email = %pending.email,
                    "Registration decided concurrently"
                );
                return Err(BrokerError::TokenNotFound);
            }
            Err(BrokerError::PreconditionFailed(precondition)) => {
                tracing::warn!(
                    attempt,
                    ?precondition,
                    "Administrator record changed during approval, retrying"
                );
            }
            Err(e) => {
                tracing::error!(email = %pending.email, error = %e, "Approval commit failed");
                return Err(commit_failed(e));
            }
        }
    }

    let admin_created = admin_created.ok_or_else(|| {
        tracing::error!(email = %pending.email, "Approval commit kept conflicting");
        BrokerError::StoreCommitFailed(format!(
            "administrator record for {} kept changing",
            pending.email
        ))
    })?;

    tracing::info!(
        email = %pending.email,
        admin_created,
        "Administrator approved"
    );

    let identity = match upsert_account(identity, &pending.email, &pending.password_hash) {
        Ok(IdentityUpsert::Created(account)) => {
            tracing::info!(uid = %account.uid, email = %account.email, "Identity account created");
            IdentityStatus::Created
        }
        Ok(IdentityUpsert::Updated(account)) => {
            tracing::info!(uid = %account.uid, email = %account.email, "Identity account updated");
            IdentityStatus::Updated
        }
        Err(e) => {
            tracing::error!(
                email = %pending.email,
                error = %BrokerError::from(e),
                "Identity provisioning failed after approval"
            );
            IdentityStatus::Failed
        }
    };

    Ok(ApprovedAdmin {
        email: pending.email,
        first_name: pending.first_name,
        admin_created,
        identity,
    })
}

/// Reject the registration behind `token`
pub fn reject<S>(
    store: &S,
    policy: &ApprovalPolicy,
    token: &ApprovalToken,
) -> Result<RejectedRequest, BrokerError>
where
    S: RegistrationStore + ?Sized,
{
    let pending = open_pending(store, policy, token)?;

    let batch = WriteBatch::new().with(Write::RejectPending {
        token: pending.token.clone(),
        rejected_at: Utc::now(),
    });

    match store.commit(batch) {
        Ok(()) => {
            tracing::info!(email = %pending.email, "Registration rejected");
            Ok(RejectedRequest {
                email: pending.email,
            })
        }
        Err(BrokerError::PreconditionFailed(_)) => {
            tracing::info!(token = %token.redacted(), "Registration decided concurrently");
            Err(BrokerError::TokenNotFound)
        }
        Err(e) => {
            tracing::error!(email = %pending.email, error = %e, "Reject commit failed");
            Err(commit_failed(e))
        }
    }
}
