//! Approval email endpoint

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use gatekeeper_core::{normalize_email, ApprovalToken};
use serde::{Deserialize, Serialize};

use super::parse_json;
use crate::email::{DeliveryKind, DeliveryReceipt, MailTransport};
use crate::error::BrokerError;
use crate::identity::IdentityProvider;
use crate::notifier::NotifyRequest;
use crate::state::AppState;
use crate::store::RegistrationStore;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendVerificationRequest {
    pub to: Option<String>,
    pub user_email: Option<String>,
    pub subject: Option<String>,
    pub token: Option<String>,
    pub link: Option<String>,
    pub reject_link: Option<String>,
}

/// Success body shared by the endpoints that send an approval email
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_via: Option<DeliveryKind>,
}

impl From<DeliveryReceipt> for DeliveryResponse {
    fn from(receipt: DeliveryReceipt) -> Self {
        Self {
            success: true,
            message_id: Some(receipt.message_id),
            sent_via: Some(receipt.sent_via),
        }
    }
}

fn required(value: Option<String>, field: &str) -> Result<String, BrokerError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| BrokerError::ValidationError(format!("{} is required", field)))
}

/// POST /sendVerificationEmail
pub async fn send_verification_email<S, I, T>(
    State(state): State<Arc<AppState<S, I, T>>>,
    body: Bytes,
) -> Result<Json<DeliveryResponse>, BrokerError>
where
    S: RegistrationStore + 'static,
    I: IdentityProvider + 'static,
    T: MailTransport + 'static,
{
    let req: SendVerificationRequest = parse_json(&body)?;

    let to = normalize_email(&required(req.to, "to")?)?;
    // Optional; the email falls back to a generic requester label
    let user_email = req
        .user_email
        .filter(|v| !v.trim().is_empty())
        .map(|v| normalize_email(&v))
        .transpose()?;
    let token = ApprovalToken::parse(&required(req.token, "token")?)?;
    let link = required(req.link, "link")?;
    let reject_link = req.reject_link.filter(|l| !l.trim().is_empty());
    let subject = req.subject;

    let receipt = tokio::task::spawn_blocking(move || {
        state.notifier.notify(&NotifyRequest {
            to: &to,
            requester: user_email.as_deref(),
            subject: subject.as_deref(),
            token: &token,
            approve_link: &link,
            reject_link: reject_link.as_deref(),
        })
    })
    .await
    .map_err(|e| BrokerError::Internal(format!("notify task failed: {}", e)))??;

    Ok(Json(receipt.into()))
}
