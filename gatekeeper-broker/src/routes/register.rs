//! Administrator registration endpoint

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use super::mail::DeliveryResponse;
use super::parse_json;
use crate::email::{DeliveryReceipt, MailTransport};
use crate::error::BrokerError;
use crate::identity::IdentityProvider;
use crate::issuer::RegistrationRequest;
use crate::notifier::NotifyRequest;
use crate::state::AppState;
use crate::store::RegistrationStore;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterAdminRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// POST /registerAdmin
pub async fn register_admin<S, I, T>(
    State(state): State<Arc<AppState<S, I, T>>>,
    body: Bytes,
) -> Result<Json<DeliveryResponse>, BrokerError>
where
    S: RegistrationStore + 'static,
    I: IdentityProvider + 'static,
    T: MailTransport + 'static,
{
    let req: RegisterAdminRequest = parse_json(&body)?;
    let request = RegistrationRequest {
        email: req.email,
        password: req.password,
        first_name: req.first_name,
        last_name: req.last_name,
    };

    let receipt = tokio::task::spawn_blocking(move || -> Result<DeliveryReceipt, BrokerError> {
        let issued = state.issuer.issue(state.store.as_ref(), &request)?;

        state.notifier.notify(&NotifyRequest {
            to: &issued.recipient,
            requester: Some(&issued.email),
            subject: None,
            token: &issued.token,
            approve_link: &issued.approve_link,
            reject_link: Some(&issued.reject_link),
        })
    })
    .await
    .map_err(|e| BrokerError::Internal(format!("register task failed: {}", e)))??;

    Ok(Json(receipt.into()))
}
