//! Broker error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::store::Precondition;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Mail transport not configured: {0}")]
    Configuration(String),

    #[error("Mail transport {transport} rejected its credentials: {reason}")]
    AuthenticationFailed { transport: String, reason: String },

    #[error("Delivery via {transport} failed: {reason}")]
    DeliveryFailed { transport: String, reason: String },

    #[error("Approval token not found")]
    TokenNotFound,

    #[error("Approval token already in use")]
    TokenConflict,

    #[error("Precondition failed: {0:?}")]
    PreconditionFailed(Precondition),

    #[error("Store commit failed: {0}")]
    StoreCommitFailed(String),

    #[error("Identity provisioning failed: {0}")]
    IdentityProvisionFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<gatekeeper_core::Error> for BrokerError {
    fn from(err: gatekeeper_core::Error) -> Self {
        BrokerError::ValidationError(err.to_string())
    }
}

impl IntoResponse for BrokerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            BrokerError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.as_str()),
            BrokerError::TokenNotFound => {
                (StatusCode::BAD_REQUEST, "Invalid or already used token")
            }
            BrokerError::Configuration(msg) => {
                tracing::error!(
                    "Mail transport not configured: {}. Set SMTP_HOST/SMTP_USERNAME/SMTP_PASSWORD, \
                     MAIL_API_KEY, or MAIL_QUEUE_ENABLED=true",
                    msg
                );
                (StatusCode::INTERNAL_SERVER_ERROR, "Email could not be sent")
            }
            BrokerError::AuthenticationFailed { transport, reason } => {
                tracing::error!(%transport, %reason, "Mail transport authentication failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Email could not be sent")
            }
            BrokerError::DeliveryFailed { transport, reason } => {
                tracing::error!(%transport, %reason, "Mail delivery failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Email could not be sent")
            }
            BrokerError::TokenConflict
            | BrokerError::PreconditionFailed(_)
            | BrokerError::StoreCommitFailed(_)
            | BrokerError::IdentityProvisionFailed(_)
            | BrokerError::Internal(_) => {
                tracing::error!("Internal error: {}", self);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = json!({ "success": false, "reason": message });
        (status, axum::Json(body)).into_response()
    }
}
