//! HTTP routes for the broker

mod mail;
mod pages;
mod register;
mod verify;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use crate::email::MailTransport;
use crate::error::BrokerError;
use crate::identity::IdentityProvider;
use crate::state::AppState;
use crate::store::RegistrationStore;

pub use mail::{DeliveryResponse, SendVerificationRequest};
pub use register::RegisterAdminRequest;

/// Create the router with all routes
pub fn create_router<S, I, T>(state: Arc<AppState<S, I, T>>) -> Router
where
    S: RegistrationStore + 'static,
    I: IdentityProvider + 'static,
    T: MailTransport + 'static,
{
    Router::new()
        .route("/health", get(health))
        .route("/sendVerificationEmail", post(mail::send_verification_email))
        .route("/registerAdmin", post(register::register_admin))
        .route(
            "/verifyAdmin",
            get(verify::verify_admin).post(verify::verify_admin_post),
        )
        .route(
            "/rejectAdmin",
            get(verify::reject_admin).post(verify::reject_admin_post),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health
async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Decode a JSON body, reporting problems as validation errors so they
/// share the error envelope
fn parse_json<B: DeserializeOwned>(body: &[u8]) -> Result<B, BrokerError> {
    if body.is_empty() {
        return Err(BrokerError::ValidationError("Request body is required".to_string()));
    }
    serde_json::from_slice(body)
        .map_err(|e| BrokerError::ValidationError(format!("Invalid request body: {}", e)))
}
