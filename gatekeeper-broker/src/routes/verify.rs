//! Approval and reject link endpoints

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{RawQuery, State};
use axum::http::{header, HeaderMap};
use axum::response::Response;
use gatekeeper_core::ApprovalToken;
use serde::Deserialize;

use super::pages;
use crate::approval::{approve, reject, ApprovedAdmin, RejectedRequest};
use crate::email::MailTransport;
use crate::error::BrokerError;
use crate::identity::IdentityProvider;
use crate::state::AppState;
use crate::store::RegistrationStore;

#[derive(Debug, Default, Deserialize)]
struct TokenParams {
    token: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum Decision {
    Approve,
    Reject,
}

enum Decided {
    Approved(ApprovedAdmin),
    Rejected(RejectedRequest),
}

fn token_from_query(query: Option<&str>) -> Option<String> {
    query
        .and_then(|q| serde_urlencoded::from_str::<TokenParams>(q).ok())
        .and_then(|p| p.token)
}

/// Token from a JSON or form-encoded body
fn token_from_body(headers: &HeaderMap, body: &[u8]) -> Option<String> {
    if body.is_empty() {
        return None;
    }

    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("json"))
        .unwrap_or(false);

    let params = if is_json {
        serde_json::from_slice::<TokenParams>(body).ok()
    } else {
        serde_urlencoded::from_bytes::<TokenParams>(body).ok()
    };

    params.and_then(|p| p.token)
}

async fn decide<S, I, T>(
    state: Arc<AppState<S, I, T>>,
    decision: Decision,
    raw_token: Option<String>,
) -> Response
where
    S: RegistrationStore + 'static,
    I: IdentityProvider + 'static,
    T: MailTransport + 'static,
{
    let token = match raw_token.as_deref().map(ApprovalToken::parse) {
        Some(Ok(token)) => token,
        _ => {
            tracing::warn!(?decision, "Link followed without a token");
            return pages::missing_token();
        }
    };

    let login_url = state.login_url.clone();
    let result = tokio::task::spawn_blocking(move || match decision {
        Decision::Approve => approve(
            state.store.as_ref(),
            state.identity.as_ref(),
            &state.policy,
            &token,
        )
        .map(Decided::Approved),
        Decision::Reject => reject(state.store.as_ref(), &state.policy, &token)
            .map(Decided::Rejected),
    })
    .await;

    match result {
        Ok(Ok(Decided::Approved(admin))) => pages::approved(&admin, &login_url),
        Ok(Ok(Decided::Rejected(request))) => pages::rejected(&request),
        Ok(Err(BrokerError::TokenNotFound)) => pages::invalid_token(),
        Ok(Err(e)) => {
            tracing::error!(?decision, error = %e, "Decision failed");
            pages::internal_error()
        }
        Err(e) => {
            tracing::error!(?decision, error = %e, "Decision task failed");
            pages::internal_error()
        }
    }
}

/// GET /verifyAdmin?token=...
pub async fn verify_admin<S, I, T>(
    State(state): State<Arc<AppState<S, I, T>>>,
    RawQuery(query): RawQuery,
) -> Response
where
    S: RegistrationStore + 'static,
    I: IdentityProvider + 'static,
    T: MailTransport + 'static,
{
    decide(state, Decision::Approve, token_from_query(query.as_deref())).await
}

/// POST /verifyAdmin
///
/// The token may be in the query string or the body.
pub async fn verify_admin_post<S, I, T>(
    State(state): State<Arc<AppState<S, I, T>>>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    S: RegistrationStore + 'static,
    I: IdentityProvider + 'static,
    T: MailTransport + 'static,
{
    let token =
        token_from_query(query.as_deref()).or_else(|| token_from_body(&headers, &body));
    decide(state, Decision::Approve, token).await
}

/// GET /rejectAdmin?token=...
pub async fn reject_admin<S, I, T>(
    State(state): State<Arc<AppState<S, I, T>>>,
    RawQuery(query): RawQuery,
) -> Response
where
    S: RegistrationStore + 'static,
    I: IdentityProvider + 'static,
    T: MailTransport + 'static,
{
    decide(state, Decision::Reject, token_from_query(query.as_deref())).await
}

/// POST /rejectAdmin
pub async fn reject_admin_post<S, I, T>(
    State(state): State<Arc<AppState<S, I, T>>>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    S: RegistrationStore + 'static,
    I: IdentityProvider + 'static,
    T: MailTransport + 'static,
{
    let token =
        token_from_query(query.as_deref()).or_else(|| token_from_body(&headers, &body));
    decide(state, Decision::Reject, token).await
}
