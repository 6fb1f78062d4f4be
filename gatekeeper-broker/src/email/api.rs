//! Transactional email API transport
//!
//! Speaks the Brevo `POST /v3/smtp/email` JSON format, which most
//! transactional providers accept in some form.

use std::collections::BTreeMap;
use std::time::Duration;

use gatekeeper_core::OutboundMessage;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::{DeliveryKind, DeliveryReceipt, MailTransport, TransportError};

const TRANSPORT_NAME: &str = "api";

/// Default send endpoint
pub const DEFAULT_API_URL: &str = "https://api.brevo.com/v3/smtp/email";

/// Configuration for the transactional API
#[derive(Clone)]
pub struct ApiConfig {
    pub api_key: String,
    pub url: String,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("api_key", &"<redacted>")
            .field("url", &self.url)
            .finish()
    }
}

impl ApiConfig {
    /// Create config from a variable lookup
    ///
    /// Required: MAIL_API_KEY. Optional: MAIL_API_URL.
    pub fn from_lookup(get: &impl Fn(&str) -> Option<String>) -> Option<Self> {
        let api_key = get("MAIL_API_KEY")?;
        let url = get("MAIL_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        Some(Self { api_key, url })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiEmailAddress {
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiSendEmailBody {
    sender: ApiEmailAddress,
    to: Vec<ApiEmailAddress>,
    reply_to: ApiEmailAddress,
    subject: String,
    html_content: String,
    text_content: String,
    headers: BTreeMap<&'static str, &'static str>,
}

impl ApiSendEmailBody {
    fn from_message(message: &OutboundMessage) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("X-Priority", message.priority.x_priority());
        headers.insert("Importance", message.priority.importance());

        Self {
            sender: ApiEmailAddress {
                email: message.from.address.clone(),
                name: Some(message.from.name.clone()),
            },
            to: vec![ApiEmailAddress {
                email: message.to.clone(),
                name: None,
            }],
            reply_to: ApiEmailAddress {
                email: message.reply_to.clone(),
                name: None,
            },
            subject: message.subject.clone(),
            html_content: message.html.clone(),
            text_content: message.text.clone(),
            headers,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiSendEmailResponse {
    message_id: Option<String>,
}

/// Map a non-2xx status to the transport error kind
fn classify_status(status: u16, body: &str) -> TransportError {
    let reason = format!("API send failed (status={}): {}", status, body);
    match status {
        401 | 403 => TransportError::AuthenticationFailed {
            transport: TRANSPORT_NAME.to_string(),
            reason,
        },
        _ => TransportError::DeliveryFailed {
            transport: TRANSPORT_NAME.to_string(),
            reason,
        },
    }
}

/// Sends through a transactional email HTTP API
pub struct TransactionalApiTransport {
    client: Client,
    config: ApiConfig,
}

impl TransactionalApiTransport {
    pub fn new(config: ApiConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(concat!("gatekeeper-broker/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                TransportError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { client, config })
    }
}

impl MailTransport for TransactionalApiTransport {
    fn name(&self) -> &str {
        TRANSPORT_NAME
    }

    fn send(&self, message: &OutboundMessage) -> Result<DeliveryReceipt, TransportError> {
        let body = ApiSendEmailBody::from_message(message);

        let response = self
            .client
            .post(&self.config.url)
            .header("api-key", &self.config.api_key)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .map_err(|e| TransportError::DeliveryFailed {
                transport: TRANSPORT_NAME.to_string(),
                reason: format!("API request failed: {}", e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(classify_status(status.as_u16(), &body));
        }

        // A 2xx without a parseable id still means the API accepted the message
        let message_id = response
            .json::<ApiSendEmailResponse>()
            .ok()
            .and_then(|r| r.message_id)
            .unwrap_or_else(|| format!("api-{}", uuid::Uuid::new_v4()));

        tracing::info!(to = %message.to, message_id = %message_id, "Email sent via API");

        Ok(DeliveryReceipt {
            message_id,
            transport: TRANSPORT_NAME.to_string(),
            sent_via: DeliveryKind::Direct,
        })
    }
}
