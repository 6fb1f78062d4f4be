//! SMTP relay transport

use gatekeeper_core::{OutboundMessage, Priority};
use lettre::{
    message::{
        header::{Header, HeaderName, HeaderValue},
        Mailbox, MultiPart,
    },
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};
use uuid::Uuid;

use super::{DeliveryKind, DeliveryReceipt, MailTransport, TransportError};

const TRANSPORT_NAME: &str = "smtp";

/// SMTP reply codes that mean the credentials were refused
const AUTH_FAILURE_CODES: [&str; 3] = ["530", "534", "535"];

/// Configuration for SMTP sending
#[derive(Clone)]
pub struct SmtpConfig {
    /// SMTP server host (e.g., "smtp.gmail.com")
    pub host: String,
    /// 465 for implicit TLS, 587 for STARTTLS
    pub port: u16,
    pub username: String,
    /// Password or app password
    pub password: String,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl SmtpConfig {
    /// Create config from a variable lookup
    ///
    /// Required:
    /// - SMTP_HOST
    /// - SMTP_USERNAME
    /// - SMTP_PASSWORD
    ///
    /// Optional:
    /// - SMTP_PORT (default: 465)
    pub fn from_lookup(get: &impl Fn(&str) -> Option<String>) -> Option<Self> {
        let host = get("SMTP_HOST")?;
        let username = get("SMTP_USERNAME")?;
        let password = get("SMTP_PASSWORD")?;

        let port = get("SMTP_PORT")
            .and_then(|s| s.parse().ok())
            .unwrap_or(465);

        Some(Self {
            host,
            port,
            username,
            password,
        })
    }
}

/// `X-Priority` header
#[derive(Debug, Clone)]
struct XPriority(&'static str);

impl Header for XPriority {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_str("X-Priority")
    }

    fn parse(s: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        match s.trim() {
            "1" => Ok(Self("1")),
            "3" => Ok(Self("3")),
            "5" => Ok(Self("5")),
            other => Err(format!("unsupported X-Priority {}", other).into()),
        }
    }

    fn display(&self) -> HeaderValue {
        HeaderValue::new(Self::name(), self.0.to_string())
    }
}

/// `Importance` header
#[derive(Debug, Clone)]
struct Importance(&'static str);

impl Header for Importance {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_str("Importance")
    }

    fn parse(s: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        match s.trim() {
            "high" => Ok(Self("high")),
            "normal" => Ok(Self("normal")),
            "low" => Ok(Self("low")),
            other => Err(format!("unsupported Importance {}", other).into()),
        }
    }

    fn display(&self) -> HeaderValue {
        HeaderValue::new(Self::name(), self.0.to_string())
    }
}

/// Map an SMTP reply code to the transport error kind
fn classify_failure(code: Option<&str>, reason: String) -> TransportError {
    match code {
        Some(code) if AUTH_FAILURE_CODES.contains(&code) => TransportError::AuthenticationFailed {
            transport: TRANSPORT_NAME.to_string(),
            reason,
        },
        _ => TransportError::DeliveryFailed {
            transport: TRANSPORT_NAME.to_string(),
            reason,
        },
    }
}

fn invalid(reason: String) -> TransportError {
    TransportError::DeliveryFailed {
        transport: TRANSPORT_NAME.to_string(),
        reason,
    }
}

/// Build the MIME message for an outbound message
fn build_message(message: &OutboundMessage, message_id: &str) -> Result<Message, TransportError> {
    let from_address = message
        .from
        .address
        .parse()
        .map_err(|e| invalid(format!("Invalid from address: {}", e)))?;
    let from = Mailbox::new(Some(message.from.name.clone()), from_address);

    let to: Mailbox = message
        .to
        .parse()
        .map_err(|e| invalid(format!("Invalid to address: {}", e)))?;

    let reply_to: Mailbox = message
        .reply_to
        .parse()
        .map_err(|e| invalid(format!("Invalid reply-to address: {}", e)))?;

    let priority: Priority = message.priority;

    Message::builder()
        .from(from)
        .reply_to(reply_to)
        .to(to)
        .subject(message.subject.clone())
        .message_id(Some(message_id.to_string()))
        .header(XPriority(priority.x_priority()))
        .header(Importance(priority.importance()))
        .multipart(MultiPart::alternative_plain_html(
            message.text.clone(),
            message.html.clone(),
        ))
        .map_err(|e| invalid(format!("Failed to build email: {}", e)))
}

/// Sends directly through an authenticated SMTP relay
pub struct SmtpRelayTransport {
    transport: SmtpTransport,
    host: String,
}

impl SmtpRelayTransport {
    /// Create a new SMTP relay transport.
    ///
    /// No connection is made here; the first send authenticates.
    pub fn new(config: SmtpConfig) -> Result<Self, TransportError> {
        let creds = Credentials::new(config.username, config.password);

        let builder = if config.port == 587 {
            SmtpTransport::starttls_relay(&config.host)
        } else {
            SmtpTransport::relay(&config.host)
        }
        .map_err(|e| {
            TransportError::Configuration(format!("Failed to create SMTP transport: {}", e))
        })?;

        let transport = builder.port(config.port).credentials(creds).build();

        tracing::info!(host = %config.host, port = config.port, "SMTP transport configured");

        Ok(Self {
            transport,
            host: config.host,
        })
    }
}

impl MailTransport for SmtpRelayTransport {
    fn name(&self) -> &str {
        TRANSPORT_NAME
    }

    fn send(&self, message: &OutboundMessage) -> Result<DeliveryReceipt, TransportError> {
        let domain = message
            .from
            .address
            .rsplit_once('@')
            .map(|(_, d)| d)
            .unwrap_or("localhost");
        let message_id = format!("<{}@{}>", Uuid::new_v4(), domain);

        let email = build_message(message, &message_id)?;

        self.transport.send(&email).map_err(|e| {
            let code = e.status().map(|c| c.to_string());
            classify_failure(
                code.as_deref(),
                format!("Failed to send email via {}: {}", self.host, e),
            )
        })?;

        tracing::info!(to = %message.to, message_id = %message_id, "Email sent via SMTP");

        Ok(DeliveryReceipt {
            message_id,
            transport: TRANSPORT_NAME.to_string(),
            sent_via: DeliveryKind::Direct,
        })
    }
}
