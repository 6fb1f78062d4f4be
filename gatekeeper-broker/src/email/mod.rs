//! Email transport abstractions
//!
//! Every way of getting a message out implements [`MailTransport`]. The
//! configured transports are composed into a [`FallbackTransport`] that
//! tries them in priority order.

pub mod api;
pub mod console;
pub mod fallback;
pub mod queue;
pub mod smtp;

pub use api::{ApiConfig, TransactionalApiTransport};
pub use console::ConsoleTransport;
pub use fallback::FallbackTransport;
pub use queue::QueuedDocumentTransport;
pub use smtp::{SmtpConfig, SmtpRelayTransport};

use std::sync::Arc;

use gatekeeper_core::OutboundMessage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{MailConfig, TransportKind};
use crate::error::BrokerError;
use crate::store::RegistrationStore;

/// What a successful send means
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryKind {
    /// Handed to a mail server or API
    Direct,
    /// Durably enqueued for an external mailer; not yet delivered
    Queued,
}

impl DeliveryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryKind::Direct => "direct",
            DeliveryKind::Queued => "queued",
        }
    }
}

/// Proof of a successful send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub message_id: String,
    /// Name of the transport that accepted the message
    pub transport: String,
    pub sent_via: DeliveryKind,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Nothing usable is configured
    #[error("{0}")]
    Configuration(String),

    /// Credentials were rejected; retrying will not help
    #[error("{transport}: authentication failed: {reason}")]
    AuthenticationFailed { transport: String, reason: String },

    /// The send failed and may succeed later or elsewhere
    #[error("{transport}: {reason}")]
    DeliveryFailed { transport: String, reason: String },
}

impl From<TransportError> for BrokerError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Configuration(msg) => BrokerError::Configuration(msg),
            TransportError::AuthenticationFailed { transport, reason } => {
                BrokerError::AuthenticationFailed { transport, reason }
            }
            TransportError::DeliveryFailed { transport, reason } => {
                BrokerError::DeliveryFailed { transport, reason }
            }
        }
    }
}

/// Trait for sending a rendered message
pub trait MailTransport: Send + Sync {
    /// Short name used in logs and receipts
    fn name(&self) -> &str;

    /// Deliver or enqueue a message
    fn send(&self, message: &OutboundMessage) -> Result<DeliveryReceipt, TransportError>;
}

/// Allow using Box<dyn MailTransport> as a MailTransport
impl MailTransport for Box<dyn MailTransport> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn send(&self, message: &OutboundMessage) -> Result<DeliveryReceipt, TransportError> {
        (**self).send(message)
    }
}

/// Build the fallback chain described by the mail configuration.
///
/// Transports that are disabled or lack configuration are left out with a
/// log line; a transport that fails to initialise is left out with an error.
pub fn build_transport_chain<S>(config: &MailConfig, store: Arc<S>) -> FallbackTransport
where
    S: RegistrationStore + 'static,
{
    let mut chain = FallbackTransport::new();

    for kind in &config.priority {
        match kind {
            TransportKind::Smtp => match (&config.smtp, config.smtp_disabled) {
                (_, true) => tracing::info!("SMTP transport disabled"),
                (None, false) => tracing::debug!("SMTP transport not configured"),
                (Some(smtp), false) => match SmtpRelayTransport::new(smtp.clone()) {
                    Ok(transport) => chain.push(Box::new(transport)),
                    Err(e) => tracing::error!(error = %e, "SMTP transport unavailable"),
                },
            },
            TransportKind::Api => match (&config.api, config.api_disabled) {
                (_, true) => tracing::info!("Transactional API transport disabled"),
                (None, false) => tracing::debug!("Transactional API transport not configured"),
                (Some(api), false) => match TransactionalApiTransport::new(api.clone()) {
                    Ok(transport) => chain.push(Box::new(transport)),
                    Err(e) => {
                        tracing::error!(error = %e, "Transactional API transport unavailable")
                    }
                },
            },
            TransportKind::Queue => {
                if config.queue_enabled {
                    chain.push(Box::new(QueuedDocumentTransport::new(store.clone())));
                }
            }
            TransportKind::Console => {
                if config.console_enabled {
                    chain.push(Box::new(ConsoleTransport::new()));
                }
            }
        }
    }

    if chain.is_empty() {
        tracing::error!(
            "No mail transport configured. Set SMTP_HOST, SMTP_USERNAME and SMTP_PASSWORD, \
             or MAIL_API_KEY, or MAIL_QUEUE_ENABLED=true"
        );
    } else {
        tracing::info!(transports = ?chain.names(), "Mail transports ready");
    }

    chain
}

/// Build the transport chain on the blocking pool.
///
/// The HTTP client used by the API transport cannot be constructed on an
/// async worker thread.
pub async fn spawn_transport_chain<S>(
    config: MailConfig,
    store: Arc<S>,
) -> Result<FallbackTransport, BrokerError>
where
    S: RegistrationStore + 'static,
{
    tokio::task::spawn_blocking(move || build_transport_chain(&config, store))
        .await
        .map_err(|e| BrokerError::Internal(format!("transport setup task failed: {}", e)))
}
