//! Approval email notifier
//!
//! Renders the approval message for a site and hands it to the configured
//! transport, leaving an audit entry behind for every attempt.

use std::sync::Arc;

use chrono::Utc;
use gatekeeper_core::{ApprovalEmail, ApprovalToken, SenderIdentity};
use uuid::Uuid;

use crate::config::SiteConfig;
use crate::email::{DeliveryReceipt, MailTransport, TransportError};
use crate::error::BrokerError;
use crate::store::{MailLogEntry, RegistrationStore, SETTING_CONTACT_EMAIL, SETTING_SITE_NAME};

/// One approval email to send
#[derive(Debug, Clone)]
pub struct NotifyRequest<'a> {
    /// Recipient of the email
    pub to: &'a str,
    /// Address the administrator account is requested for
    pub requester: Option<&'a str>,
    pub subject: Option<&'a str>,
    pub token: &'a ApprovalToken,
    pub approve_link: &'a str,
    pub reject_link: Option<&'a str>,
}

/// Site identity after applying stored settings over configured defaults
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteIdentity {
    pub name: String,
    pub contact_email: Option<String>,
}

pub struct Notifier<S, T> {
    store: Arc<S>,
    transport: T,
    site: SiteConfig,
    supports_reject_link: bool,
    valid_for_hours: u32,
}

impl<S, T> Notifier<S, T>
where
    S: RegistrationStore,
    T: MailTransport,
{
    pub fn new(
        store: Arc<S>,
        transport: T,
        site: SiteConfig,
        supports_reject_link: bool,
        valid_for_hours: u32,
    ) -> Self {
        Self {
            store,
            transport,
            site,
            supports_reject_link,
            valid_for_hours,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Read one setting, falling back to `None` on a missing, blank or
    /// unreadable value
    fn setting(&self, key: &str) -> Option<String> {
        match self.store.get_setting(key) {
            Ok(value) => value.filter(|v| !v.trim().is_empty()),
            Err(e) => {
                tracing::warn!(key, error = %e, "Settings lookup failed, using default");
                None
            }
        }
    }

    /// Resolve the site name and contact address
    pub fn site_identity(&self) -> SiteIdentity {
        SiteIdentity {
            name: self
                .setting(SETTING_SITE_NAME)
                .unwrap_or_else(|| self.site.name.clone()),
            contact_email: self
                .setting(SETTING_CONTACT_EMAIL)
                .or_else(|| self.site.contact_email.clone()),
        }
    }

    /// Render and send one approval email
    pub fn notify(&self, request: &NotifyRequest<'_>) -> Result<DeliveryReceipt, BrokerError> {
        let site = self.site_identity();
        let from = SenderIdentity::for_site(
            &site.name,
            site.contact_email.as_deref(),
            &self.site.fallback_sender_domain,
        );
        let reply_to = site
            .contact_email
            .clone()
            .unwrap_or_else(|| from.address.clone());

        let reject_link = if self.supports_reject_link {
            request.reject_link
        } else {
            None
        };

        let email = ApprovalEmail {
            site_name: &site.name,
            requester: request.requester,
            approve_link: request.approve_link,
            reject_link,
            valid_for_hours: self.valid_for_hours,
        };
        let message = email.into_message(request.to, from, &reply_to, request.subject)?;

        let result = self.transport.send(&message);

        match &result {
            Ok(receipt) => {
                tracing::info!(
                    to = %message.to,
                    token = %request.token.redacted(),
                    transport = %receipt.transport,
                    sent_via = receipt.sent_via.as_str(),
                    message_id = %receipt.message_id,
                    "Approval email sent"
                );
                self.audit(MailLogEntry {
                    id: Uuid::new_v4().to_string(),
                    to: message.to.clone(),
                    subject: message.subject.clone(),
                    transport: receipt.transport.clone(),
                    sent_via: Some(receipt.sent_via),
                    message_id: Some(receipt.message_id.clone()),
                    success: true,
                    error: None,
                    created_at: Utc::now(),
                });
            }
            // Nothing reached a transport
            Err(TransportError::Configuration(_)) => {}
            Err(e) => {
                let transport = match e {
                    TransportError::AuthenticationFailed { transport, .. }
                    | TransportError::DeliveryFailed { transport, .. } => transport.clone(),
                    TransportError::Configuration(_) => self.transport.name().to_string(),
                };
                tracing::error!(
                    to = %message.to,
                    token = %request.token.redacted(),
                    %transport,
                    error = %e,
                    "Approval email failed"
                );
                self.audit(MailLogEntry {
                    id: Uuid::new_v4().to_string(),
                    to: message.to.clone(),
                    subject: message.subject.clone(),
                    transport,
                    sent_via: None,
                    message_id: None,
                    success: false,
                    error: Some(e.to_string()),
                    created_at: Utc::now(),
                });
            }
        }

        result.map_err(BrokerError::from)
    }

    fn audit(&self, entry: MailLogEntry) {
        if let Err(e) = self.store.record_mail(entry) {
            tracing::warn!(error = %e, "Failed to write mail log entry");
        }
    }
}
