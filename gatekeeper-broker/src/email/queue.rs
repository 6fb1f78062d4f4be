//! Queued-document transport
//!
//! Nothing is sent from here. The message is written to the `mail` pickup
//! collection, and an external mailer polls that collection and delivers.

use std::sync::Arc;

use chrono::Utc;
use gatekeeper_core::OutboundMessage;
use uuid::Uuid;

use super::{DeliveryKind, DeliveryReceipt, MailTransport, TransportError};
use crate::store::{QueuedMail, RegistrationStore, MAIL_COLLECTION};

const TRANSPORT_NAME: &str = "queue";

/// Enqueues messages for an external mailer
pub struct QueuedDocumentTransport<S> {
    store: Arc<S>,
}

impl<S> QueuedDocumentTransport<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S: RegistrationStore> MailTransport for QueuedDocumentTransport<S> {
    fn name(&self) -> &str {
        TRANSPORT_NAME
    }

    fn send(&self, message: &OutboundMessage) -> Result<DeliveryReceipt, TransportError> {
        let id = Uuid::new_v4().to_string();
        let mail = QueuedMail::from_message(id.clone(), message, Utc::now());

        self.store
            .enqueue_mail(mail)
            .map_err(|e| TransportError::DeliveryFailed {
                transport: TRANSPORT_NAME.to_string(),
                reason: format!("Failed to enqueue into {}: {}", MAIL_COLLECTION, e),
            })?;

        tracing::info!(to = %message.to, id = %id, "Email queued for external mailer");

        Ok(DeliveryReceipt {
            message_id: id,
            transport: TRANSPORT_NAME.to_string(),
            sent_via: DeliveryKind::Queued,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use gatekeeper_core::{Priority, SenderIdentity};

    #[test]
    fn test_queue_writes_document() {
        let store = Arc::new(InMemoryStore::new());
        let transport = QueuedDocumentTransport::new(store.clone());

        let message = OutboundMessage {
            to: "boss@acme.io".to_string(),
            from: SenderIdentity::for_site("Acme", None, "mailer.invalid"),
            reply_to: "acme@mailer.invalid".to_string(),
            subject: "Approve".to_string(),
            html: "<p>x</p>".to_string(),
            text: "x".to_string(),
            priority: Priority::High,
        };

        let receipt = transport.send(&message).unwrap();
        assert_eq!(receipt.sent_via, DeliveryKind::Queued);

        let queued = store.queued_mail();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].id, receipt.message_id);
        assert_eq!(queued[0].to, "boss@acme.io");
        assert_eq!(queued[0].from, "\"Acme\" <acme@mailer.invalid>");
    }
}
