//! Console-based transport for development

use gatekeeper_core::OutboundMessage;
use uuid::Uuid;

use super::{DeliveryKind, DeliveryReceipt, MailTransport, TransportError};

/// Transport that prints messages to the console (for development)
pub struct ConsoleTransport;

impl ConsoleTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConsoleTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MailTransport for ConsoleTransport {
    fn name(&self) -> &str {
        "console"
    }

    fn send(&self, message: &OutboundMessage) -> Result<DeliveryReceipt, TransportError> {
        let message_id = format!("console-{}", Uuid::new_v4());

        println!();
        println!("========================================");
        println!("  TO:      {}", message.to);
        println!("  FROM:    {}", message.from.to_header());
        println!("  SUBJECT: {}", message.subject);
        println!("----------------------------------------");
        println!("{}", message.text);
        println!("========================================");
        println!();

        tracing::info!(to = %message.to, message_id = %message_id, "Email printed to console");

        Ok(DeliveryReceipt {
            message_id,
            transport: "console".to_string(),
            sent_via: DeliveryKind::Direct,
        })
    }
}
