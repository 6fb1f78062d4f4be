//! Ordered fallback across transports

use gatekeeper_core::OutboundMessage;

use super::{DeliveryReceipt, MailTransport, TransportError};

/// Tries each transport once, in order, until one succeeds
#[derive(Default)]
pub struct FallbackTransport {
    transports: Vec<Box<dyn MailTransport>>,
}

impl FallbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transport with lower priority than those already present
    pub fn push(&mut self, transport: Box<dyn MailTransport>) {
        self.transports.push(transport);
    }

    pub fn with(mut self, transport: Box<dyn MailTransport>) -> Self {
        self.push(transport);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.transports.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.transports.iter().map(|t| t.name()).collect()
    }
}

impl MailTransport for FallbackTransport {
    fn name(&self) -> &str {
        "fallback"
    }

    fn send(&self, message: &OutboundMessage) -> Result<DeliveryReceipt, TransportError> {
        let mut last_error = None;

        for transport in &self.transports {
            match transport.send(message) {
                Ok(receipt) => return Ok(receipt),
                Err(e) => {
                    // Not retried; the next transport gets its turn
                    tracing::warn!(
                        transport = transport.name(),
                        error = %e,
                        "Transport failed, falling back"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            TransportError::Configuration("no mail transport configured".to_string())
        }))
    }
}
