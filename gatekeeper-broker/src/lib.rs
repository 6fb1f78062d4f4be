//! Gatekeeper Broker
//!
//! Issues administrator registration requests, emails an approval link
//! through one of several interchangeable transports, and promotes the
//! pending registration when the link is followed.

pub mod approval;
pub mod config;
pub mod crypto;
pub mod email;
pub mod error;
pub mod identity;
pub mod issuer;
pub mod notifier;
pub mod routes;
pub mod state;
pub mod store;

pub use approval::{approve, reject, ApprovalPolicy, ApprovedAdmin, IdentityStatus, RejectedRequest};
pub use config::{Config, MailConfig, SiteConfig, TransportKind};
pub use email::{
    build_transport_chain, spawn_transport_chain, ApiConfig, ConsoleTransport, DeliveryKind,
    DeliveryReceipt, FallbackTransport, MailTransport, QueuedDocumentTransport, SmtpConfig,
    SmtpRelayTransport, TransactionalApiTransport, TransportError,
};
pub use error::BrokerError;
pub use identity::{IdentityProvider, IdentityUpsert, InMemoryIdentityProvider};
pub use issuer::{IssuedRegistration, Issuer, RegistrationRequest};
pub use notifier::{Notifier, NotifyRequest};
pub use state::AppState;
pub use store::{InMemoryStore, RegistrationStore, SqliteStore};
