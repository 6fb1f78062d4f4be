//! Gatekeeper Core Library
//!
//! Building blocks for email-based administrator approval:
//! - Approval tokens that are embedded in links and consumed once
//! - Address normalization and sender identity derivation
//! - Rendering of the approval email in HTML and plain text

pub mod address;
pub mod error;
pub mod message;
pub mod token;

pub use address::{normalize_email, site_slug, SenderIdentity};
pub use error::Error;
pub use message::{escape_html, ApprovalEmail, OutboundMessage, Priority};
pub use token::{generate_approval_token, ApprovalToken};

/// Result type for gatekeeper-core operations
pub type Result<T> = std::result::Result<T, Error>;
