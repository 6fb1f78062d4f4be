//! Data models for broker storage

use chrono::{DateTime, Duration, Utc};
use gatekeeper_core::{OutboundMessage, Priority};
use serde::{Deserialize, Serialize};

use crate::email::DeliveryKind;

/// Collection holding pending registrations
pub const PENDING_COLLECTION: &str = "pending_admins";
/// Collection holding administrator accounts
pub const ADMIN_COLLECTION: &str = "admins";
/// Pickup collection polled by the external mailer
pub const MAIL_COLLECTION: &str = "mail";
/// Audit trail of send attempts
pub const MAIL_LOG_COLLECTION: &str = "mail_logs";

/// An unapproved request for administrator access
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRegistration {
    /// Single-use approval token, unique across all records
    pub token: String,
    pub email: String,
    /// bcrypt hash of the candidate password
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    /// Flipped to true exactly once, by approval
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    /// Set when the reject link was used
    pub rejected_at: Option<DateTime<Utc>>,
}

impl PendingRegistration {
    /// Still waiting for a decision
    pub fn is_open(&self) -> bool {
        !self.verified && self.rejected_at.is_none()
    }

    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        self.created_at + ttl < now
    }
}

/// An approved administrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdministratorAccount {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Set on first approval only
    pub created_at: DateTime<Utc>,
}

/// Document written to the pickup collection for an external mailer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedMail {
    pub id: String,
    pub to: String,
    pub from: String,
    pub reply_to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
}

impl QueuedMail {
    pub fn from_message(id: String, message: &OutboundMessage, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            to: message.to.clone(),
            from: message.from.to_header(),
            reply_to: message.reply_to.clone(),
            subject: message.subject.clone(),
            html: message.html.clone(),
            text: message.text.clone(),
            priority: message.priority,
            created_at,
        }
    }
}

/// Audit record of one send attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailLogEntry {
    pub id: String,
    pub to: String,
    pub subject: String,
    pub transport: String,
    pub sent_via: Option<DeliveryKind>,
    pub message_id: Option<String>,
    pub success: bool,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A single document mutation inside a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Write {
    /// Mark an open pending record verified. Requires the record to be open
    /// at commit time.
    ConsumePending { token: String },
    /// Mark an open pending record rejected. Same precondition as consume.
    RejectPending {
        token: String,
        rejected_at: DateTime<Utc>,
    },
    /// Insert an administrator. Requires that none exists for the email.
    CreateAdmin(AdministratorAccount),
    /// Refresh an administrator's names. Requires that it exists.
    UpdateAdminNames {
        email: String,
        first_name: String,
        last_name: String,
    },
}

/// Writes that are applied all together or not at all
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    writes: Vec<Write>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, write: Write) -> Self {
        self.writes.push(write);
        self
    }

    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

/// Which commit-time check failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    /// The pending record is missing, consumed or rejected
    PendingUnavailable { token: String },
    /// An administrator already exists for the email
    AdminExists { email: String },
    /// No administrator exists for the email
    AdminMissing { email: String },
}
