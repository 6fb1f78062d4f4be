//! Storage abstractions for the broker

pub mod memory;
pub mod models;
pub mod sqlite;

pub use memory::InMemoryStore;
pub use models::*;
pub use sqlite::SqliteStore;

use crate::error::BrokerError;

/// Result type for store operations
pub type StoreResult<T> = Result<T, BrokerError>;

/// Settings key for the site display name
pub const SETTING_SITE_NAME: &str = "siteName";
/// Settings key for the site contact address
pub const SETTING_CONTACT_EMAIL: &str = "contactEmail";

/// Document store behind pending registrations, administrators, the mail
/// pickup collection, the mail audit log and site settings
pub trait RegistrationStore: Send + Sync {
    /// Store a new pending registration.
    ///
    /// Fails with [`BrokerError::TokenConflict`] if the token was ever used.
    fn create_pending(&self, pending: PendingRegistration) -> StoreResult<()>;

    /// Get a pending registration by token, whatever its state
    fn get_pending(&self, token: &str) -> StoreResult<Option<PendingRegistration>>;

    /// Get a pending registration by token if it is neither verified nor rejected
    fn find_open_pending(&self, token: &str) -> StoreResult<Option<PendingRegistration>>;

    /// Get an administrator by email
    fn get_admin(&self, email: &str) -> StoreResult<Option<AdministratorAccount>>;

    /// Apply a batch atomically, checking each write's precondition at
    /// commit time. Nothing is applied if any check fails.
    fn commit(&self, batch: WriteBatch) -> StoreResult<()>;

    /// Append a document to the mail pickup collection
    fn enqueue_mail(&self, mail: QueuedMail) -> StoreResult<()>;

    /// Append an entry to the mail audit log
    fn record_mail(&self, entry: MailLogEntry) -> StoreResult<()>;

    /// Read a site setting
    fn get_setting(&self, key: &str) -> StoreResult<Option<String>>;

    /// Write a site setting
    fn set_setting(&self, key: &str, value: &str) -> StoreResult<()>;
}
