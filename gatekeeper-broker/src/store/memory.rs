//! In-memory storage implementation

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{
    AdministratorAccount, MailLogEntry, PendingRegistration, Precondition, QueuedMail,
    RegistrationStore, StoreResult, Write, WriteBatch,
};
use crate::error::BrokerError;

#[derive(Default)]
struct Collections {
    pending: HashMap<String, PendingRegistration>,
    admins: HashMap<String, AdministratorAccount>,
    mail: Vec<QueuedMail>,
    mail_logs: Vec<MailLogEntry>,
    settings: HashMap<String, String>,
    writes: u64,
}

/// In-memory store.
///
/// All collections sit behind one lock so a batch commit is atomic with
/// respect to every other reader and writer.
pub struct InMemoryStore {
    data: RwLock<Collections>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(Collections::default()),
        }
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Collections>> {
        self.data
            .read()
            .map_err(|_| BrokerError::Internal("store lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Collections>> {
        self.data
            .write()
            .map_err(|_| BrokerError::Internal("store lock poisoned".to_string()))
    }

    /// Number of documents written so far (for testing purposes)
    pub fn write_count(&self) -> u64 {
        self.read().map(|d| d.writes).unwrap_or(0)
    }

    /// Documents in the mail pickup collection (for testing purposes)
    pub fn queued_mail(&self) -> Vec<QueuedMail> {
        self.read().map(|d| d.mail.clone()).unwrap_or_default()
    }

    /// Entries in the mail audit log (for testing purposes)
    pub fn mail_logs(&self) -> Vec<MailLogEntry> {
        self.read().map(|d| d.mail_logs.clone()).unwrap_or_default()
    }

    /// Number of administrators (for testing purposes)
    pub fn admin_count(&self) -> usize {
        self.read().map(|d| d.admins.len()).unwrap_or(0)
    }

    /// Overwrite a pending record as-is, bypassing token checks (for testing purposes)
    pub fn put_pending(&self, pending: PendingRegistration) -> StoreResult<()> {
        let mut data = self.write()?;
        data.pending.insert(pending.token.clone(), pending);
        data.writes += 1;
        Ok(())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistrationStore for InMemoryStore {
    fn create_pending(&self, pending: PendingRegistration) -> StoreResult<()> {
        let mut data = self.write()?;
        if data.pending.contains_key(&pending.token) {
            return Err(BrokerError::TokenConflict);
        }
        data.pending.insert(pending.token.clone(), pending);
        data.writes += 1;
        Ok(())
    }

    fn get_pending(&self, token: &str) -> StoreResult<Option<PendingRegistration>> {
        Ok(self.read()?.pending.get(token).cloned())
    }

    fn find_open_pending(&self, token: &str) -> StoreResult<Option<PendingRegistration>> {
        Ok(self
            .read()?
            .pending
            .get(token)
            .filter(|p| p.is_open())
            .cloned())
    }

    fn get_admin(&self, email: &str) -> StoreResult<Option<AdministratorAccount>> {
        Ok(self.read()?.admins.get(&email.to_lowercase()).cloned())
    }

    fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        let mut data = self.write()?;

        // Stage every write first; the collections are only touched once all
        // preconditions have held.
        let mut staged_pending: HashMap<String, PendingRegistration> = HashMap::new();
        let mut staged_admins: HashMap<String, AdministratorAccount> = HashMap::new();

        for write in batch.writes() {
            match write {
                Write::ConsumePending { token } | Write::RejectPending { token, .. } => {
                    let mut record = staged_pending
                        .get(token)
                        .or_else(|| data.pending.get(token))
                        .filter(|p| p.is_open())
                        .cloned()
                        .ok_or_else(|| {
                            BrokerError::PreconditionFailed(Precondition::PendingUnavailable {
                                token: token.clone(),
                            })
                        })?;

                    match write {
                        Write::RejectPending { rejected_at, .. } => {
                            record.rejected_at = Some(*rejected_at)
                        }
                        _ => record.verified = true,
                    }
                    staged_pending.insert(token.clone(), record);
                }
                Write::CreateAdmin(admin) => {
                    let email = admin.email.to_lowercase();
                    if staged_admins.contains_key(&email) || data.admins.contains_key(&email) {
                        return Err(BrokerError::PreconditionFailed(Precondition::AdminExists {
                            email,
                        }));
                    }
                    staged_admins.insert(
                        email.clone(),
                        AdministratorAccount {
                            email,
                            ..admin.clone()
                        },
                    );
                }
                Write::UpdateAdminNames {
                    email,
                    first_name,
                    last_name,
                } => {
                    let email = email.to_lowercase();
                    let mut admin = staged_admins
                        .get(&email)
                        .or_else(|| data.admins.get(&email))
                        .cloned()
                        .ok_or_else(|| {
                            BrokerError::PreconditionFailed(Precondition::AdminMissing {
                                email: email.clone(),
                            })
                        })?;
                    admin.first_name = first_name.clone();
                    admin.last_name = last_name.clone();
                    staged_admins.insert(email, admin);
                }
            }
        }

        data.pending.extend(staged_pending);
        data.admins.extend(staged_admins);
        data.writes += batch.len() as u64;
        Ok(())
    }

    fn enqueue_mail(&self, mail: QueuedMail) -> StoreResult<()> {
        let mut data = self.write()?;
        data.mail.push(mail);
        data.writes += 1;
        Ok(())
    }

    fn record_mail(&self, entry: MailLogEntry) -> StoreResult<()> {
        let mut data = self.write()?;
        data.mail_logs.push(entry);
        data.writes += 1;
        Ok(())
    }

    fn get_setting(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.read()?.settings.get(key).cloned())
    }

    fn set_setting(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut data = self.write()?;
        data.settings.insert(key.to_string(), value.to_string());
        data.writes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn pending(token: &str, email: &str) -> PendingRegistration {
        PendingRegistration {
            token: token.to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            verified: false,
            created_at: Utc::now(),
            rejected_at: None,
        }
    }

    fn admin(email: &str) -> AdministratorAccount {
        AdministratorAccount {
            email: email.to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_duplicate_token_rejected() {
        let store = InMemoryStore::new();
        store.create_pending(pending("t1", "a@b.com")).unwrap();

        let result = store.create_pending(pending("t1", "other@b.com"));
        assert!(matches!(result, Err(BrokerError::TokenConflict)));
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn test_commit_applies_all_writes() {
        let store = InMemoryStore::new();
        store.create_pending(pending("t1", "a@b.com")).unwrap();

        let batch = WriteBatch::new()
            .with(Write::ConsumePending {
                token: "t1".to_string(),
            })
            .with(Write::CreateAdmin(admin("a@b.com")));
        store.commit(batch).unwrap();

        assert!(store.get_pending("t1").unwrap().unwrap().verified);
        assert!(store.find_open_pending("t1").unwrap().is_none());
        assert!(store.get_admin("A@B.com").unwrap().is_some());
        assert_eq!(store.write_count(), 3);
    }

    #[test]
    fn test_failed_precondition_applies_nothing() {
        let store = InMemoryStore::new();
        store.create_pending(pending("t1", "a@b.com")).unwrap();

        // Second write fails: admin does not exist yet
        let batch = WriteBatch::new()
            .with(Write::ConsumePending {
                token: "t1".to_string(),
            })
            .with(Write::UpdateAdminNames {
                email: "a@b.com".to_string(),
                first_name: "X".to_string(),
                last_name: "Y".to_string(),
            });
        let result = store.commit(batch);

        assert!(matches!(
            result,
            Err(BrokerError::PreconditionFailed(Precondition::AdminMissing { .. }))
        ));
        assert!(!store.get_pending("t1").unwrap().unwrap().verified);
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn test_consume_twice_fails() {
        let store = InMemoryStore::new();
        store.create_pending(pending("t1", "a@b.com")).unwrap();

        let consume = || {
            WriteBatch::new().with(Write::ConsumePending {
                token: "t1".to_string(),
            })
        };
        store.commit(consume()).unwrap();

        let result = store.commit(consume());
        assert!(matches!(
            result,
            Err(BrokerError::PreconditionFailed(Precondition::PendingUnavailable { .. }))
        ));
    }

    #[test]
    fn test_rejected_record_is_not_open() {
        let store = InMemoryStore::new();
        store.create_pending(pending("t1", "a@b.com")).unwrap();

        let batch = WriteBatch::new().with(Write::RejectPending {
            token: "t1".to_string(),
            rejected_at: Utc::now(),
        });
        store.commit(batch).unwrap();

        let record = store.get_pending("t1").unwrap().unwrap();
        assert!(record.rejected_at.is_some());
        assert!(!record.verified);
        assert!(store.find_open_pending("t1").unwrap().is_none());
    }

    #[test]
    fn test_settings_roundtrip() {
        let store = InMemoryStore::new();
        assert!(store.get_setting("siteName").unwrap().is_none());

        store.set_setting("siteName", "Acme").unwrap();
        assert_eq!(store.get_setting("siteName").unwrap().as_deref(), Some("Acme"));
    }
}
