//! SQLite-based storage implementation

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use gatekeeper_core::Priority;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};

use super::{
    AdministratorAccount, MailLogEntry, PendingRegistration, Precondition, QueuedMail,
    RegistrationStore, StoreResult, Write, WriteBatch,
};
use crate::error::BrokerError;

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

/// SQLite-based store implementing both RegistrationStore and IdentityProvider
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path
    pub fn open(path: &str) -> Result<Self, BrokerError> {
        let conn = Connection::open(path)
            .map_err(|e| BrokerError::Internal(e.to_string()))?;

        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| BrokerError::Internal(e.to_string()))?;

        Self::migrate(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub(crate) fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| BrokerError::Internal("database lock poisoned".to_string()))
    }

    /// Run database migrations
    fn migrate(conn: &Connection) -> Result<(), BrokerError> {
        let current_version = Self::get_schema_version(conn)?;

        if current_version < SCHEMA_VERSION {
            tracing::info!(
                current = current_version,
                target = SCHEMA_VERSION,
                "Running database migrations"
            );

            if current_version < 1 {
                Self::migrate_v1(conn)?;
            }

            conn.execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )
            .map_err(|e| BrokerError::Internal(e.to_string()))?;

            tracing::info!("Database migrations complete");
        }

        Ok(())
    }

    /// Get current schema version (0 if no schema exists)
    fn get_schema_version(conn: &Connection) -> Result<i32, BrokerError> {
        let table_exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
                [],
                |row| row.get(0),
            )
            .map_err(|e| BrokerError::Internal(e.to_string()))?;

        if !table_exists {
            return Ok(0);
        }

        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get::<_, Option<i32>>(0).map(|v| v.unwrap_or(0))
        })
        .map_err(|e| BrokerError::Internal(e.to_string()))
    }

    /// Migration to version 1: initial schema
    fn migrate_v1(conn: &Connection) -> Result<(), BrokerError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            );

            CREATE TABLE IF NOT EXISTS pending_admins (
                token TEXT PRIMARY KEY,
                email TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                verified INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                rejected_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_pending_admins_email ON pending_admins(email);

            CREATE TABLE IF NOT EXISTS admins (
                email TEXT PRIMARY KEY,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            -- Pickup collection for an external mailer
            CREATE TABLE IF NOT EXISTS mail (
                id TEXT PRIMARY KEY,
                to_addr TEXT NOT NULL,
                from_addr TEXT NOT NULL,
                reply_to TEXT NOT NULL,
                subject TEXT NOT NULL,
                html TEXT NOT NULL,
                text TEXT NOT NULL,
                priority TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS mail_logs (
                id TEXT PRIMARY KEY,
                to_addr TEXT NOT NULL,
                subject TEXT NOT NULL,
                transport TEXT NOT NULL,
                sent_via TEXT,
                message_id TEXT,
                success INTEGER NOT NULL,
                error TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS identity_accounts (
                uid TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                email_verified INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| BrokerError::Internal(e.to_string()))?;

        Ok(())
    }

    /// Count the rows of a table (for testing purposes)
    pub fn count_rows(&self, table: &str) -> StoreResult<u64> {
        // Table names cannot be bound as parameters
        let allowed = [
            "pending_admins",
            "admins",
            "mail",
            "mail_logs",
            "settings",
            "identity_accounts",
        ];
        if !allowed.contains(&table) {
            return Err(BrokerError::Internal(format!("unknown table {}", table)));
        }

        let conn = self.lock()?;
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
            row.get::<_, i64>(0)
        })
        .map(|n| n as u64)
        .map_err(|e| BrokerError::Internal(e.to_string()))
    }
}

/// Parse a stored RFC 3339 timestamp; `column` is reported on failure
pub(crate) fn parse_timestamp(value: &str, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn priority_as_str(priority: Priority) -> &'static str {
    match priority {
        Priority::High => "high",
        Priority::Normal => "normal",
        Priority::Low => "low",
    }
}

fn row_to_pending(row: &rusqlite::Row<'_>) -> rusqlite::Result<PendingRegistration> {
    let verified: i32 = row.get(5)?;
    let created_at: String = row.get(6)?;
    let rejected_at: Option<String> = row.get(7)?;
    Ok(PendingRegistration {
        token: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        verified: verified != 0,
        created_at: parse_timestamp(&created_at, 6)?,
        rejected_at: rejected_at
            .as_deref()
            .map(|value| parse_timestamp(value, 7))
            .transpose()?,
    })
}

const PENDING_COLUMNS: &str =
    "token, email, password_hash, first_name, last_name, verified, created_at, rejected_at";

fn commit_failed(e: rusqlite::Error) -> BrokerError {
    BrokerError::StoreCommitFailed(e.to_string())
}

fn apply_write(tx: &Transaction<'_>, write: &Write) -> StoreResult<()> {
    match write {
        Write::ConsumePending { token } => {
            let rows = tx
                .execute(
                    "UPDATE pending_admins SET verified = 1
                     WHERE token = ?1 AND verified = 0 AND rejected_at IS NULL",
                    params![token],
                )
                .map_err(commit_failed)?;
            if rows == 0 {
                return Err(BrokerError::PreconditionFailed(
                    Precondition::PendingUnavailable {
                        token: token.clone(),
                    },
                ));
            }
        }
        Write::RejectPending { token, rejected_at } => {
            let rows = tx
                .execute(
                    "UPDATE pending_admins SET rejected_at = ?1
                     WHERE token = ?2 AND verified = 0 AND rejected_at IS NULL",
                    params![rejected_at.to_rfc3339(), token],
                )
                .map_err(commit_failed)?;
            if rows == 0 {
                return Err(BrokerError::PreconditionFailed(
                    Precondition::PendingUnavailable {
                        token: token.clone(),
                    },
                ));
            }
        }
        Write::CreateAdmin(admin) => {
            let email = admin.email.to_lowercase();
            tx.execute(
                "INSERT INTO admins (email, first_name, last_name, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    email,
                    admin.first_name,
                    admin.last_name,
                    admin.created_at.to_rfc3339()
                ],
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    BrokerError::PreconditionFailed(Precondition::AdminExists {
                        email: email.clone(),
                    })
                } else {
                    commit_failed(e)
                }
            })?;
        }
        Write::UpdateAdminNames {
            email,
            first_name,
            last_name,
        } => {
            let email = email.to_lowercase();
            let rows = tx
                .execute(
                    "UPDATE admins SET first_name = ?1, last_name = ?2 WHERE email = ?3",
                    params![first_name, last_name, email],
                )
                .map_err(commit_failed)?;
            if rows == 0 {
                return Err(BrokerError::PreconditionFailed(Precondition::AdminMissing {
                    email,
                }));
            }
        }
    }
    Ok(())
}

impl RegistrationStore for SqliteStore {
    fn create_pending(&self, pending: PendingRegistration) -> StoreResult<()> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO pending_admins
             (token, email, password_hash, first_name, last_name, verified, created_at, rejected_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                pending.token,
                pending.email,
                pending.password_hash,
                pending.first_name,
                pending.last_name,
                pending.verified as i32,
                pending.created_at.to_rfc3339(),
                pending.rejected_at.map(|t| t.to_rfc3339()),
            ],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                return BrokerError::TokenConflict;
            }
            BrokerError::Internal(e.to_string())
        })?;

        Ok(())
    }

    fn get_pending(&self, token: &str) -> StoreResult<Option<PendingRegistration>> {
        let conn = self.lock()?;

        conn.query_row(
            &format!("SELECT {} FROM pending_admins WHERE token = ?1", PENDING_COLUMNS),
            params![token],
            row_to_pending,
        )
        .optional()
        .map_err(|e| BrokerError::Internal(e.to_string()))
    }

    fn find_open_pending(&self, token: &str) -> StoreResult<Option<PendingRegistration>> {
        let conn = self.lock()?;

        conn.query_row(
            &format!(
                "SELECT {} FROM pending_admins
                 WHERE token = ?1 AND verified = 0 AND rejected_at IS NULL",
                PENDING_COLUMNS
            ),
            params![token],
            row_to_pending,
        )
        .optional()
        .map_err(|e| BrokerError::Internal(e.to_string()))
    }

    fn get_admin(&self, email: &str) -> StoreResult<Option<AdministratorAccount>> {
        let conn = self.lock()?;

        conn.query_row(
            "SELECT email, first_name, last_name, created_at FROM admins WHERE email = ?1",
            params![email.to_lowercase()],
            |row| {
                let created_at: String = row.get(3)?;
                Ok(AdministratorAccount {
                    email: row.get(0)?,
                    first_name: row.get(1)?,
                    last_name: row.get(2)?,
                    created_at: parse_timestamp(&created_at, 3)?,
                })
            },
        )
        .optional()
        .map_err(|e| BrokerError::Internal(e.to_string()))
    }

    fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        let mut conn = self.lock()?;

        // IMMEDIATE takes the write lock up front so the precondition checks
        // and the writes see the same snapshot across processes.
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(commit_failed)?;

        for write in batch.writes() {
            // Dropping the transaction on error rolls it back
            apply_write(&tx, write)?;
        }

        tx.commit().map_err(commit_failed)
    }

    fn enqueue_mail(&self, mail: QueuedMail) -> StoreResult<()> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO mail (id, to_addr, from_addr, reply_to, subject, html, text, priority, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                mail.id,
                mail.to,
                mail.from,
                mail.reply_to,
                mail.subject,
                mail.html,
                mail.text,
                priority_as_str(mail.priority),
                mail.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| BrokerError::Internal(e.to_string()))?;

        Ok(())
    }

    fn record_mail(&self, entry: MailLogEntry) -> StoreResult<()> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO mail_logs (id, to_addr, subject, transport, sent_via, message_id, success, error, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                entry.id,
                entry.to,
                entry.subject,
                entry.transport,
                entry.sent_via.map(|v| v.as_str()),
                entry.message_id,
                entry.success as i32,
                entry.error,
                entry.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| BrokerError::Internal(e.to_string()))?;

        Ok(())
    }

    fn get_setting(&self, key: &str) -> StoreResult<Option<String>> {
        let conn = self.lock()?;

        conn.query_row(
            "SELECT value FROM settings WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| BrokerError::Internal(e.to_string()))
    }

    fn set_setting(&self, key: &str, value: &str) -> StoreResult<()> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )
        .map_err(|e| BrokerError::Internal(e.to_string()))?;

        Ok(())
    }
}
