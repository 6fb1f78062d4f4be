//! Identity accounts stored alongside the registration data in SQLite

use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use super::{IdentityAccount, IdentityError, IdentityProvider};
use crate::store::sqlite::{is_constraint_violation, parse_timestamp};
use crate::store::SqliteStore;

fn backend(e: impl std::fmt::Display) -> IdentityError {
    IdentityError::Backend(e.to_string())
}

fn row_to_account(row: &rusqlite::Row<'_>) -> rusqlite::Result<IdentityAccount> {
    let verified: i32 = row.get(3)?;
    let created_at: String = row.get(4)?;
    Ok(IdentityAccount {
        uid: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        email_verified: verified != 0,
        created_at: parse_timestamp(&created_at, 4)?,
    })
}

impl IdentityProvider for SqliteStore {
    fn create_account(
        &self,
        email: &str,
        password_hash: &str,
        email_verified: bool,
    ) -> Result<IdentityAccount, IdentityError> {
        let account = IdentityAccount {
            uid: Uuid::new_v4().to_string(),
            email: email.to_lowercase(),
            password_hash: password_hash.to_string(),
            email_verified,
            created_at: Utc::now(),
        };

        let conn = self.lock().map_err(backend)?;
        conn.execute(
            "INSERT INTO identity_accounts (uid, email, password_hash, email_verified, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                account.uid,
                account.email,
                account.password_hash,
                account.email_verified as i32,
                account.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                return IdentityError::AlreadyExists {
                    email: account.email.clone(),
                };
            }
            backend(e)
        })?;

        Ok(account)
    }

    fn get_account_by_email(&self, email: &str) -> Result<Option<IdentityAccount>, IdentityError> {
        let conn = self.lock().map_err(backend)?;

        conn.query_row(
            "SELECT uid, email, password_hash, email_verified, created_at
             FROM identity_accounts WHERE email = ?1",
            params![email.to_lowercase()],
            row_to_account,
        )
        .optional()
        .map_err(backend)
    }

    fn update_account(
        &self,
        uid: &str,
        password_hash: &str,
        email_verified: bool,
    ) -> Result<IdentityAccount, IdentityError> {
        let conn = self.lock().map_err(backend)?;

        let rows = conn
            .execute(
                "UPDATE identity_accounts SET password_hash = ?1, email_verified = ?2 WHERE uid = ?3",
                params![password_hash, email_verified as i32, uid],
            )
            .map_err(backend)?;
        if rows == 0 {
            return Err(IdentityError::NotFound(uid.to_string()));
        }

        conn.query_row(
            "SELECT uid, email, password_hash, email_verified, created_at
             FROM identity_accounts WHERE uid = ?1",
            params![uid],
            row_to_account,
        )
        .map_err(backend)
    }
}
