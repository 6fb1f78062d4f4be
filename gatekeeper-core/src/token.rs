//! Approval tokens
//!
//! A token is 32 bytes from the OS random source, encoded as base64url
//! without padding so it can be dropped into a query string unescaped.

use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Number of random bytes in a token
pub const TOKEN_BYTES: usize = 32;

/// An opaque, single-use approval credential
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApprovalToken(String);

impl ApprovalToken {
    /// Wrap a token received from a link.
    ///
    /// Only trims surrounding whitespace; whether the token exists is a
    /// question for the store.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidToken);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Short prefix that is safe to put in logs
    pub fn redacted(&self) -> String {
        let prefix: String = self.0.chars().take(6).collect();
        format!("{}…", prefix)
    }
}

// Tokens are credentials; keep them out of debug output.
impl fmt::Debug for ApprovalToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ApprovalToken").field(&self.redacted()).finish()
    }
}

/// Generate a fresh approval token
pub fn generate_approval_token() -> ApprovalToken {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    ApprovalToken(URL_SAFE_NO_PAD.encode(bytes))
}
