//! Email address handling and sender identity

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Local part used when no site name survives slugging
const DEFAULT_SLUG: &str = "noreply";

/// Normalize an email address (trim, lowercase) and check its basic shape.
///
/// This is not RFC 5322 validation. It rejects what cannot possibly be
/// delivered: missing or repeated `@`, empty parts, whitespace, a domain
/// without a dot.
pub fn normalize_email(raw: &str) -> Result<String> {
    let email = raw.trim().to_lowercase();
    let invalid = || Error::InvalidEmail(raw.trim().to_string());

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty()
        || domain.is_empty()
        || domain.contains('@')
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
        || email.chars().any(|c| c.is_whitespace() || c.is_control())
    {
        return Err(invalid());
    }

    Ok(email)
}

/// Turn a site display name into a lowercase address-safe slug.
///
/// Runs of anything other than ASCII letters and digits collapse into a
/// single `-`. Non-ASCII letters are dropped rather than transliterated.
pub fn site_slug(site_name: &str) -> String {
    let mut slug = String::with_capacity(site_name.len());
    let mut pending_dash = false;

    for c in site_name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        DEFAULT_SLUG.to_string()
    } else {
        slug
    }
}

/// Who an outbound message claims to be from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderIdentity {
    /// Display name shown in mail clients
    pub name: String,
    /// Envelope/header address
    pub address: String,
}

impl SenderIdentity {
    /// Derive the sender for a site.
    ///
    /// The configured contact address wins; otherwise an address is
    /// synthesized from the site name at `fallback_domain`.
    pub fn for_site(site_name: &str, contact: Option<&str>, fallback_domain: &str) -> Self {
        let address = contact
            .and_then(|c| normalize_email(c).ok())
            .unwrap_or_else(|| format!("{}@{}", site_slug(site_name), fallback_domain));

        Self {
            name: site_name.to_string(),
            address,
        }
    }

    /// `Name <address>` form
    pub fn to_header(&self) -> String {
        format!("\"{}\" <{}>", self.name.replace('"', "'"), self.address)
    }
}
