//! Broker configuration
//!
//! Everything is read from environment variables and has a default, except
//! mail credentials: a transport without credentials is simply not built.

use crate::crypto::BCRYPT_COST;
use crate::email::{ApiConfig, SmtpConfig};

/// Default site display name
pub const DEFAULT_SITE_NAME: &str = "Admin Portal";
/// Domain used for the synthesized sender address
pub const DEFAULT_FALLBACK_SENDER_DOMAIN: &str = "mailer.invalid";
/// Default approval token lifetime
pub const DEFAULT_TOKEN_TTL_HOURS: u32 = 24;

/// A mail transport that may appear in the priority list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Smtp,
    Api,
    Queue,
    Console,
}

impl TransportKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "smtp" => Some(TransportKind::Smtp),
            "api" => Some(TransportKind::Api),
            "queue" => Some(TransportKind::Queue),
            "console" => Some(TransportKind::Console),
            _ => None,
        }
    }

    /// Priority used when `MAIL_TRANSPORTS` is not set
    pub fn default_priority() -> Vec<Self> {
        vec![
            TransportKind::Smtp,
            TransportKind::Api,
            TransportKind::Queue,
            TransportKind::Console,
        ]
    }
}

/// Mail transport selection
#[derive(Debug, Clone)]
pub struct MailConfig {
    /// Transports to try, highest priority first
    pub priority: Vec<TransportKind>,
    pub smtp: Option<SmtpConfig>,
    pub api: Option<ApiConfig>,
    pub smtp_disabled: bool,
    pub api_disabled: bool,
    pub queue_enabled: bool,
    pub console_enabled: bool,
}

/// Site identity used in emails, overridable through the settings store
#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub name: String,
    pub contact_email: Option<String>,
    pub fallback_sender_domain: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Port to listen on
    pub port: u16,

    /// Base URL approval links are built from
    pub public_base_url: String,

    /// Where the success page sends the new administrator
    pub login_url: String,

    /// SQLite database file; in-memory storage when unset
    pub database_path: Option<String>,

    pub site: SiteConfig,

    /// Recipient of approval emails; the requester when unset
    pub approver_email: Option<String>,

    /// Whether approval emails carry a reject link
    pub supports_reject_link: bool,

    pub token_ttl_hours: u32,

    pub bcrypt_cost: u32,

    pub mail: MailConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

/// Strip surrounding whitespace and one level of matching quotes
fn normalize_value(raw: String) -> String {
    let trimmed = raw.trim();

    if let Some(inner) = trimmed.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        return inner.trim().to_string();
    }
    if let Some(inner) = trimmed.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        return inner.trim().to_string();
    }

    trimmed.to_string()
}

/// Normalize the approver address. An unusable value is kept as given so
/// registrations fail at send time instead of mailing the requester.
fn parse_approver(value: Option<String>) -> Option<String> {
    let raw = value?;
    match gatekeeper_core::normalize_email(&raw) {
        Ok(email) => Some(email),
        Err(e) => {
            tracing::warn!(
                approver = %raw,
                error = %e,
                "APPROVER_EMAIL is not a usable address"
            );
            Some(raw)
        }
    }
}

fn parse_flag(value: Option<String>) -> bool {
    matches!(
        value.as_deref().map(str::to_lowercase).as_deref(),
        Some("1") | Some("true") | Some("yes") | Some("on")
    )
}

impl Config {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        // Non-empty, normalized values only
        let get = |key: &str| {
            lookup(key)
                .map(normalize_value)
                .filter(|s| !s.is_empty())
        };

        let port = get("PORT").and_then(|s| s.parse().ok()).unwrap_or(3000);

        let public_base_url = get("PUBLIC_BASE_URL")
            .unwrap_or_else(|| format!("http://localhost:{}", port))
            .trim_end_matches('/')
            .to_string();

        let login_url = get("LOGIN_URL").unwrap_or_else(|| format!("{}/login", public_base_url));

        let priority = match get("MAIL_TRANSPORTS") {
            Some(list) => {
                let mut kinds = Vec::new();
                for item in list.split(',').filter(|s| !s.trim().is_empty()) {
                    match TransportKind::parse(item) {
                        Some(kind) if !kinds.contains(&kind) => kinds.push(kind),
                        Some(_) => {}
                        None => tracing::warn!(
                            transport = %item.trim(),
                            "Ignoring unknown mail transport"
                        ),
                    }
                }
                kinds
            }
            None => TransportKind::default_priority(),
        };

        Self {
            port,
            public_base_url,
            login_url,
            database_path: get("DATABASE_PATH"),
            site: SiteConfig {
                name: get("SITE_NAME")
                    .unwrap_or_else(|| DEFAULT_SITE_NAME.to_string()),
                contact_email: get("SITE_CONTACT_EMAIL"),
                fallback_sender_domain: get("FALLBACK_SENDER_DOMAIN")
                    .unwrap_or_else(|| DEFAULT_FALLBACK_SENDER_DOMAIN.to_string()),
            },
            approver_email: parse_approver(get("APPROVER_EMAIL")),
            supports_reject_link: parse_flag(get("SUPPORTS_REJECT_LINK")),
            token_ttl_hours: get("APPROVAL_TOKEN_TTL_HOURS")
                .and_then(|s| s.parse().ok())
                .filter(|h| *h > 0)
                .unwrap_or(DEFAULT_TOKEN_TTL_HOURS),
            bcrypt_cost: get("BCRYPT_COST")
                .and_then(|s| s.parse().ok())
                .filter(|c| (4..=31).contains(c))
                .unwrap_or(BCRYPT_COST),
            mail: MailConfig {
                priority,
                smtp: SmtpConfig::from_lookup(&get),
                api: ApiConfig::from_lookup(&get),
                smtp_disabled: parse_flag(get("SMTP_DISABLED")),
                api_disabled: parse_flag(get("MAIL_API_DISABLED")),
                queue_enabled: parse_flag(get("MAIL_QUEUE_ENABLED")),
                console_enabled: parse_flag(get("MAIL_CONSOLE_ENABLED")),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(move |key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.public_base_url, "http://localhost:3000");
        assert_eq!(config.login_url, "http://localhost:3000/login");
        assert_eq!(config.site.name, DEFAULT_SITE_NAME);
        assert_eq!(config.token_ttl_hours, 24);
        assert!(!config.supports_reject_link);
        assert!(config.mail.smtp.is_none());
        assert!(config.mail.api.is_none());
        assert_eq!(config.mail.priority, TransportKind::default_priority());
    }

    #[test]
    fn test_values_are_normalized() {
        let config = config_from(&[
            ("PUBLIC_BASE_URL", " \"https://admin.acme.io/\" "),
            ("SITE_NAME", "'Acme'"),
            ("SUPPORTS_REJECT_LINK", "TRUE"),
            ("SITE_CONTACT_EMAIL", "   "),
        ]);
        assert_eq!(config.public_base_url, "https://admin.acme.io");
        assert_eq!(config.site.name, "Acme");
        assert!(config.supports_reject_link);
        assert!(config.site.contact_email.is_none());
    }

    #[test]
    fn test_approver_email_is_normalized() {
        let config = config_from(&[("APPROVER_EMAIL", " \"Boss@Acme.IO\" ")]);
        assert_eq!(config.approver_email.as_deref(), Some("boss@acme.io"));

        let config = config_from(&[("APPROVER_EMAIL", "not an address")]);
        assert_eq!(config.approver_email.as_deref(), Some("not an address"));

        assert!(config_from(&[]).approver_email.is_none());
    }

    #[test]
    fn test_smtp_requires_credentials() {
        let config = config_from(&[("SMTP_HOST", "smtp.acme.io"), ("SMTP_USERNAME", "ops")]);
        assert!(config.mail.smtp.is_none());

        let config = config_from(&[
            ("SMTP_HOST", "smtp.acme.io"),
            ("SMTP_USERNAME", "ops"),
            ("SMTP_PASSWORD", "secret"),
            ("SMTP_PORT", "587"),
        ]);
        let smtp = config.mail.smtp.unwrap();
        assert_eq!(smtp.port, 587);
    }

    #[test]
    fn test_transport_priority_parsing() {
        let config = config_from(&[("MAIL_TRANSPORTS", "queue, smtp,bogus,queue")]);
        assert_eq!(
            config.mail.priority,
            vec![TransportKind::Queue, TransportKind::Smtp]
        );
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let config = config_from(&[
            ("PORT", "eighty"),
            ("APPROVAL_TOKEN_TTL_HOURS", "0"),
            ("BCRYPT_COST", "99"),
        ]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.token_ttl_hours, DEFAULT_TOKEN_TTL_HOURS);
        assert_eq!(config.bcrypt_cost, BCRYPT_COST);
    }
}
