//! Broker application state

use std::sync::Arc;

use crate::approval::ApprovalPolicy;
use crate::config::Config;
use crate::email::MailTransport;
use crate::identity::IdentityProvider;
use crate::issuer::Issuer;
use crate::notifier::Notifier;
use crate::store::RegistrationStore;

/// Shared state handed to every handler
pub struct AppState<S, I, T> {
    pub store: Arc<S>,
    pub identity: Arc<I>,
    pub notifier: Notifier<S, T>,
    pub issuer: Issuer,
    pub policy: ApprovalPolicy,
    /// Linked from the approval success page
    pub login_url: String,
}

impl<S, I, T> AppState<S, I, T>
where
    S: RegistrationStore,
    I: IdentityProvider,
    T: MailTransport,
{
    pub fn new(config: &Config, store: Arc<S>, identity: Arc<I>, transport: T) -> Self {
        let notifier = Notifier::new(
            store.clone(),
            transport,
            config.site.clone(),
            config.supports_reject_link,
            config.token_ttl_hours,
        );

        Self {
            store,
            identity,
            notifier,
            issuer: Issuer::new(
                &config.public_base_url,
                config.approver_email.clone(),
                config.bcrypt_cost,
            ),
            policy: ApprovalPolicy::new(config.token_ttl_hours),
            login_url: config.login_url.clone(),
        }
    }
}
