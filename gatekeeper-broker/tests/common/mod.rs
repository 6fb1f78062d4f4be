//! Common test utilities for broker integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;

use axum_test::TestServer;
use chrono::{DateTime, Utc};
use gatekeeper_broker::crypto::hash_password;
use gatekeeper_broker::store::{
    AdministratorAccount, MailLogEntry, PendingRegistration, QueuedMail, StoreResult, WriteBatch,
};
use gatekeeper_broker::{
    routes, AppState, BrokerError, Config, DeliveryKind, DeliveryReceipt, InMemoryIdentityProvider,
    InMemoryStore, MailTransport, RegistrationStore, SqliteStore, TransportError,
};
use gatekeeper_core::OutboundMessage;
use tempfile::TempDir;

pub const BASE_URL: &str = "https://admin.test";

/// Mock transport that captures outbound messages
#[derive(Default, Clone)]
pub struct MockTransport {
    /// Captured messages, oldest first
    pub sent: Arc<RwLock<Vec<OutboundMessage>>>,
    /// When set, every send fails with this error
    pub failure: Arc<RwLock<Option<TransportError>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_with(&self, error: TransportError) {
        *self.failure.write().unwrap() = Some(error);
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.read().unwrap().clone()
    }

    /// Get the last message sent to an address
    pub fn last_to(&self, to: &str) -> Option<OutboundMessage> {
        self.sent
            .read()
            .unwrap()
            .iter()
            .rev()
            .find(|m| m.to == to)
            .cloned()
    }
}

impl MailTransport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    fn send(&self, message: &OutboundMessage) -> Result<DeliveryReceipt, TransportError> {
        if let Some(error) = self.failure.read().unwrap().clone() {
            return Err(error);
        }

        let mut sent = self.sent.write().unwrap();
        sent.push(message.clone());

        Ok(DeliveryReceipt {
            message_id: format!("mock-{}", sent.len()),
            transport: "mock".to_string(),
            sent_via: DeliveryKind::Direct,
        })
    }
}

/// Config for tests: fast bcrypt, fixed base URL, reject links on
pub fn test_config() -> Config {
    test_config_with(&[])
}

/// Test config with extra variables layered on top
pub fn test_config_with(extra: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = [
        ("PUBLIC_BASE_URL", BASE_URL),
        ("LOGIN_URL", "https://admin.test/login"),
        ("SITE_NAME", "Test Portal"),
        ("SUPPORTS_REJECT_LINK", "true"),
        ("BCRYPT_COST", "4"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    for (k, v) in extra {
        vars.insert(k.to_string(), v.to_string());
    }

    Config::from_lookup(move |key| vars.get(key).cloned())
}

pub struct TestContext {
    pub server: TestServer,
    pub store: Arc<InMemoryStore>,
    pub identity: Arc<InMemoryIdentityProvider>,
    pub transport: MockTransport,
}

/// Create a test server backed by in-memory stores and a mock transport
pub fn create_test_server() -> TestContext {
    create_test_server_with(test_config())
}

pub fn create_test_server_with(config: Config) -> TestContext {
    let store = Arc::new(InMemoryStore::new());
    let identity = Arc::new(InMemoryIdentityProvider::new());
    let transport = MockTransport::new();

    let state = Arc::new(AppState::new(
        &config,
        store.clone(),
        identity.clone(),
        transport.clone(),
    ));

    let app = routes::create_router(state);
    let server = TestServer::new(app).expect("Failed to create test server");

    TestContext {
        server,
        store,
        identity,
        transport,
    }
}

/// Create a test server backed by a SQLite file that also holds identities
pub fn create_sqlite_test_server() -> (TestServer, Arc<SqliteStore>, MockTransport, TempDir) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("gatekeeper.db");
    let store =
        Arc::new(SqliteStore::open(path.to_str().unwrap()).expect("Failed to open store"));
    let transport = MockTransport::new();

    let state = Arc::new(AppState::new(
        &test_config(),
        store.clone(),
        store.clone(),
        transport.clone(),
    ));

    let server =
        TestServer::new(routes::create_router(state)).expect("Failed to create test server");
    (server, store, transport, dir)
}

/// In-memory store whose batch commits always fail
#[derive(Default)]
pub struct FailingCommitStore {
    pub inner: InMemoryStore,
}

impl RegistrationStore for FailingCommitStore {
    fn create_pending(&self, pending: PendingRegistration) -> StoreResult<()> {
        self.inner.create_pending(pending)
    }

    fn get_pending(&self, token: &str) -> StoreResult<Option<PendingRegistration>> {
        self.inner.get_pending(token)
    }

    fn find_open_pending(&self, token: &str) -> StoreResult<Option<PendingRegistration>> {
        self.inner.find_open_pending(token)
    }

    fn get_admin(&self, email: &str) -> StoreResult<Option<AdministratorAccount>> {
        self.inner.get_admin(email)
    }

    fn commit(&self, _batch: WriteBatch) -> StoreResult<()> {
        Err(BrokerError::StoreCommitFailed("disk I/O error".to_string()))
    }

    fn enqueue_mail(&self, mail: QueuedMail) -> StoreResult<()> {
        self.inner.enqueue_mail(mail)
    }

    fn record_mail(&self, entry: MailLogEntry) -> StoreResult<()> {
        self.inner.record_mail(entry)
    }

    fn get_setting(&self, key: &str) -> StoreResult<Option<String>> {
        self.inner.get_setting(key)
    }

    fn set_setting(&self, key: &str, value: &str) -> StoreResult<()> {
        self.inner.set_setting(key, value)
    }
}

/// Create a test server whose store cannot commit
pub fn create_failing_commit_server() -> (TestServer, Arc<FailingCommitStore>) {
    let store = Arc::new(FailingCommitStore::default());

    let state = Arc::new(AppState::new(
        &test_config(),
        store.clone(),
        Arc::new(InMemoryIdentityProvider::new()),
        MockTransport::new(),
    ));

    let server =
        TestServer::new(routes::create_router(state)).expect("Failed to create test server");
    (server, store)
}

/// A pending registration whose password is "correct horse"
pub fn pending(token: &str, email: &str) -> PendingRegistration {
    pending_at(token, email, Utc::now())
}

pub fn pending_at(token: &str, email: &str, created_at: DateTime<Utc>) -> PendingRegistration {
    PendingRegistration {
        token: token.to_string(),
        email: email.to_string(),
        password_hash: hash_password("correct horse", 4).unwrap(),
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        verified: false,
        created_at,
        rejected_at: None,
    }
}

/// Store a pending registration
pub fn seed_pending<S: RegistrationStore + ?Sized>(store: &S, pending: PendingRegistration) {
    store.create_pending(pending).expect("Failed to seed pending registration");
}

/// Pull the token out of an approval or reject link
pub fn token_from_link(link: &str) -> String {
    link.split("token=")
        .nth(1)
        .and_then(|rest| rest.split(['&', '"', '<', '\n']).next())
        .expect("No token in link")
        .to_string()
}

/// Find the approve link in a captured message
pub fn approve_link(message: &OutboundMessage) -> String {
    message
        .text
        .lines()
        .find(|l| l.contains("/verifyAdmin?token="))
        .expect("No approve link in message")
        .trim()
        .to_string()
}
