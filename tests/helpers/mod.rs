//! Shared helpers for integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, Once};

use async_trait::async_trait;
use cloudlink::credentials::{FetchedToken, TokenFetcher};
use cloudlink::db::Database;
use cloudlink::remote::{RemoteRecord, RemoteRecordClient};
use cloudlink::{Result, SyncError};
use serde_json::json;
use tempfile::TempDir;

static TRACING: Once = Once::new();

/// Installs a tracing subscriber honoring `RUST_LOG`, once per test binary.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Creates a migrated scratch database in a temp directory.
///
/// The TempDir must stay alive for the duration of the test.
pub async fn test_db() -> (Database, TempDir) {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let db = Database::create(&dir.path().join("cloudlink.db"))
        .await
        .unwrap();
    db.migrate().await.unwrap();
    (db, dir)
}

/// A remote API payload with the given caller-side update timestamp.
pub fn record_data(last_update: Option<&str>) -> RemoteRecord {
    let mut data = RemoteRecord::new();
    data.insert("name".to_string(), json!("guru"));
    data.insert("email".to_string(), json!("guru@jungle.cc"));
    if let Some(t) = last_update {
        data.insert("last_update".to_string(), json!(t));
    }
    data
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Post,
    Put(i64),
}

/// In-memory stand-in for the cloud record API.
///
/// Assigns ids from a counter on create and records every call; can be
/// switched into a failing mode to exercise the error path.
pub struct MockRemoteClient {
    next_id: AtomicI64,
    pub calls: Mutex<Vec<Call>>,
    failure: Mutex<Option<String>>,
    last_updated: Mutex<Option<String>>,
}

impl MockRemoteClient {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1000),
            calls: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
            last_updated: Mutex::new(None),
        }
    }

    /// All subsequent calls fail with the given application error message.
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn succeed(&self) {
        *self.failure.lock().unwrap() = None;
    }

    /// Sets the `lastUpdated` value returned with every response.
    pub fn set_last_updated(&self, t: &str) {
        *self.last_updated.lock().unwrap() = Some(t.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn respond(&self, id: i64) -> Result<RemoteRecord> {
        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Err(SyncError::RemoteApi {
                code: 500,
                message,
            });
        }
        let mut response = RemoteRecord::new();
        response.insert("id".to_string(), json!(id));
        if let Some(t) = self.last_updated.lock().unwrap().clone() {
            response.insert("lastUpdated".to_string(), json!(t));
        }
        Ok(response)
    }
}

#[async_trait]
impl RemoteRecordClient for MockRemoteClient {
    async fn post(&self, _payload: &RemoteRecord) -> Result<RemoteRecord> {
        self.calls.lock().unwrap().push(Call::Post);
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.respond(id)
    }

    async fn put(&self, id: i64, _payload: &RemoteRecord) -> Result<RemoteRecord> {
        self.calls.lock().unwrap().push(Call::Put(id));
        self.respond(id)
    }
}

/// Token fetcher that counts how many network fetches it performed.
pub struct CountingFetcher {
    pub fetches: AtomicI64,
    expires_in: i64,
    fail: Mutex<bool>,
}

impl CountingFetcher {
    pub fn new(expires_in: i64) -> Self {
        Self {
            fetches: AtomicI64::new(0),
            expires_in,
            fail: Mutex::new(false),
        }
    }

    pub fn fail(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    pub fn fetch_count(&self) -> i64 {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenFetcher for CountingFetcher {
    async fn fetch(&self) -> Result<FetchedToken> {
        if *self.fail.lock().unwrap() {
            return Err(SyncError::Credential {
                reason: "token endpoint returned error_code 1".to_string(),
            });
        }
        let n = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(FetchedToken {
            access_token: format!("token-{n}"),
            expires_in: self.expires_in,
        })
    }
}
