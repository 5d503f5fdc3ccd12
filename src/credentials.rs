//! Access token lifecycle.
//!
//! The cloud service allows a single active access token per application
//! id. A [`CredentialStore`] keeps the current token and refreshes it
//! shortly before expiry. In shared mode the token lives in the database
//! so independent worker processes use the same one, and refreshes
//! serialize through a transaction on the singleton row: whoever acquires
//! it first fetches, everyone queued behind re-checks and adopts the
//! freshly written token instead of fetching again.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, DatabaseTransaction,
    DbErr, EntityTrait, IntoActiveModel, QueryFilter, TransactionTrait,
};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::ClientConfig;
use crate::db::entities::credential;
use crate::error::{Result, SyncError};
use crate::time::TOKEN_REFRESH_MARGIN_SECS;

/// A token as returned by the credential endpoint.
#[derive(Debug, Clone)]
pub struct FetchedToken {
    pub access_token: String,
    /// Lifetime in seconds from the moment of issue.
    pub expires_in: i64,
}

/// Seam to the credential endpoint, mockable in tests.
#[async_trait]
pub trait TokenFetcher: Send + Sync {
    async fn fetch(&self) -> Result<FetchedToken>;
}

/// Fetches tokens from `GET {url}/security/accesstoken`.
pub struct HttpTokenFetcher {
    http: reqwest::Client,
    url: String,
    app_id: String,
    secret: String,
}

impl HttpTokenFetcher {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: config.url.trim_end_matches('/').to_string(),
            app_id: config.app_id.clone(),
            secret: config.secret.clone(),
        }
    }
}

#[async_trait]
impl TokenFetcher for HttpTokenFetcher {
    async fn fetch(&self) -> Result<FetchedToken> {
        let response = self
            .http
            .get(format!("{}/security/accesstoken", self.url))
            .query(&[
                ("grant_type", "client_credentials"),
                ("appid", self.app_id.as_str()),
                ("secret", self.secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SyncError::Credential {
                reason: format!("token request failed: {e}"),
            })?;

        let body: Value = response.json().await.map_err(|e| SyncError::Credential {
            reason: format!("token response unreadable: {e}"),
        })?;

        let error_code = body.get("error_code").and_then(Value::as_i64).unwrap_or(0);
        if error_code != 0 {
            return Err(SyncError::Credential {
                reason: format!("token endpoint returned {body}"),
            });
        }

        let access_token = body
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| SyncError::Credential {
                reason: format!("token response missing access_token: {body}"),
            })?
            .to_string();
        let expires_in = body.get("expires_in").and_then(Value::as_i64).unwrap_or(0);

        Ok(FetchedToken {
            access_token,
            expires_in,
        })
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: chrono::DateTime<Utc>,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        // refresh 5 seconds before the token expires to be safe
        Utc::now() < self.expires_at - Duration::seconds(TOKEN_REFRESH_MARGIN_SECS)
    }
}

enum Mode {
    /// Token cached in this process only.
    Private,
    /// Token persisted in the access_tokens row for `scope`.
    Shared {
        conn: DatabaseConnection,
        scope: String,
    },
}

/// Produces currently-valid access tokens, refreshing transparently.
///
/// Never retries a failed refresh on its own; the caller decides whether
/// to retry the outer operation.
pub struct CredentialStore {
    fetcher: Arc<dyn TokenFetcher>,
    mode: Mode,
    cached: Mutex<Option<CachedToken>>,
}

impl CredentialStore {
    /// Store whose token is private to this process.
    pub fn new(fetcher: Arc<dyn TokenFetcher>) -> Self {
        Self {
            fetcher,
            mode: Mode::Private,
            cached: Mutex::new(None),
        }
    }

    /// Store sharing its token with other processes through the database.
    pub fn new_shared(
        fetcher: Arc<dyn TokenFetcher>,
        conn: DatabaseConnection,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            mode: Mode::Shared {
                conn,
                scope: scope.into(),
            },
            cached: Mutex::new(None),
        }
    }

    /// HTTP-backed store per `config`; shared mode needs the database the
    /// token row lives in.
    pub fn from_config(config: &ClientConfig, conn: Option<DatabaseConnection>) -> Self {
        let fetcher = Arc::new(HttpTokenFetcher::new(config));
        match conn {
            Some(conn) if config.shared_token => Self::new_shared(fetcher, conn, "default"),
            _ => Self::new(fetcher),
        }
    }

    /// Returns a currently-valid access token, refreshing if the cached
    /// one is absent or within the refresh margin of expiry.
    pub async fn get_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;

        if let Mode::Shared { conn, scope } = &self.mode {
            *cached = read_shared(conn, scope).await?;
            debug!("read shared token for scope {scope}");
        }

        match cached.as_ref() {
            Some(c) if c.is_valid() => Ok(c.token.clone()),
            _ => self.refresh_inner(&mut cached).await,
        }
    }

    /// Forces a refresh regardless of the cached token's expiry.
    pub async fn refresh(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        self.refresh_inner(&mut cached).await
    }

    /// Drops the current token so the next [`get_token`] must refresh.
    ///
    /// [`get_token`]: CredentialStore::get_token
    pub async fn invalidate(&self) -> Result<()> {
        let mut cached = self.cached.lock().await;
        *cached = None;
        if let Mode::Shared { conn, scope } = &self.mode {
            let row = ensure_row(conn, scope).await?;
            let mut active = row.into_active_model();
            active.token = Set(None);
            active.expires_at = Set(None);
            active.update(conn).await.map_err(SyncError::from)?;
        }
        Ok(())
    }

    async fn refresh_inner(&self, cached: &mut Option<CachedToken>) -> Result<String> {
        match &self.mode {
            Mode::Private => {
                let fresh = self.fetch_now().await?;
                let token = fresh.token.clone();
                *cached = Some(fresh);
                Ok(token)
            }
            Mode::Shared { conn, scope } => {
                debug!("updating shared token for scope {scope}");
                let row = ensure_row(conn, scope).await?;

                let txn = conn.begin().await?;
                claim_row(&txn, scope).await?;

                // Another process can finish its refresh between our
                // validity check and taking the lock; re-read before
                // fetching so only one refresh happens per window.
                let current = credential::Entity::find_by_id(row.id)
                    .one(&txn)
                    .await?
                    .ok_or_else(|| {
                        SyncError::Database(DbErr::RecordNotFound(format!(
                            "access token row for scope {scope}"
                        )))
                    })?;

                if let Some(existing) = cached_from_row(&current) {
                    if existing.is_valid() {
                        txn.commit().await?;
                        let token = existing.token.clone();
                        *cached = Some(existing);
                        return Ok(token);
                    }
                }

                let fresh = self.fetch_now().await?;
                let mut active = current.into_active_model();
                active.token = Set(Some(fresh.token.clone()));
                active.expires_at = Set(Some(fresh.expires_at));
                active.update(&txn).await?;
                txn.commit().await?;

                let token = fresh.token.clone();
                *cached = Some(fresh);
                Ok(token)
            }
        }
    }

    async fn fetch_now(&self) -> Result<CachedToken> {
        let fetched = self.fetcher.fetch().await?;
        let cached = CachedToken {
            token: fetched.access_token,
            expires_at: Utc::now() + Duration::seconds(fetched.expires_in),
        };
        debug!("received new token, expires at {}", cached.expires_at);
        Ok(cached)
    }
}

fn cached_from_row(row: &credential::Model) -> Option<CachedToken> {
    match (&row.token, row.expires_at) {
        (Some(token), Some(expires_at)) => Some(CachedToken {
            token: token.clone(),
            expires_at,
        }),
        _ => None,
    }
}

async fn read_shared(conn: &DatabaseConnection, scope: &str) -> Result<Option<CachedToken>> {
    let row = ensure_row(conn, scope).await?;
    Ok(cached_from_row(&row))
}

/// Find-or-create the singleton token row for a scope.
async fn ensure_row(conn: &DatabaseConnection, scope: &str) -> Result<credential::Model> {
    credential::Entity::insert(credential::ActiveModel {
        scope: Set(scope.to_string()),
        token: Set(None),
        expires_at: Set(None),
        ..Default::default()
    })
    .on_conflict(
        OnConflict::column(credential::Column::Scope)
            .do_nothing()
            .to_owned(),
    )
    .exec_without_returning(conn)
    .await?;

    credential::Entity::find()
        .filter(credential::Column::Scope.eq(scope))
        .one(conn)
        .await?
        .ok_or_else(|| {
            SyncError::Database(DbErr::RecordNotFound(format!(
                "access token row for scope {scope}"
            )))
        })
}

/// Writes the row inside the transaction so SQLite takes its write lock
/// immediately and concurrent refreshers queue behind us.
async fn claim_row(txn: &DatabaseTransaction, scope: &str) -> Result<()> {
    credential::Entity::update_many()
        .set(credential::ActiveModel {
            scope: Set(scope.to_string()),
            ..Default::default()
        })
        .filter(credential::Column::Scope.eq(scope))
        .exec(txn)
        .await?;
    Ok(())
}
