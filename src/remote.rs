//! Remote record API.
//!
//! The engine only depends on [`RemoteRecordClient`]; [`AppClient`] and
//! [`Resource`] are the bundled reqwest implementation of the cloud REST
//! endpoints. Requests authenticate with an `access_token` query parameter
//! obtained lazily from the [`CredentialStore`] once per outbound call.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::config::ClientConfig;
use crate::credentials::CredentialStore;
use crate::error::{Result, SyncError};

/// Structured payload exchanged with the remote service.
pub type RemoteRecord = serde_json::Map<String, Value>;

/// Extracts the record id a create/update response carries.
pub fn record_id(record: &RemoteRecord) -> Option<i64> {
    record.get("id").and_then(Value::as_i64)
}

/// HTTP CRUD against one remote record collection, as consumed by the
/// reconciliation engine.
#[async_trait]
pub trait RemoteRecordClient: Send + Sync {
    /// Creates a record. The response includes the assigned `id` and may
    /// include a `lastUpdated` ISO-8601 timestamp.
    async fn post(&self, payload: &RemoteRecord) -> Result<RemoteRecord>;

    /// Updates a record by id. Same response contract as [`post`].
    ///
    /// [`post`]: RemoteRecordClient::post
    async fn put(&self, id: i64, payload: &RemoteRecord) -> Result<RemoteRecord>;
}

/// Entry point for the stock cloud REST resources.
pub struct AppClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Arc<CredentialStore>,
}

impl AppClient {
    pub fn new(config: &ClientConfig, credentials: Arc<CredentialStore>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.url.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    /// A client bound to an arbitrary resource path, e.g. `/v1/customers`.
    pub fn resource(&self, path: &str) -> Resource {
        Resource {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            path: path.to_string(),
            credentials: self.credentials.clone(),
        }
    }

    pub fn channel_accounts(&self) -> Resource {
        self.resource("/v1/channelaccounts")
    }

    pub fn customers(&self) -> Resource {
        self.resource("/v1/customers")
    }

    pub fn customer_events(&self) -> Resource {
        self.resource("/v1/customerevents")
    }

    pub fn deals(&self) -> Resource {
        self.resource("/v1/deals")
    }
}

/// HTTP wrapper around one REST resource path.
pub struct Resource {
    http: reqwest::Client,
    base_url: String,
    path: String,
    credentials: Arc<CredentialStore>,
}

impl Resource {
    /// Fetches one record by id. `None` on a 204 response.
    pub async fn get(&self, id: i64) -> Result<Option<RemoteRecord>> {
        let url = self.record_url(Some(id)).await?;
        let response = self.http.get(url).send().await.map_err(SyncError::remote_transport)?;
        match decode(response).await? {
            Some(Value::Object(map)) => Ok(Some(map)),
            Some(other) => Err(unexpected_body(&other)),
            None => Ok(None),
        }
    }

    /// Queries the collection. Returns the raw response body, whose shape
    /// (`records` array, paging fields) is endpoint-specific.
    pub async fn find(&self, params: &[(&str, &str)]) -> Result<Value> {
        let url = self.record_url(None).await?;
        let response = self
            .http
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(SyncError::remote_transport)?;
        Ok(decode(response).await?.unwrap_or(Value::Null))
    }

    /// Deletes a record by id.
    pub async fn delete(&self, id: i64) -> Result<()> {
        let url = self.record_url(Some(id)).await?;
        let response = self
            .http
            .delete(url)
            .send()
            .await
            .map_err(SyncError::remote_transport)?;
        decode(response).await?;
        Ok(())
    }

    async fn record_url(&self, id: Option<i64>) -> Result<reqwest::Url> {
        let token = self.credentials.get_token().await?;
        let mut url = format!("{}{}", self.base_url, self.path);
        if let Some(id) = id {
            url.push_str(&format!("/{id}"));
        }
        let mut url = reqwest::Url::parse(&url).map_err(|e| SyncError::RemoteApi {
            code: 0,
            message: format!("invalid resource url: {e}"),
        })?;
        url.query_pairs_mut().append_pair("access_token", &token);
        Ok(url)
    }
}

#[async_trait]
impl RemoteRecordClient for Resource {
    async fn post(&self, payload: &RemoteRecord) -> Result<RemoteRecord> {
        let url = self.record_url(None).await?;
        debug!("POST {}", self.path);
        let response = self
            .http
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(SyncError::remote_transport)?;
        expect_record(decode(response).await?)
    }

    async fn put(&self, id: i64, payload: &RemoteRecord) -> Result<RemoteRecord> {
        let url = self.record_url(Some(id)).await?;
        debug!("PUT {}/{id}", self.path);
        let response = self
            .http
            .put(url)
            .json(payload)
            .send()
            .await
            .map_err(SyncError::remote_transport)?;
        expect_record(decode(response).await?)
    }
}

/// Decodes a response body, surfacing the application-level error channel:
/// a 2xx body can still carry a non-zero `error_code`.
async fn decode(response: reqwest::Response) -> Result<Option<Value>> {
    let status = response.status();
    if status == reqwest::StatusCode::NO_CONTENT {
        return Ok(None);
    }
    if !status.is_success() {
        return Err(SyncError::RemoteApi {
            code: status.as_u16() as i64,
            message: format!("http status {status}"),
        });
    }

    let body: Value = response.json().await.map_err(SyncError::remote_transport)?;
    if let Some(code) = body.get("error_code").and_then(Value::as_i64) {
        if code != 0 {
            let description = body
                .get("error_description")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            return Err(SyncError::RemoteApi {
                code,
                message: description,
            });
        }
    }
    Ok(Some(body))
}

fn expect_record(body: Option<Value>) -> Result<RemoteRecord> {
    match body {
        Some(Value::Object(map)) => Ok(map),
        other => Err(unexpected_body(&other.unwrap_or(Value::Null))),
    }
}

fn unexpected_body(body: &Value) -> SyncError {
    SyncError::RemoteApi {
        code: 0,
        message: format!("unexpected response body: {body}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_id_reads_integer_ids() {
        let mut record = RemoteRecord::new();
        record.insert("id".to_string(), json!(1234));
        assert_eq!(record_id(&record), Some(1234));

        record.insert("id".to_string(), json!("not a number"));
        assert_eq!(record_id(&record), None);
    }
}
