//! HTTP client for the remote document store.

use futures::future::BoxFuture;
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use super::RemoteError;
use crate::config::SyncConfig;
use crate::models::Collection;

/// The operations push and pull need from a remote store.
pub trait RemoteStore: Send + Sync {
    fn put<'a>(
        &'a self,
        collection: Collection,
        id: &'a str,
        document: &'a Value,
    ) -> BoxFuture<'a, Result<(), RemoteError>>;

    /// Returns false if the document did not exist.
    fn delete<'a>(&'a self, collection: Collection, id: &'a str) -> BoxFuture<'a, Result<bool, RemoteError>>;

    fn list(&self, collection: Collection) -> BoxFuture<'_, Result<Vec<Value>, RemoteError>>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthInfo {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Identity {
    pub org_id: String,
}

pub struct DocumentClient {
    base_url: String,
    api_key: String,
    http: reqwest::Client,
}

impl DocumentClient {
    /// Creates a client from config.
    ///
    /// Returns an error if sync is not configured.
    pub fn from_config(config: &SyncConfig) -> Result<Self, RemoteError> {
        let server_url = config.server_url.clone().ok_or(RemoteError::NotConfigured)?;
        let api_key = config.api_key.clone().ok_or(RemoteError::NotConfigured)?;
        Self::new(server_url, api_key)
    }

    pub fn new(server_url: String, api_key: String) -> Result<Self, RemoteError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RemoteError::Connection(e.to_string()))?;
        Ok(Self {
            base_url: normalize_base_url(&server_url),
            api_key,
            http,
        })
    }

    fn collection_url(&self, collection: Collection) -> String {
        format!("{}/collections/{}/documents", self.base_url, collection.path())
    }

    fn document_url(&self, collection: Collection, id: &str) -> String {
        format!("{}/{}", self.collection_url(collection), urlencoding::encode(id))
    }

    /// `GET /health`. Does not need a valid key.
    pub async fn check_health(&self) -> Result<HealthInfo, RemoteError> {
        let response = self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        Ok(error_for_status(response).await?.json().await?)
    }

    /// `GET /me`: the organization the API key belongs to.
    pub async fn whoami(&self) -> Result<Identity, RemoteError> {
        let response = self
            .http
            .get(format!("{}/me", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        Ok(error_for_status(response).await?.json().await?)
    }

    async fn put_document(&self, collection: Collection, id: &str, document: &Value) -> Result<(), RemoteError> {
        let response = self
            .http
            .put(self.document_url(collection, id))
            .bearer_auth(&self.api_key)
            .json(document)
            .send()
            .await?;
        error_for_status(response).await?;
        Ok(())
    }

    async fn delete_document(&self, collection: Collection, id: &str) -> Result<bool, RemoteError> {
        let response = self
            .http
            .delete(self.document_url(collection, id))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        error_for_status(response).await?;
        Ok(true)
    }

    async fn list_documents(&self, collection: Collection) -> Result<Vec<Value>, RemoteError> {
        let response = self
            .http
            .get(self.collection_url(collection))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        Ok(error_for_status(response).await?.json().await?)
    }
}

impl RemoteStore for DocumentClient {
    fn put<'a>(
        &'a self,
        collection: Collection,
        id: &'a str,
        document: &'a Value,
    ) -> BoxFuture<'a, Result<(), RemoteError>> {
        Box::pin(self.put_document(collection, id, document))
    }

    fn delete<'a>(&'a self, collection: Collection, id: &'a str) -> BoxFuture<'a, Result<bool, RemoteError>> {
        Box::pin(self.delete_document(collection, id))
    }

    fn list(&self, collection: Collection) -> BoxFuture<'_, Result<Vec<Value>, RemoteError>> {
        Box::pin(self.list_documents(collection))
    }
}

/// Turns a non-success response into `RemoteError::Http`, keeping the body
/// for the outbox error column.
async fn error_for_status(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::Http {
        status: status.as_u16(),
        body,
    })
}

fn normalize_base_url(server_url: &str) -> String {
    let trimmed = server_url.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}
