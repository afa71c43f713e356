//! HTTP client for the storage provider's REST API.
//!
//! [`StorageClient`] is the surface the sync engine consumes; [`DropboxClient`]
//! implements it against the provider's v1 endpoints with bearer auth. Each
//! call carries the user's credential, so one client serves every user.

use crate::config::CloudConfig;
use crate::error::{CloudError, CloudResult};
use crate::marker::escape_path;
use crate::types::*;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

/// Header carrying file metadata on content downloads.
const METADATA_HEADER: &str = "x-dropbox-metadata";

/// Cloud-storage operations needed to publish a user's documents.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Returns the next page of changes after `cursor` (full history if `None`).
    async fn list_changes(&self, credential: &str, cursor: Option<&str>)
    -> CloudResult<ChangeBatch>;

    /// Downloads a file's current content and metadata.
    async fn read_file(&self, credential: &str, path: &str)
    -> CloudResult<(Vec<u8>, FileMetadata)>;

    /// Uploads `content` to `path`.
    async fn write_file(
        &self,
        credential: &str,
        path: &str,
        content: Vec<u8>,
        overwrite: bool,
    ) -> CloudResult<FileMetadata>;

    /// Creates a public, non-expiring link to `path`.
    async fn create_share_link(
        &self,
        credential: &str,
        path: &str,
        short_url: bool,
    ) -> CloudResult<ShareLink>;
}

#[derive(Deserialize)]
struct DeltaResponse {
    entries: Vec<ChangeEntry>,
    cursor: String,
    has_more: bool,
    /// Set when the provider restarts the change log from scratch. The
    /// full listing that follows is handled like any other batch, since
    /// nothing is cached locally besides the cursor.
    #[serde(default)]
    reset: bool,
}

/// Storage client for the Dropbox v1 REST API.
pub struct DropboxClient {
    client: Client,
    config: CloudConfig,
}

impl DropboxClient {
    pub fn new(config: CloudConfig) -> CloudResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &CloudConfig {
        &self.config
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/1/{endpoint}", self.config.api_base_url)
    }

    fn content_url(&self, endpoint: &str, path: &str) -> String {
        format!(
            "{}/1/{endpoint}/auto{}",
            self.config.content_base_url,
            escape_path(&rooted(path))
        )
    }
}

/// Provider paths are always absolute.
fn rooted(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

/// Maps non-success responses to errors, keeping the status and body.
async fn check_status(resp: reqwest::Response, call: &str) -> CloudResult<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    if status == StatusCode::UNAUTHORIZED {
        return Err(CloudError::AuthFailed(format!("{call}: {body}")));
    }
    Err(CloudError::Api(format!("{call} returned {status}: {body}")))
}

#[async_trait]
impl StorageClient for DropboxClient {
    async fn list_changes(
        &self,
        credential: &str,
        cursor: Option<&str>,
    ) -> CloudResult<ChangeBatch> {
        let mut form: Vec<(&str, &str)> = Vec::new();
        if let Some(cursor) = cursor {
            form.push(("cursor", cursor));
        }

        let resp = self
            .client
            .post(self.api_url("delta"))
            .bearer_auth(credential)
            .form(&form)
            .send()
            .await?;
        let delta: DeltaResponse = check_status(resp, "delta").await?.json().await?;

        if delta.reset {
            debug!("delta reset: replaying the full listing");
        }
        debug!(
            "delta returned {} entries (has_more={})",
            delta.entries.len(),
            delta.has_more
        );

        Ok(ChangeBatch {
            entries: delta.entries,
            cursor: delta.cursor,
            has_more: delta.has_more,
        })
    }

    async fn read_file(
        &self,
        credential: &str,
        path: &str,
    ) -> CloudResult<(Vec<u8>, FileMetadata)> {
        let resp = self
            .client
            .get(self.content_url("files", path))
            .bearer_auth(credential)
            .send()
            .await?;
        let resp = check_status(resp, "files").await?;

        let metadata = match resp.headers().get(METADATA_HEADER) {
            Some(raw) => serde_json::from_slice(raw.as_bytes())?,
            None => FileMetadata::file(path),
        };
        let content = resp.bytes().await?.to_vec();
        Ok((content, metadata))
    }

    async fn write_file(
        &self,
        credential: &str,
        path: &str,
        content: Vec<u8>,
        overwrite: bool,
    ) -> CloudResult<FileMetadata> {
        let resp = self
            .client
            .put(self.content_url("files_put", path))
            .bearer_auth(credential)
            .query(&[("overwrite", overwrite)])
            .body(content)
            .send()
            .await?;
        Ok(check_status(resp, "files_put").await?.json().await?)
    }

    async fn create_share_link(
        &self,
        credential: &str,
        path: &str,
        short_url: bool,
    ) -> CloudResult<ShareLink> {
        let url = format!(
            "{}/auto{}",
            self.api_url("shares"),
            escape_path(&rooted(path))
        );
        let resp = self
            .client
            .post(url)
            .bearer_auth(credential)
            .query(&[("short_url", short_url)])
            .send()
            .await?;
        Ok(check_status(resp, "shares").await?.json().await?)
    }
}
