//! Retrieval of attachment bytes.

use crate::error::FetchError;
use async_trait::async_trait;
use futures::StreamExt;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

/// Trait for downloading an attachment to a local file.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Downloads `url` into `destination`, returning the number of bytes
    /// written.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the file cannot be written.
    async fn fetch(&self, url: &str, destination: &Path) -> Result<u64, FetchError>;
}

/// HTTP implementation of [`Fetcher`] that streams the body to disk.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    http: reqwest::Client,
}

impl HttpFetcher {
    /// Creates a fetcher using the given client.
    #[must_use]
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    #[instrument(skip(self, destination))]
    async fn fetch(&self, url: &str, destination: &Path) -> Result<u64, FetchError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Request {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let storage = |e: std::io::Error| FetchError::Storage {
            reason: e.to_string(),
        };

        let mut file = tokio::fs::File::create(destination).await.map_err(storage)?;
        let mut body = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| FetchError::Request {
                reason: e.to_string(),
            })?;
            file.write_all(&chunk).await.map_err(storage)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(storage)?;

        debug!(bytes = written, "attachment downloaded");
        Ok(written)
    }
}
