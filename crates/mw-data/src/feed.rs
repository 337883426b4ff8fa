//! Feed sources
//!
//! The snapshot is acquired by an external collaborator behind the
//! [`FeedSource`] trait; the engine only ever sees the returned blob.
//! Fetching runs on a worker task so it may block on I/O freely.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use crate::DataError;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// A source of raw market snapshots.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch one complete raw snapshot.
    async fn fetch(&self) -> Result<String, DataError>;

    /// Name of the source, for logging.
    fn source_name(&self) -> &str;
}

/// HTTP feed source for the market watch endpoint.
pub struct HttpFeedSource {
    url: String,
    client: reqwest::Client,
}

impl HttpFeedSource {
    pub fn new(url: impl Into<String>) -> Result<Self, DataError> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| DataError::Network(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self) -> Result<String, DataError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| DataError::Network(e.to_string()))?;
        response
            .text()
            .await
            .map_err(|e| DataError::Network(e.to_string()))
    }

    fn source_name(&self) -> &str {
        &self.url
    }
}

/// File-backed feed source, used for captured snapshots and tests.
pub struct FileFeedSource {
    path: PathBuf,
    name: String,
}

impl FileFeedSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path.display().to_string();
        Self { path, name }
    }
}

#[async_trait]
impl FeedSource for FileFeedSource {
    async fn fetch(&self) -> Result<String, DataError> {
        Ok(tokio::fs::read_to_string(&self.path).await?)
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}
