use crate::config::HarvestConfig;
use futures::StreamExt;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE, HeaderMap, HeaderName};
use reqwest::{Client, Response};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Media families saved as files rather than pages.
const FILE_MEDIA_PREFIXES: [&str; 4] = ["application/", "image/", "audio/", "video/"];

/// Direct-fetch client: metadata probe, streamed file download, raw page fetch.
pub struct HttpClient {
    client: Client,
}

/// Header metadata from the probe. Empty strings when the probe failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeMetadata {
    /// Lower-cased `Content-Type`.
    pub content_type: String,
    pub disposition: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    File,
    Html,
}

impl ProbeMetadata {
    fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string()
        };
        Self {
            content_type: header(CONTENT_TYPE).to_lowercase(),
            disposition: header(CONTENT_DISPOSITION),
        }
    }

    pub fn classify(&self) -> Classification {
        let binary_media = FILE_MEDIA_PREFIXES
            .iter()
            .any(|prefix| self.content_type.contains(prefix));
        if binary_media || self.disposition.contains("filename=") {
            Classification::File
        } else {
            Classification::Html
        }
    }

    /// Filename named by `Content-Disposition`, if any.
    pub fn disposition_filename(&self) -> Option<String> {
        let (_, tail) = self.disposition.rsplit_once("filename=")?;
        let name = tail
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .trim_matches(['"', '\'', ' ']);
        (!name.is_empty()).then(|| name.to_string())
    }
}

impl HttpClient {
    pub fn new(config: &HarvestConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .pool_max_idle_per_host(10)
            .build()?;

        Ok(Self { client })
    }

    /// HEAD the URL for its declared type. Some servers reject HEAD, so any
    /// failure yields empty metadata instead of an error.
    pub async fn probe(&self, url: &str) -> ProbeMetadata {
        match self.client.head(url).send().await {
            Ok(response) => ProbeMetadata::from_headers(response.headers()),
            Err(e) => {
                debug!(url, error = %e, "probe failed, continuing without metadata");
                ProbeMetadata::default()
            }
        }
    }

    /// Stream the body of `url` into `target`. Returns the bytes written.
    pub async fn download_file(&self, url: &str, target: &Path) -> Result<u64, FetchError> {
        let response = self.get_ok(url).await?;

        let mut file = tokio::fs::File::create(target).await?;
        let mut written = 0u64;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(written)
    }

    /// Fetch the raw page body, no script execution.
    pub async fn fetch_page(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.get_ok(url).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Advisory reachability check against a known-stable endpoint.
    pub async fn check_connectivity(&self, endpoint: &str, timeout: Duration) -> bool {
        self.client
            .get(endpoint)
            .timeout(timeout)
            .send()
            .await
            .is_ok()
    }

    async fn get_ok(&self, url: &str) -> Result<Response, FetchError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        Ok(response)
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Status(u16),
    #[error("request timed out")]
    Timeout,
    #[error("request error: {0}")]
    Http(reqwest::Error),
    #[error("write error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Http(err)
        }
    }
}
