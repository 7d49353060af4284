//! Installer download
//!
//! The tool's install procedure is fetched over HTTPS into a temporary file
//! that is removed when the returned [`TempPath`] is dropped, including when
//! the surrounding future is cancelled.

use std::io::Write;
use std::time::Duration;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use tempfile::TempPath;
use tracing::{debug, info};

use common::error::StepError;

/// Fetches installer payloads
#[async_trait]
pub trait ScriptFetcher: Send + Sync {
    /// Downloads the body at `url`
    async fn fetch(&self, url: &str) -> Result<Bytes, StepError>;
}

/// Fetcher backed by `reqwest`
pub struct HttpScriptFetcher {
    client: Client,
}

impl HttpScriptFetcher {
    /// Creates a fetcher whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, StepError> {
        let client = Client::builder()
            .user_agent(concat!("provisioner/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(30))
            .https_only(true)
            .build()
            .map_err(|e| StepError::ToolInstall(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ScriptFetcher for HttpScriptFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, StepError> {
        let failed = |e: reqwest::Error| StepError::ToolInstall(format!("download of {} failed: {}", url, e));

        let response = self.client.get(url).send().await.map_err(failed)?;
        let response = response.error_for_status().map_err(failed)?;
        let body = response.bytes().await.map_err(failed)?;
        debug!("Downloaded {} bytes from {}", body.len(), url);
        Ok(body)
    }
}

/// Downloads `url` into a fresh temporary file ending in `suffix`
pub async fn download_to_temp(
    fetcher: &dyn ScriptFetcher,
    url: &str,
    suffix: &str,
) -> Result<TempPath, StepError> {
    info!("Downloading installer from {}", url);
    let body = fetcher.fetch(url).await?;
    if body.is_empty() {
        return Err(StepError::ToolInstall(format!("download of {} returned an empty body", url)));
    }

    let write_failed = |e: std::io::Error| StepError::ToolInstall(format!("cannot write installer: {}", e));
    let mut file = tempfile::Builder::new()
        .prefix("provisioner-installer-")
        .suffix(suffix)
        .tempfile()
        .map_err(write_failed)?;
    file.write_all(&body).map_err(write_failed)?;
    file.flush().map_err(write_failed)?;

    // close the handle so the installer can be executed on every platform
    Ok(file.into_temp_path())
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Fetcher answering with a fixed body and recording requested URLs
    #[derive(Clone, Default)]
    pub struct StaticFetcher {
        pub body: Option<Bytes>,
        pub urls: Arc<Mutex<Vec<String>>>,
    }

    impl StaticFetcher {
        pub fn serving(body: &'static str) -> Self {
            Self {
                body: Some(Bytes::from_static(body.as_bytes())),
                urls: Arc::default(),
            }
        }

        pub fn failing() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl ScriptFetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> Result<Bytes, StepError> {
            self.urls.lock().push(url.to_string());
            self.body
                .clone()
                .ok_or_else(|| StepError::ToolInstall(format!("download of {} failed: connection refused", url)))
        }
    }
}
