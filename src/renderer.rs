//! Render fallback: load a page in headless Chromium and capture the DOM.
//!
//! Every render launches its own browser with a throwaway profile directory,
//! so concurrent renders share no cookies, storage or cache.

use crate::config::HarvestConfig;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use thiserror::Error;
use tracing::debug;

const SCROLL_TO_BOTTOM: &str = "window.scrollTo(0, document.body.scrollHeight)";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to launch browser: {0}")]
    Launch(String),
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("render timed out after {0:?}")]
    Timeout(Duration),
    #[error("failed to capture page: {0}")]
    Capture(String),
    #[error("render I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Produces the fully rendered markup of a page.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, url: &str) -> Result<String, RenderError>;
}

/// Headless Chromium driven over CDP.
#[derive(Debug, Clone)]
pub struct ChromeRenderer {
    timeout: Duration,
    settle: Duration,
    user_agent: String,
}

impl ChromeRenderer {
    /// `None` when no Chromium executable can be found on this machine.
    pub fn detect(config: &HarvestConfig) -> Option<Self> {
        let renderer = Self {
            timeout: config.timeout,
            settle: config.scroll_settle,
            user_agent: config.user_agent.clone(),
        };
        match renderer.browser_config(&std::env::temp_dir()) {
            Ok(_) => Some(renderer),
            Err(e) => {
                debug!(error = %e, "headless browser unavailable");
                None
            }
        }
    }

    fn browser_config(&self, profile: &Path) -> Result<BrowserConfig, String> {
        let user_agent = format!("--user-agent={}", self.user_agent);
        BrowserConfig::builder()
            .user_data_dir(profile)
            .request_timeout(self.timeout)
            .args([
                "--disable-dev-shm-usage",
                "--disable-gpu",
                "--no-sandbox",
                "--no-first-run",
                user_agent.as_str(),
            ])
            .build()
    }

    /// Fresh browser profile, removed when the returned guard drops.
    fn profile_dir() -> Result<TempDir, RenderError> {
        Ok(tempfile::Builder::new()
            .prefix("linkharvest-render-")
            .tempdir()?)
    }

    async fn capture(&self, browser: &Browser, url: &str) -> Result<String, RenderError> {
        let page = tokio::time::timeout(self.timeout, browser.new_page(url))
            .await
            .map_err(|_| RenderError::Timeout(self.timeout))?
            .map_err(|e| RenderError::Navigation(e.to_string()))?;

        tokio::time::timeout(self.timeout, page.wait_for_navigation())
            .await
            .map_err(|_| RenderError::Timeout(self.timeout))?
            .map_err(|e| RenderError::Navigation(e.to_string()))?;

        page.evaluate(SCROLL_TO_BOTTOM)
            .await
            .map_err(|e| RenderError::Capture(e.to_string()))?;
        tokio::time::sleep(self.settle).await;

        page.content()
            .await
            .map_err(|e| RenderError::Capture(e.to_string()))
    }
}

#[async_trait]
impl PageRenderer for ChromeRenderer {
    /// The profile directory lives for the whole call and is removed on
    /// every return path, including launch failures.
    async fn render(&self, url: &str) -> Result<String, RenderError> {
        let profile = Self::profile_dir()?;
        let config = self
            .browser_config(profile.path())
            .map_err(RenderError::Launch)?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| RenderError::Launch(e.to_string()))?;
        let events = tokio::spawn(async move { while handler.next().await.is_some() {} });

        let result = self.capture(&browser, url).await;

        if let Err(e) = browser.close().await {
            debug!(url, error = %e, "browser did not close cleanly");
        }
        let _ = browser.wait().await;
        events.abort();

        result
    }
}
