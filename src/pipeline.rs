//! Two-phase retrieval: a wide pool of direct fetches, then a narrower pool of
//! headless renders for whatever the first phase could not get.
//!
//! Phase 2 starts only after phase 1 has fully drained. Every submitted URL
//! ends up in the manifest exactly once, in a terminal state.

use crate::config::HarvestConfig;
use crate::error::HarvestError;
use crate::http_client::{Classification, FetchError, HttpClient};
use crate::manifest::{ArtifactKind, Manifest, ManifestAccumulator, RetrievalRecord};
use crate::naming::{self, ArtifactStore};
use crate::renderer::{PageRenderer, RenderError};
use futures::StreamExt;
use futures::stream;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Trim, drop emphasis wrappers and default to `https://` when no scheme is given.
pub fn clean_url(raw: &str) -> String {
    let url = raw.trim().trim_matches(['*', '_']);
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

#[derive(Clone)]
pub struct RetrievalPipeline {
    http: Arc<HttpClient>,
    renderer: Option<Arc<dyn PageRenderer>>,
    files: Arc<ArtifactStore>,
    pages: Arc<ArtifactStore>,
    config: Arc<HarvestConfig>,
}

impl RetrievalPipeline {
    /// Creates both artifact directories if needed. Without a renderer, URLs
    /// the direct phase cannot fetch fail immediately.
    pub fn new(
        config: HarvestConfig,
        files_dir: &Path,
        pages_dir: &Path,
        renderer: Option<Arc<dyn PageRenderer>>,
    ) -> Result<Self, HarvestError> {
        for dir in [files_dir, pages_dir] {
            std::fs::create_dir_all(dir).map_err(|e| HarvestError::io(dir, e))?;
        }

        Ok(Self {
            http: Arc::new(HttpClient::new(&config)?),
            renderer,
            files: Arc::new(ArtifactStore::new(files_dir)),
            pages: Arc::new(ArtifactStore::new(pages_dir)),
            config: Arc::new(config),
        })
    }

    /// Retrieve every URL and return the manifest in completion order.
    pub async fn retrieve<I, S>(&self, urls: I) -> Manifest
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let urls: Vec<String> = urls
            .into_iter()
            .map(|u| clean_url(u.as_ref()))
            .filter(|u| seen.insert(u.clone()))
            .collect();

        self.preflight().await;

        let manifest = Arc::new(ManifestAccumulator::default());
        let pending = Arc::new(Mutex::new(Vec::new()));

        info!(
            urls = urls.len(),
            workers = self.config.http_workers,
            "starting direct fetch"
        );
        self.direct_phase(urls, &manifest, &pending).await;

        let pending = std::mem::take(&mut *pending.lock().await);
        if !pending.is_empty() {
            info!(
                "rendering {} URLs via headless browser (up to {} at a time)",
                pending.len(),
                self.config.render_workers
            );
            self.render_phase(pending, &manifest).await;
        }

        manifest.finish().await
    }

    async fn preflight(&self) {
        let Some(endpoint) = &self.config.preflight_url else {
            return;
        };
        if !self
            .http
            .check_connectivity(endpoint, self.config.preflight_timeout)
            .await
        {
            warn!(endpoint = %endpoint, "connectivity check failed, continuing anyway");
        }
    }

    async fn direct_phase(
        &self,
        urls: Vec<String>,
        manifest: &Arc<ManifestAccumulator>,
        pending: &Arc<Mutex<Vec<RetrievalRecord>>>,
    ) {
        stream::iter(urls)
            .map(|url| {
                let pipeline = self.clone();
                let manifest = manifest.clone();
                let pending = pending.clone();
                let task_url = url.clone();
                let task = tokio::spawn(async move {
                    let record = pipeline.fetch_direct(task_url).await;
                    if record.is_pending_render() {
                        pending.lock().await.push(record);
                    } else {
                        manifest.push(record).await;
                    }
                });
                async move { (url, task.await) }
            })
            .buffer_unordered(self.config.http_workers.max(1))
            .for_each(|(url, joined)| {
                let manifest = manifest.clone();
                async move {
                    if let Err(e) = joined {
                        let mut record = RetrievalRecord::submitted(url);
                        record.fail(format!("HTTP worker error: {e}"));
                        manifest.push(record).await;
                    }
                }
            })
            .await;
    }

    async fn render_phase(&self, pending: Vec<RetrievalRecord>, manifest: &Arc<ManifestAccumulator>) {
        stream::iter(pending)
            .map(|record| {
                let pipeline = self.clone();
                let manifest = manifest.clone();
                let url = record.url.clone();
                let task = tokio::spawn(async move {
                    let record = pipeline.render_pending(record).await;
                    manifest.push(record).await;
                });
                async move { (url, task.await) }
            })
            .buffer_unordered(self.config.render_workers.max(1))
            .for_each(|(url, joined)| {
                let manifest = manifest.clone();
                async move {
                    if let Err(e) = joined {
                        let mut record = RetrievalRecord::submitted(url);
                        record.fail(format!("Render worker error: {e}"));
                        manifest.push(record).await;
                    }
                }
            })
            .await;
    }

    async fn fetch_direct(&self, url: String) -> RetrievalRecord {
        let mut record = RetrievalRecord::submitted(url);
        record.begin_classifying();

        match self.try_direct(&record.url).await {
            Ok((kind, saved)) => record.succeed(kind, saved),
            Err(e) if self.renderer.is_some() => record.defer_to_render(e.to_string()),
            Err(e) => record.fail(e.to_string()),
        }
        record
    }

    async fn try_direct(&self, url: &str) -> Result<(ArtifactKind, PathBuf), FetchError> {
        let meta = self.http.probe(url).await;

        match meta.classify() {
            Classification::File => {
                let disposition = meta.disposition_filename();
                let name = naming::guess_name(url, disposition.as_deref(), &meta.content_type);
                let target = self.files.claim(&name).await;
                if let Err(e) = self.http.download_file(url, &target).await {
                    let _ = tokio::fs::remove_file(&target).await;
                    return Err(e);
                }
                Ok((ArtifactKind::File, target))
            }
            Classification::Html => {
                let body = self.http.fetch_page(url).await?;
                let target = self.pages.claim(&naming::page_name(url)).await;
                tokio::fs::write(&target, body).await?;
                Ok((ArtifactKind::HtmlRaw, target))
            }
        }
    }

    async fn render_pending(&self, mut record: RetrievalRecord) -> RetrievalRecord {
        let Some(renderer) = &self.renderer else {
            record.fail("no renderer configured");
            return record;
        };

        match self.try_render(renderer.as_ref(), &record.url).await {
            Ok(saved) => record.succeed(ArtifactKind::HtmlRendered, saved),
            Err(e) => record.fail(e.to_string()),
        }
        record
    }

    async fn try_render(&self, renderer: &dyn PageRenderer, url: &str) -> Result<PathBuf, RenderError> {
        let html = renderer.render(url).await?;
        let target = self.pages.claim(&naming::rendered_name(url)).await;
        tokio::fs::write(&target, html).await?;
        Ok(target)
    }
}
