//! The two stages as runnable commands.

use crate::config::HarvestConfig;
use crate::dedup::SelectionPolicy;
use crate::error::HarvestError;
use crate::link_table::LinkTable;
use crate::manifest::Manifest;
use crate::pipeline::{RetrievalPipeline, clean_url};
use crate::renderer::{ChromeRenderer, PageRenderer};
use crate::sources::{self, SourceReport};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Build link tables for every source document under `data_dir`.
pub fn run_extract(
    data_dir: &Path,
    policy: &dyn SelectionPolicy,
    config: &HarvestConfig,
) -> Result<Vec<SourceReport>, HarvestError> {
    let found = sources::discover(data_dir, &config.source_name)?;

    let mut reports = Vec::with_capacity(found.len());
    for source in found {
        info!(source = %source.display(), policy = policy.name(), "processing");
        let report = sources::process(&source, policy, config)?;
        info!(
            links_found = report.links_found,
            deduplicated = report.deduplicated,
            output = %report.output.display(),
            "link tables written"
        );
        reports.push(report);
    }
    Ok(reports)
}

pub struct FetchOptions {
    /// Without this only the cleaned URL set is reported; nothing is fetched.
    pub run: bool,
    pub render: bool,
}

/// Retrieve every link in `base_dir`'s deduplicated table and write the
/// manifest next to it. Returns `None` on a dry run.
pub async fn run_fetch(
    base_dir: &Path,
    config: HarvestConfig,
    options: FetchOptions,
) -> Result<Option<Manifest>, HarvestError> {
    let table = LinkTable::load(&base_dir.join(&config.dedup_name))?;
    let urls = table.urls();

    if !options.run {
        for url in &urls {
            info!(url = %clean_url(url), "would fetch");
        }
        info!(count = urls.len(), "dry run, pass --run to fetch");
        return Ok(None);
    }

    let renderer: Option<Arc<dyn PageRenderer>> = if options.render {
        match ChromeRenderer::detect(&config) {
            Some(chrome) => Some(Arc::new(chrome)),
            None => {
                warn!("no Chromium found, render fallback disabled");
                None
            }
        }
    } else {
        None
    };

    let files_dir = base_dir.join(&config.files_dir_name);
    let pages_dir = base_dir.join(&config.pages_dir_name);
    let manifest_path = base_dir.join(&config.manifest_name);

    let start = Instant::now();
    let pipeline = RetrievalPipeline::new(config, &files_dir, &pages_dir, renderer)?;
    let manifest = pipeline.retrieve(&urls).await;

    if let Err(e) = manifest.save(&manifest_path) {
        match manifest.to_json() {
            Ok(json) => error!(records = manifest.len(), manifest = %json, "failed to persist manifest"),
            Err(_) => error!(records = manifest.len(), "failed to persist manifest"),
        }
        return Err(e);
    }

    info!(
        total = manifest.len(),
        ok = manifest.count_ok(),
        elapsed_secs = start.elapsed().as_secs_f64(),
        manifest = %manifest_path.display(),
        "done"
    );
    Ok(Some(manifest))
}
