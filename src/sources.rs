//! Locates source documents and turns each into its pair of link tables.

use crate::config::HarvestConfig;
use crate::dedup::{self, SelectionPolicy};
use crate::error::HarvestError;
use crate::link_table::{LinkTable, TableMeta};
use std::path::{Path, PathBuf};

/// Counts reported after processing one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    pub source: PathBuf,
    pub links_found: usize,
    pub deduplicated: usize,
    pub output: PathBuf,
}

/// `data_dir/*/<source_name>`, sorted. Not finding any is an error.
pub fn discover(data_dir: &Path, source_name: &str) -> Result<Vec<PathBuf>, HarvestError> {
    let entries = std::fs::read_dir(data_dir).map_err(|e| HarvestError::io(data_dir, e))?;

    let mut sources: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path().join(source_name))
        .filter(|candidate| candidate.is_file())
        .collect();
    sources.sort();

    if sources.is_empty() {
        return Err(HarvestError::NoSources(data_dir.to_path_buf()));
    }
    Ok(sources)
}

/// Extract, deduplicate and write both tables next to `source`.
pub fn process(
    source: &Path,
    policy: &dyn SelectionPolicy,
    config: &HarvestConfig,
) -> Result<SourceReport, HarvestError> {
    let bytes = std::fs::read(source).map_err(|e| HarvestError::io(source, e))?;
    let text = String::from_utf8_lossy(&bytes);

    let resolution = dedup::analyze(&text, policy);
    let meta = TableMeta {
        links_found: resolution.links.len(),
        deduplicated: resolution.groups.len(),
        policy: policy.name().to_string(),
        source: source.display().to_string(),
    };

    let full_path = source.with_file_name(&config.all_links_name);
    let dedup_path = source.with_file_name(&config.dedup_name);
    LinkTable::full(&resolution, meta.clone()).save(&full_path)?;
    LinkTable::deduplicated(&resolution, meta.clone()).save(&dedup_path)?;

    Ok(SourceReport {
        source: source.to_path_buf(),
        links_found: meta.links_found,
        deduplicated: meta.deduplicated,
        output: dedup_path,
    })
}
