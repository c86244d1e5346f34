//! Retrieval records, their state machine, and the manifest they end up in.

use crate::error::HarvestError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    File,
    HtmlRaw,
    HtmlRendered,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::File => "file",
            ArtifactKind::HtmlRaw => "html_raw",
            ArtifactKind::HtmlRendered => "html_rendered",
        }
    }
}

/// Where a URL is in its retrieval.
///
/// `Submitted -> Classifying -> Ok` on the direct path,
/// `Classifying -> PendingRender -> Ok | Failed` on the fallback path,
/// `Classifying -> Failed` when no renderer is configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievalState {
    Submitted,
    Classifying,
    PendingRender { error: String },
    Ok { kind: ArtifactKind, saved: PathBuf },
    Failed { error: String },
}

impl RetrievalState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RetrievalState::Ok { .. } | RetrievalState::Failed { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            RetrievalState::Submitted | RetrievalState::Classifying => "unknown",
            RetrievalState::PendingRender { .. } => "pending_render",
            RetrievalState::Ok { .. } => "ok",
            RetrievalState::Failed { .. } => "failed",
        }
    }
}

/// One outcome per submitted URL. Frozen once its state is terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalRecord {
    pub url: String,
    state: RetrievalState,
}

impl RetrievalRecord {
    pub fn submitted(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            state: RetrievalState::Submitted,
        }
    }

    pub fn state(&self) -> &RetrievalState {
        &self.state
    }

    pub fn is_pending_render(&self) -> bool {
        matches!(self.state, RetrievalState::PendingRender { .. })
    }

    pub fn begin_classifying(&mut self) {
        if matches!(self.state, RetrievalState::Submitted) {
            self.state = RetrievalState::Classifying;
        }
    }

    pub fn defer_to_render(&mut self, error: impl Into<String>) {
        if matches!(self.state, RetrievalState::Classifying) {
            self.state = RetrievalState::PendingRender {
                error: error.into(),
            };
        }
    }

    pub fn succeed(&mut self, kind: ArtifactKind, saved: PathBuf) {
        self.finish(RetrievalState::Ok { kind, saved });
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.finish(RetrievalState::Failed {
            error: error.into(),
        });
    }

    fn finish(&mut self, next: RetrievalState) {
        if self.state.is_terminal() {
            warn!(url = %self.url, state = self.state.label(), "ignoring transition out of a terminal state");
            return;
        }
        self.state = next;
    }

    pub fn entry(&self) -> ManifestEntry {
        let (kind, saved, error) = match &self.state {
            RetrievalState::Submitted | RetrievalState::Classifying => (None, None, None),
            RetrievalState::PendingRender { error } => (None, None, Some(error.clone())),
            RetrievalState::Ok { kind, saved } => {
                (Some(*kind), Some(saved.display().to_string()), None)
            }
            RetrievalState::Failed { error } => (None, None, Some(error.clone())),
        };
        ManifestEntry {
            url: self.url.clone(),
            status: self.state.label().to_string(),
            kind,
            saved,
            error,
        }
    }
}

/// On-disk shape of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub url: String,
    pub status: String,
    #[serde(rename = "type")]
    pub kind: Option<ArtifactKind>,
    pub saved: Option<String>,
    pub error: Option<String>,
}

/// All records of one run, in completion order.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    records: Vec<RetrievalRecord>,
}

impl Manifest {
    pub fn records(&self) -> &[RetrievalRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn entries(&self) -> Vec<ManifestEntry> {
        self.records.iter().map(RetrievalRecord::entry).collect()
    }

    pub fn count_ok(&self) -> usize {
        self.records
            .iter()
            .filter(|r| matches!(r.state(), RetrievalState::Ok { .. }))
            .count()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.entries())
    }

    pub fn save(&self, path: &Path) -> Result<(), HarvestError> {
        let json = self.to_json().map_err(|e| HarvestError::json(path, e))?;
        std::fs::write(path, json).map_err(|e| HarvestError::io(path, e))
    }
}

/// Append-only collection shared by concurrent workers.
#[derive(Debug, Default)]
pub struct ManifestAccumulator {
    records: Mutex<Vec<RetrievalRecord>>,
}

impl ManifestAccumulator {
    pub async fn push(&self, record: RetrievalRecord) {
        log_completion(&record);
        self.records.lock().await.push(record);
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    /// Drain everything collected so far into a manifest.
    pub async fn finish(&self) -> Manifest {
        let records = std::mem::take(&mut *self.records.lock().await);
        Manifest { records }
    }
}

fn log_completion(record: &RetrievalRecord) {
    match record.state() {
        RetrievalState::Ok { kind, saved } => info!(
            status = "ok",
            kind = kind.as_str(),
            url = %record.url,
            saved = %saved.display(),
            "retrieved"
        ),
        RetrievalState::Failed { error } => warn!(
            status = "failed",
            url = %record.url,
            error = %error,
            "retrieval failed"
        ),
        other => warn!(url = %record.url, state = other.label(), "recording a non-terminal record"),
    }
}
