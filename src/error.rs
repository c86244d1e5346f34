use std::path::PathBuf;
use thiserror::Error;

/// Run-level failures. Per-URL and per-occurrence problems never surface here.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("required input not found: {0}")]
    MissingInput(PathBuf),
    #[error("no source documents found under {0}")]
    NoSources(PathBuf),
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

impl HarvestError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        HarvestError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        HarvestError::Json {
            path: path.into(),
            source,
        }
    }
}
