use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod backend;
pub mod budget;
pub mod config;
pub mod config_file;
pub mod eligibility;
pub mod invoker;
pub mod merge;
pub mod pipeline;
pub mod registry;

// Re-export for convenience
pub use backend::{BackendError, DecodeLimits, ExternalBackend, PdfBackend};
pub use budget::{HostLimits, ResourceBudget, parse_memory_limit, resolve, resolve_with_host};
pub use config::{IndexingConfig, MupdfSettings, PdftotextSettings};
pub use eligibility::{AllowedExtensions, is_eligible};
pub use invoker::extract;
pub use merge::{MergePolicy, merge};
pub use pipeline::PdfIndexer;
pub use registry::{Backend, ExtractionMethod, MethodId, Registry, RegistryBuilder};

/// A document file handed over by the host indexer.
///
/// The core never mutates or retains it past a single indexing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    pub path: PathBuf,
    /// Extension without the leading dot, as reported by the host.
    pub extension: String,
    pub size: u64,
}

impl FileRef {
    pub fn new(path: impl Into<PathBuf>, extension: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            extension: extension.into(),
            size,
        }
    }

    /// Build a reference from filesystem metadata.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_string();
        Ok(Self {
            path: path.to_path_buf(),
            extension,
            size: metadata.len(),
        })
    }
}

/// Why an extraction attempt produced no text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    #[error("extraction backend unavailable")]
    BackendUnavailable,
    #[error("extraction timed out")]
    Timeout,
    #[error("decode memory limit exceeded")]
    MemoryExceeded,
    #[error("backend error: {0}")]
    BackendError(String),
    #[error("file could not be read")]
    Unreadable,
}

/// Outcome of a single extraction attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionResult {
    Text(String),
    Failure(FailureReason),
}

impl ExtractionResult {
    /// Extracted text, or `None` if the attempt failed.
    pub fn text(&self) -> Option<&str> {
        match self {
            ExtractionResult::Text(text) => Some(text),
            ExtractionResult::Failure(_) => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ExtractionResult::Failure(_))
    }
}
